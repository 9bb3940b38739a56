//! Chunk assembler.
//!
//! Concatenates staged chunks in strict ascending index order into one file.
//! Each chunk is streamed through `tokio::io::copy`'s fixed buffer, so memory
//! use is bounded by the copy buffer regardless of file size; when the output
//! sink cannot accept more data the read side awaits until it drains. A
//! chunk's staged file is deleted as soon as its bytes are through, bounding
//! disk use to roughly one file's worth plus one chunk.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

use vidgate_core::error::AppError;

/// Staged location for one chunk. Zero-padded so directory listings sort.
pub fn chunk_path(staging_dir: &Path, index: u32) -> PathBuf {
    staging_dir.join(format!("{:06}.part", index))
}

/// Location of the assembled output inside the staging directory.
pub fn assembled_path(staging_dir: &Path) -> PathBuf {
    staging_dir.join("assembled.bin")
}

/// Concatenate chunks `0..total_chunks` from `staging_dir` into `output`.
/// Returns the number of bytes written. A missing chunk aborts
/// deterministically with [`AppError::MissingChunk`]; there is no partial
/// retry, recovery means re-uploading and reassembling.
pub async fn assemble(
    staging_dir: &Path,
    total_chunks: u32,
    output: &Path,
) -> Result<u64, AppError> {
    let out_file = fs::File::create(output).await?;
    let mut writer = BufWriter::new(out_file);
    let mut written: u64 = 0;

    for index in 0..total_chunks {
        let path = chunk_path(staging_dir, index);
        let mut chunk = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::MissingChunk { index });
            }
            Err(e) => return Err(e.into()),
        };

        written += tokio::io::copy(&mut chunk, &mut writer).await?;
        drop(chunk);

        // Staged bytes are in the output now; reclaim the disk immediately.
        fs::remove_file(&path).await?;
    }

    writer.flush().await?;
    writer.into_inner().sync_all().await?;

    tracing::debug!(
        chunks = total_chunks,
        bytes = written,
        output = %output.display(),
        "Assembled upload"
    );
    Ok(written)
}

/// Best-effort removal of a session's staging directory.
pub async fn cleanup_staging(staging_dir: &Path) {
    if let Err(e) = fs::remove_dir_all(staging_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                staging_dir = %staging_dir.display(),
                error = %e,
                "Failed to remove staging directory"
            );
        }
    }
}
