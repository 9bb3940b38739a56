//! Integrity verification: exact size check and streaming content hash.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

use vidgate_core::error::AppError;

const HASH_READ_BUF_SIZE: usize = 64 * 1024;

/// SHA-256 of a file, streamed through a fixed buffer so the file is never
/// resident in memory at once.
pub async fn sha256_file(path: &Path) -> Result<String, AppError> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_READ_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of an in-memory buffer. For request-sized data and tests.
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Assembled byte count must equal the declared size exactly.
pub fn verify_size(declared: u64, actual: u64) -> Result<(), AppError> {
    if declared != actual {
        return Err(AppError::SizeMismatch { declared, actual });
    }
    Ok(())
}

/// Compare a client-declared hash against the computed one. Applied
/// independently of the size check; a mismatch is terminal.
pub fn verify_expected_hash(expected: Option<&str>, actual: &str) -> Result<(), AppError> {
    if let Some(expected) = expected {
        if !expected.eq_ignore_ascii_case(actual) {
            return Err(AppError::Integrity {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn streamed_hash_matches_in_memory_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        let data = vec![42u8; 200_000];
        fs::write(&path, &data).await.unwrap();

        assert_eq!(sha256_file(&path).await.unwrap(), sha256_bytes(&data));
    }

    #[test]
    fn known_vector() {
        // sha256("abc")
        assert_eq!(
            sha256_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn size_mismatch_is_terminal() {
        assert!(verify_size(10, 10).is_ok());
        let err = verify_size(10, 9).unwrap_err();
        assert!(matches!(
            err,
            AppError::SizeMismatch {
                declared: 10,
                actual: 9
            }
        ));
    }

    #[test]
    fn expected_hash_comparison_is_case_insensitive() {
        assert!(verify_expected_hash(Some("ABCDEF"), "abcdef").is_ok());
        assert!(verify_expected_hash(None, "abcdef").is_ok());
        assert!(matches!(
            verify_expected_hash(Some("other"), "abcdef"),
            Err(AppError::Integrity { .. })
        ));
    }
}
