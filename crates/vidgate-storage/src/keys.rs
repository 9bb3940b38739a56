//! Deterministic storage key derivation.
//!
//! Keys are derived from owner id + content hash + filename so the same
//! content always lands at the same place: stable under retries, collision
//! resistant through the hash, and traceable back to the upload.

use uuid::Uuid;

/// Strip anything that could act as a path component or shell surprise from a
/// client-supplied filename. Falls back to "file" when nothing survives.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(['.', '_']).to_string();
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed
    }
}

/// Prefix under which everything for one piece of content lives.
pub fn asset_prefix(owner_id: Uuid, content_hash: &str) -> String {
    format!("media/{}/{}", owner_id, content_hash)
}

/// Key for the assembled source object.
pub fn source_key(owner_id: Uuid, content_hash: &str, filename: &str) -> String {
    format!(
        "{}/source/{}",
        asset_prefix(owner_id, content_hash),
        sanitize_filename(filename)
    )
}

/// Key for one rendition output.
pub fn rendition_key(asset_prefix: &str, profile_name: &str) -> String {
    format!("{}/renditions/{}.mp4", asset_prefix, profile_name)
}

/// Key for the extracted thumbnail frame.
pub fn thumbnail_key(asset_prefix: &str) -> String {
    format!("{}/thumbnail.jpg", asset_prefix)
}

/// Key for the adaptive-streaming master playlist.
pub fn manifest_key(asset_prefix: &str) -> String {
    format!("{}/master.m3u8", asset_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_path_traversal_attempts() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("movie clip (1).mp4"), "movie_clip__1_.mp4");
        assert_eq!(sanitize_filename("///"), "file");
    }

    #[test]
    fn source_key_is_deterministic() {
        let owner = Uuid::nil();
        let a = source_key(owner, "cafebabe", "clip.mp4");
        let b = source_key(owner, "cafebabe", "clip.mp4");
        assert_eq!(a, b);
        assert_eq!(
            a,
            "media/00000000-0000-0000-0000-000000000000/cafebabe/source/clip.mp4"
        );
    }

    #[test]
    fn derived_keys_share_the_asset_prefix() {
        let prefix = asset_prefix(Uuid::nil(), "cafebabe");
        assert!(rendition_key(&prefix, "720p").starts_with(&prefix));
        assert!(thumbnail_key(&prefix).starts_with(&prefix));
        assert!(manifest_key(&prefix).ends_with("master.m3u8"));
    }
}
