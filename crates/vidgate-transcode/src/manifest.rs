//! Adaptive-streaming master playlist.

use std::collections::HashMap;

use vidgate_core::models::AssetVariant;

/// Content type for the master playlist object.
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Build the master playlist for the produced renditions, highest bitrate
/// first. Rendition URIs are relative to the playlist's own location under
/// the asset prefix.
pub fn build_master_playlist(variants: &HashMap<String, AssetVariant>) -> String {
    let mut entries: Vec<(&String, &AssetVariant)> = variants.iter().collect();
    // Name as tiebreaker keeps the output deterministic.
    entries.sort_by(|a, b| b.1.bitrate.cmp(&a.1.bitrate).then_with(|| a.0.cmp(b.0)));

    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n\n");
    for (name, variant) in entries {
        playlist.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\nrenditions/{}.mp4\n\n",
            variant.bitrate as u64 * 1000,
            variant.width,
            variant.height,
            name
        ));
    }
    playlist
}
