//! Metadata validation module
//!
//! Upload metadata is a fixed, validated key-value map enforced at the
//! boundary: bounded key count, bounded key/value lengths, restricted key
//! charset, and reserved prefixes kept for internal use.

use std::collections::HashMap;

use crate::error::AppError;

/// Maximum length for metadata key names.
pub const MAX_METADATA_KEY_LENGTH: usize = 64;

/// Maximum length for metadata values.
pub const MAX_METADATA_VALUE_LENGTH: usize = 512;

/// Maximum number of keys allowed per upload.
pub const MAX_METADATA_KEYS: usize = 32;

/// Key prefixes reserved for internal use.
const RESERVED_PREFIXES: &[&str] = &["_system_", "_internal_", "vidgate:"];

/// Validate a metadata key name.
///
/// Allowed: letters, digits, underscore, hyphen, dot, colon; max 64 chars;
/// reserved prefixes rejected.
pub fn validate_metadata_key(key: &str) -> Result<(), AppError> {
    if key.is_empty() {
        return Err(AppError::Validation("Metadata key cannot be empty".into()));
    }
    if key.len() > MAX_METADATA_KEY_LENGTH {
        return Err(AppError::Validation(format!(
            "Metadata key '{}' exceeds maximum length of {} characters",
            key, MAX_METADATA_KEY_LENGTH
        )));
    }
    let valid_chars = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if !valid_chars {
        return Err(AppError::Validation(format!(
            "Metadata key '{}' contains invalid characters. Allowed: letters, digits, underscore, hyphen, dot, colon",
            key
        )));
    }
    if RESERVED_PREFIXES.iter().any(|p| key.starts_with(p)) {
        return Err(AppError::Validation(format!(
            "Metadata key '{}' uses a reserved prefix",
            key
        )));
    }
    Ok(())
}

pub fn validate_metadata_value(key: &str, value: &str) -> Result<(), AppError> {
    if value.len() > MAX_METADATA_VALUE_LENGTH {
        return Err(AppError::Validation(format!(
            "Metadata value for key '{}' exceeds maximum length of {} characters",
            key, MAX_METADATA_VALUE_LENGTH
        )));
    }
    Ok(())
}

/// Validate a full metadata map: key count, keys, and values.
pub fn validate_metadata(metadata: &HashMap<String, String>) -> Result<(), AppError> {
    if metadata.len() > MAX_METADATA_KEYS {
        return Err(AppError::Validation(format!(
            "Metadata contains {} keys, but maximum allowed is {}",
            metadata.len(),
            MAX_METADATA_KEYS
        )));
    }
    for (key, value) in metadata {
        validate_metadata_key(key)?;
        validate_metadata_value(key, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_map() {
        let mut metadata = HashMap::new();
        metadata.insert("title".to_string(), "Holiday clip".to_string());
        metadata.insert("camera.model".to_string(), "X-T5".to_string());
        assert!(validate_metadata(&metadata).is_ok());
    }

    #[test]
    fn rejects_invalid_key_characters() {
        assert!(validate_metadata_key("has space").is_err());
        assert!(validate_metadata_key("emoji🎥").is_err());
        assert!(validate_metadata_key("").is_err());
    }

    #[test]
    fn rejects_reserved_prefixes() {
        assert!(validate_metadata_key("_system_origin").is_err());
        assert!(validate_metadata_key("vidgate:hash").is_err());
        assert!(validate_metadata_key("system").is_ok());
    }

    #[test]
    fn rejects_oversized_value() {
        let value = "x".repeat(MAX_METADATA_VALUE_LENGTH + 1);
        assert!(validate_metadata_value("k", &value).is_err());
    }

    #[test]
    fn rejects_too_many_keys() {
        let metadata: HashMap<String, String> = (0..MAX_METADATA_KEYS + 1)
            .map(|i| (format!("key{}", i), "v".to_string()))
            .collect();
        assert!(validate_metadata(&metadata).is_err());
    }
}
