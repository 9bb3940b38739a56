//! Validation modules

pub mod metadata;

pub use metadata::{
    validate_metadata, validate_metadata_key, validate_metadata_value, MAX_METADATA_KEYS,
    MAX_METADATA_KEY_LENGTH, MAX_METADATA_VALUE_LENGTH,
};
