//! Vidgate storage backends.
//!
//! The [`Storage`] trait abstracts the object store used for assembled
//! uploads, renditions, thumbnails, and manifests. Keys are deterministic and
//! content-addressed (see [`keys`]); backends are long-lived handles injected
//! into the components that use them.

pub mod keys;
pub mod local;
pub mod traits;

pub use local::LocalStorage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
