//! Domain models

pub mod asset;
pub mod message;
pub mod session;

pub use asset::{Asset, AssetStatus, AssetVariant};
pub use message::ProcessingMessage;
pub use session::{SessionStatus, UploadSession};
