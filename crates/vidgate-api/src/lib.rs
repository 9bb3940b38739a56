//! HTTP surface for the upload service.
//!
//! Exposes the session endpoints and the asset read surface over the upload
//! manager, and wires the transcode worker's session-linking seam.

pub mod api_doc;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use routes::build_router;
pub use state::{AppState, SessionLinkTracker};
