//! Upload ingestion: session state machine, chunk staging, assembly,
//! integrity verification, deduplication, and the durable handoff.
//!
//! The entry point is [`UploadManager`], which services many sessions'
//! chunk uploads in parallel. Only per-session-per-chunk operations are
//! serialized; unrelated sessions never contend. Assembly and everything
//! after it run as one isolated task per session whose failure is captured
//! into session status, never thrown at the uploading client.

pub mod assembler;
pub mod integrity;
pub mod manager;
pub mod session_store;

pub use manager::{ChunkProgress, InitReceipt, InitUpload, UploadManager};
pub use session_store::{ChunkReceipt, InMemorySessionStore, SessionStore};
