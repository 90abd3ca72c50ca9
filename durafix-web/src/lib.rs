//! Durafix Web - upload server

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
//!
//! Accepts WebM uploads over multipart HTTP, repairs the duration field and
//! optionally re-encodes to a target size before sending the file back as a
//! download.

pub mod handlers;
pub mod server;

// Re-export main types
pub use server::{AppState, build_router, run_server};
