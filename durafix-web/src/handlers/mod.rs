//! HTTP request handlers organized by functionality

pub mod form;
pub mod pages;
pub mod response;
pub mod upload;

// Re-export handler functions
pub use form::UploadForm;
pub use pages::{health, index_page};
pub use response::{ApiError, download_name, sanitize_filename};
pub use upload::{compress_file, upload_file};
