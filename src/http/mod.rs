//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from the
//! file serving logic.

pub mod date;
pub mod mime;
pub mod path;
pub mod response;

// Re-export commonly used types
pub use response::{
    apply_dev_headers, build_304_response, build_error_response, build_file_response,
    build_html_response, build_redirect_response,
};
