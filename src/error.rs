//! Per-request error taxonomy
//!
//! Every variant maps to an HTTP status; none of them is fatal to the server.

use hyper::StatusCode;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl ServeError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a filesystem error for `path` onto the taxonomy
    pub fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => Self::Forbidden(path.to_string()),
            _ => Self::Io(err),
        }
    }

    /// Map an error from looking up `path` under the root
    ///
    /// Anything but a permission failure means the path names nothing
    /// servable (`ENOTDIR`, `ENAMETOOLONG`, symlink loops).
    pub fn from_lookup(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::Forbidden(path.to_string()),
            _ => Self::NotFound(path.to_string()),
        }
    }
}

impl From<io::Error> for ServeError {
    fn from(err: io::Error) -> Self {
        Self::from_io(err, "")
    }
}
