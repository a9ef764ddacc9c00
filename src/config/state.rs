// Application state module
// Read-only state shared by every connection

use std::io;
use std::path::PathBuf;

use super::types::Config;
use crate::http::mime::MimeMap;
use crate::logger::LogFormat;

/// Application state, built once at startup and never mutated afterwards
pub struct AppState {
    pub config: Config,
    /// Canonical root directory
    pub root: PathBuf,
    pub mime: MimeMap,
    pub log_format: LogFormat,
}

impl AppState {
    /// Resolve the root directory and build the MIME map
    ///
    /// Fails if the root does not exist or is not a directory.
    pub fn new(config: Config) -> io::Result<Self> {
        let root = config.server.root_dir()?.canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Root is not a directory: {}", root.display()),
            ));
        }

        let mime = MimeMap::with_overrides(&config.http.mime_types);
        let log_format = LogFormat::parse(&config.logging.access_log_format);

        Ok(Self {
            config,
            root,
            mime,
            log_format,
        })
    }
}
