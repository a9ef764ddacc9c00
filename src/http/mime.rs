//! MIME type detection module
//!
//! Returns the corresponding Content-Type based on file extension.

use std::collections::HashMap;
use std::path::Path;

pub const JAVASCRIPT: &str = "application/javascript";
pub const JSON: &str = "application/json";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extension to MIME type map
///
/// Lookups go through the configured overrides first, then the standard
/// table from `mime_guess`, then fall back to `application/octet-stream`.
/// `js` and `json` always resolve to [`JAVASCRIPT`] and [`JSON`].
#[derive(Debug, Clone)]
pub struct MimeMap {
    overrides: HashMap<String, String>,
}

impl MimeMap {
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut map: HashMap<String, String> = overrides
            .iter()
            .map(|(ext, mime)| (normalize_extension(ext), mime.clone()))
            .collect();

        // Forced last so no override can change them
        map.insert("js".to_string(), JAVASCRIPT.to_string());
        map.insert("json".to_string(), JSON.to_string());

        Self { overrides: map }
    }

    /// Get MIME Content-Type based on file extension
    pub fn content_type(&self, extension: Option<&str>) -> &str {
        let Some(ext) = extension else {
            return OCTET_STREAM;
        };
        let ext = normalize_extension(ext);

        if let Some(mime) = self.overrides.get(&ext) {
            return mime;
        }

        mime_guess::from_ext(&ext).first_raw().unwrap_or(OCTET_STREAM)
    }

    /// Get MIME Content-Type for a path on disk
    pub fn for_path(&self, path: &Path) -> &str {
        self.content_type(path.extension().and_then(|e| e.to_str()))
    }
}

impl Default for MimeMap {
    fn default() -> Self {
        Self::with_overrides(&HashMap::new())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}
