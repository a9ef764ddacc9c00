//! Request path decoding and resolution against the served root

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Path, PathBuf};

use crate::error::ServeError;

/// Characters escaped in generated links; `/` is kept so paths stay readable
const LINK_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-decode a URI path
pub fn decode_path(raw: &str) -> Result<String, ServeError> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| ServeError::BadRequest(format!("path is not valid UTF-8: {raw}")))?;
    if decoded.contains('\0') {
        return Err(ServeError::BadRequest(format!("NUL byte in path: {raw}")));
    }
    Ok(decoded.into_owned())
}

/// Percent-encode a path segment or relative link for HTML output
pub fn encode_link(name: &str) -> String {
    utf8_percent_encode(name, LINK_ESCAPE).to_string()
}

/// Join a decoded request path onto `root`
///
/// Empty and `.` segments are dropped. A `..` segment, or one carrying a
/// backslash, is rejected so the result always stays lexically under root.
pub fn resolve(root: &Path, decoded: &str) -> Result<PathBuf, ServeError> {
    let mut resolved = root.to_path_buf();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(ServeError::Forbidden(format!("parent segment in path: {decoded}")));
            }
            s if s.contains('\\') => {
                return Err(ServeError::Forbidden(format!("backslash in path: {decoded}")));
            }
            s => resolved.push(s),
        }
    }
    Ok(resolved)
}
