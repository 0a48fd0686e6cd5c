//! Filename and path helpers for saved documents

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Resolve where a document should be written, given what is already on disk.
///
/// Returns `Ok(None)` when the file exists and the action is `Skip`. `Rename` appends
/// ` (1)`, ` (2)`, ... before the extension until the name is free.
///
/// # Examples
///
/// ```
/// use cfdi_dl::utils::get_unique_path;
/// use cfdi_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/cfdi-dl-doc-that-does-not-exist.xml");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// assert_eq!(unique.as_deref(), Some(path));
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(Some(path.to_path_buf()));
    }

    match action {
        FileCollisionAction::Overwrite => Ok(Some(path.to_path_buf())),
        FileCollisionAction::Skip => Ok(None),
        FileCollisionAction::Rename => {
            let invalid = |reason: &str| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{}: {reason}", path.display()),
                ))
            };
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| invalid("cannot extract file stem"))?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path
                .parent()
                .ok_or_else(|| invalid("cannot extract parent directory"))?;

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let name = match extension {
                    Some(ext) => format!("{stem} ({i}).{ext}"),
                    None => format!("{stem} ({i})"),
                };
                let candidate = parent.join(name);
                if !candidate.exists() {
                    return Ok(Some(candidate));
                }
            }

            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!(
                    "{}: no free name after {MAX_RENAME_ATTEMPTS} attempts",
                    path.display()
                ),
            )))
        }
    }
}

/// Make a server-supplied name safe to use as a single path component.
///
/// Path separators, control characters and characters Windows rejects become `_`;
/// leading/trailing dots and spaces are trimmed. Returns `None` if nothing is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Extract the filename from a `Content-Disposition` header value.
///
/// Handles `filename="a.xml"`, bare `filename=a.xml` and RFC 5987 `filename*=UTF-8''a.xml`
/// (which wins when both are present). The extension is kept.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;

    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // charset'lang'percent-encoded
            let encoded = encoded.rsplit('\'').next().unwrap_or(encoded);
            if let Ok(decoded) = urlencoding::decode(encoded)
                && let Some(name) = sanitize_filename(&decoded)
            {
                return Some(name);
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            plain = sanitize_filename(name.trim_matches('"'));
        }
    }

    plain
}
