//! Shared utility functions for the brownfield crate.

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::errors::{BrownfieldError, Result};

/// Extract a JSON object from text that may contain other content.
/// Uses brace-counting to find the outermost JSON object.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0;
    let mut end = start;

    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > start {
        Some(text[start..end].to_string())
    } else {
        None
    }
}

/// Serialize `value` as pretty JSON and write it atomically.
///
/// The content goes to a temp file in the target's directory, is fsynced,
/// then renamed over the target. A crash leaves either the old or the new
/// file, never a torn one.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value).map_err(|e| BrownfieldError::AtomicWrite {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;
    let atomic_err = |source: std::io::Error| BrownfieldError::AtomicWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(atomic_err)?;

    let mut temp = NamedTempFile::new_in(dir).map_err(atomic_err)?;
    temp.write_all(&content).map_err(atomic_err)?;
    temp.write_all(b"\n").map_err(atomic_err)?;
    temp.as_file().sync_all().map_err(atomic_err)?;
    temp.persist(path).map_err(|e| atomic_err(e.error))?;
    Ok(())
}
