//! Out-of-line storage for binary payloads
//!
//! Blobs live next to the YAML files that reference them, under a `_blobs`
//! directory, and are referenced by a path relative to that YAML file's
//! directory.

use std::fs;
use std::path::Path;

use crate::error::{InterchangeError, Result};

/// Directory name for externalized payloads
pub const BLOB_DIR: &str = "_blobs";

/// Flatten a collection path into a file-name-safe stem
pub fn sanitize(collection_path: &str) -> String {
    collection_path
        .trim_end_matches(['/', '\\'])
        .replace(['/', '\\'], "_")
}

/// Write `bytes` under `base_dir/_blobs/` and return the relative path.
/// Empty payloads are not written and yield an empty path.
pub fn externalize(
    base_dir: &Path,
    collection_path: &str,
    field_name: &str,
    bytes: &[u8],
) -> Result<String> {
    if bytes.is_empty() {
        return Ok(String::new());
    }

    let blob_dir = base_dir.join(BLOB_DIR);
    fs::create_dir_all(&blob_dir)?;
    let file_name = format!("{}_{}.bin", sanitize(collection_path), field_name);
    fs::write(blob_dir.join(&file_name), bytes)?;

    Ok(format!("{}/{}", BLOB_DIR, file_name))
}

/// Read the payload at `base_dir/relative_path`. A blank path means no data.
pub fn materialize(
    base_dir: &Path,
    relative_path: &str,
    collection_path: &str,
    field_name: &str,
) -> Result<Vec<u8>> {
    if relative_path.trim().is_empty() {
        return Ok(Vec::new());
    }

    let path = base_dir.join(relative_path);
    if !path.is_file() {
        return Err(InterchangeError::MissingBlobFile {
            collection: collection_path.to_string(),
            field: field_name.to_string(),
            path,
        });
    }
    Ok(fs::read(path)?)
}
