//! Content fingerprints deciding whether a build output is stale.
//!
//! A fingerprint covers the serialized build inputs and the content of every
//! source file, plus any headers the caller lists. It is stored in a
//! `.stamp` file next to the output.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{BuildError, Result};

/// SHA-256 of `inputs` and the content of `files`, as lowercase hex.
///
/// Returns `None` when any file cannot be read; such inputs are never fresh.
pub fn digest<T: Serialize>(inputs: &T, files: &[PathBuf]) -> Option<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(inputs).ok()?);
    for file in files {
        let content = fs::read(file).ok()?;
        hasher.update(file.to_string_lossy().as_bytes());
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(&content);
    }
    let hash: [u8; 32] = hasher.finalize().into();
    Some(hash.iter().map(|b| format!("{b:02x}")).collect())
}

const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp"];

/// Header files under `dirs`, recursively, in a stable order.
///
/// Directories that do not exist contribute nothing.
pub fn headers_under(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut headers = Vec::new();
    let mut pending: Vec<PathBuf> = dirs.to_vec();
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| HEADER_EXTENSIONS.contains(&e))
            {
                headers.push(path);
            }
        }
    }
    headers.sort();
    headers.dedup();
    headers
}

/// Location of the stamp recording the fingerprint of `artifact`.
pub fn stamp_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(".stamp");
    PathBuf::from(name)
}

/// Whether `artifact` exists and was produced from inputs with `digest`.
pub fn is_fresh(artifact: &Path, digest: &str) -> bool {
    artifact.is_file()
        && fs::read_to_string(stamp_path(artifact)).is_ok_and(|stamp| stamp.trim() == digest)
}

/// Record `digest` as the fingerprint of `artifact`.
pub fn write_stamp(artifact: &Path, digest: &str) -> Result<()> {
    let stamp = stamp_path(artifact);
    fs::write(&stamp, digest).map_err(|e| BuildError::io(stamp, e))
}
