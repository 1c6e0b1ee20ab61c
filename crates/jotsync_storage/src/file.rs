//! Filesystem-backed key/value store.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{StorageError, StorageResult};
use crate::KvStore;

/// A key/value store with one file per key under a root directory.
///
/// Slashes in keys become subdirectories; all other characters are
/// percent-escaped into filesystem-safe names. Writes go through a
/// temporary file followed by a rename, so each key is crash-atomic.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StorageError::io(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.split('/').any(|seg| seg.is_empty()) {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        let mut path = self.root.clone();
        for segment in key.split('/') {
            path.push(escape_segment(segment));
        }
        Ok(path)
    }
}

/// Escapes a key segment into a safe file name. Alphanumerics, dashes,
/// underscores and dots pass through; everything else becomes `%XX`.
/// `.` and `..` are escaped whole to avoid path traversal.
fn escape_segment(segment: &str) -> String {
    if segment == "." || segment == ".." {
        return segment.bytes().map(|b| format!("%{b:02X}")).collect();
    }
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

impl KvStore for FileStore {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8(bytes).map(Some).map_err(|_| {
                StorageError::Corrupt {
                    key: key.to_string(),
                }
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(key, e))?;
        }
        // Write-then-rename keeps the previous value intact on a crash.
        // The `%tmp` suffix cannot collide with an escaped key name.
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!("{file_name}%tmp"));
        {
            let mut file = fs::File::create(&tmp).map_err(|e| StorageError::io(key, e))?;
            file.write_all(value.as_bytes())
                .map_err(|e| StorageError::io(key, e))?;
            file.sync_all().map_err(|e| StorageError::io(key, e))?;
        }
        fs::rename(&tmp, &path).map_err(|e| StorageError::io(key, e))
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        collect_keys(&self.root, String::new(), &mut keys)
            .map_err(|e| StorageError::io(prefix, e))?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

fn collect_keys(dir: &Path, key_prefix: String, out: &mut Vec<String>) -> std::io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = if key_prefix.is_empty() {
            unescape_segment(&name)
        } else {
            format!("{key_prefix}/{}", unescape_segment(&name))
        };
        if entry.file_type()?.is_dir() {
            collect_keys(&entry.path(), key, out)?;
        } else if !name.ends_with("%tmp") {
            out.push(key);
        }
    }
    Ok(())
}

fn unescape_segment(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 3 <= bytes.len() {
            let hex = [bytes[i + 1], bytes[i + 2]];
            if let Some(byte) = std::str::from_utf8(&hex)
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
            {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
