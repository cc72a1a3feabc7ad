//! The `files` table row and its lifecycle helpers.
//!
//! One row per path ever observed by any scan. `dtime > 0` marks a
//! tombstone (the file is currently absent); `dtime == 0` means present.

use sqlx::FromRow;

/// A `files` table row. `path` is stored and compared as raw bytes —
/// absolute paths are opaque on Unix (arbitrary non-UTF-8 byte sequences
/// are valid filenames) so this is never assumed to be a `String`.
#[derive(Debug, Clone, FromRow)]
pub struct FileRow {
    pub id: i64,
    pub path: Vec<u8>,
    pub mtime: i64,
    pub dtime: i64,
    pub itime: i64,
    pub size: i64,
    pub update_id: i64,
}

impl FileRow {
    /// `true` when this row represents a file currently present on disk.
    pub fn is_present(&self) -> bool {
        self.dtime == 0
    }
}

#[cfg(unix)]
pub fn path_to_bytes(path: &std::path::Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
pub fn path_to_bytes(path: &std::path::Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
pub fn bytes_to_path(bytes: &[u8]) -> std::path::PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    std::path::PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
pub fn bytes_to_path(bytes: &[u8]) -> std::path::PathBuf {
    std::path::PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}
