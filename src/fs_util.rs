//! Thin filesystem and URI helpers used by the router and launcher.

use crate::error::{HostError, HostResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

/// True when `path` names an existing regular file (symlinks followed).
pub fn is_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// True when `path` is a regular file the current user may execute.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    if !is_file(path) {
        return false;
    }
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(c_path.as_ptr(), libc::X_OK) == 0 }
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    is_file(path)
}

/// Final path component as a display string, empty when there is none.
pub fn file_name_from_path(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Milliseconds since the Unix epoch; 0 for times before it.
pub(crate) fn system_time_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Resolve a `file:` URI to a local path.
pub fn uri_to_file_path(uri: &str) -> HostResult<PathBuf> {
    let parsed =
        Url::parse(uri).map_err(|err| HostError::Config(format!("invalid uri '{uri}': {err}")))?;
    if parsed.scheme() != "file" {
        return Err(HostError::Config(format!(
            "unsupported uri scheme '{}'",
            parsed.scheme()
        )));
    }
    parsed
        .to_file_path()
        .map_err(|()| HostError::Config(format!("uri '{uri}' has no local path")))
}
