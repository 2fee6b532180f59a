/// Label for the per-run directory under the temp root.
pub const DEFAULT_HOST_LABEL: &str = "exteditorhost";
/// Subtree holding temp files for regular browsing sessions.
pub const TMP_FILES_DIR: &str = "tmpfiles";
/// Subtree holding temp files for private browsing sessions.
pub const TMP_FILES_PRIVATE_DIR: &str = "tmpfiles_pb";

/// Browsers cap host-bound messages at 1 MiB.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;
pub const MIN_FRAME_BYTES: usize = 1024;
pub const MAX_FRAME_BYTES_LIMIT: usize = 64 * 1024 * 1024;
