//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::Parser;
use std::path::PathBuf;

pub(crate) use validation::is_single_component;
pub use defaults::{
    DEFAULT_HOST_LABEL, DEFAULT_MAX_FRAME_BYTES, MAX_FRAME_BYTES_LIMIT, MIN_FRAME_BYTES,
    TMP_FILES_DIR, TMP_FILES_PRIVATE_DIR,
};

/// CLI options for the editor host. Browsers launch the host with their own
/// positional arguments, so unknown trailing values are accepted and ignored.
#[derive(Debug, Parser, Clone)]
#[command(about = "External editor native messaging host", author, version)]
pub struct HostConfig {
    /// Enable file logging (debug)
    #[arg(long = "logs", env = "EXTEDITOR_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "EXTEDITOR_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging file content and paths (debug log only)
    #[arg(
        long = "log-content",
        env = "EXTEDITOR_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,

    /// Largest inbound or outbound frame payload accepted (bytes)
    #[arg(long = "max-frame-bytes", default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,

    /// Base directory for per-run temp files (defaults to the system temp dir)
    #[arg(long = "tmp-root", env = "EXTEDITOR_TMP_ROOT")]
    pub tmp_root: Option<PathBuf>,

    /// Directory label placed under the temp root
    #[arg(long, default_value = DEFAULT_HOST_LABEL)]
    pub label: String,

    /// Window handle passed by Chromium on Windows
    #[arg(long = "parent-window", hide = true)]
    pub parent_window: Option<String>,

    /// Manifest path / extension origin passed by the browser
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub browser_args: Vec<String>,
}

impl HostConfig {
    /// Whether the file logger should be active.
    pub fn logging_enabled(&self) -> bool {
        (self.logs || self.log_timings) && !self.no_logs
    }
}
