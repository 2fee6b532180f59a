//! Process-wide diagnostics that must stay off stdout.

mod logging;

pub use logging::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
    log_timing,
};
