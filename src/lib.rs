mod app;
pub mod config;
pub mod editor;
pub mod error;
pub mod fs_util;
pub mod host;
pub mod signals;
mod telemetry;
pub mod temp_store;

pub use app::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
    log_timing,
};
pub use config::HostConfig;
pub use error::{HostError, HostResult};
pub use host::{run_host, HostMessage};
pub use telemetry::{init_tracing, tracing_log_path};
