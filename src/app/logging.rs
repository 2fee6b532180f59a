use crate::config::HostConfig;
use std::{
    env, fs,
    io::Write,
    panic,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, OnceLock,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

const LOG_MAX_BYTES: u64 = 2 * 1024 * 1024;
const CRASH_LOG_MAX_BYTES: u64 = 128 * 1024;
static LOG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_CONTENT_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_TIMINGS_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_STATE: OnceLock<Mutex<LogState>> = OnceLock::new();

/// Debug log location. The host never writes diagnostics to stdout.
pub fn log_file_path() -> PathBuf {
    env::temp_dir().join("exteditor_host.log")
}

/// Crash log location (panic location and version only by default).
pub fn crash_log_path() -> PathBuf {
    env::temp_dir().join("exteditor_host_crash.log")
}

/// Append-only file that truncates itself once it outgrows `max_bytes`.
struct RotatingFile {
    path: PathBuf,
    file: fs::File,
    max_bytes: u64,
    bytes_written: u64,
}

impl RotatingFile {
    fn open(path: PathBuf, max_bytes: u64) -> Option<Self> {
        let mut bytes_written = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if bytes_written > max_bytes {
            let _ = fs::remove_file(&path);
            bytes_written = 0;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok()?;
        Some(Self {
            path,
            file,
            max_bytes,
            bytes_written,
        })
    }

    fn write_line(&mut self, line: &str) {
        if self.bytes_written.saturating_add(line.len() as u64) > self.max_bytes {
            if let Ok(file) = fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)
            {
                self.file = file;
                self.bytes_written = 0;
            }
        }
        if self.file.write_all(line.as_bytes()).is_ok() {
            self.bytes_written = self.bytes_written.saturating_add(line.len() as u64);
        }
    }
}

#[derive(Default)]
struct LogState {
    writer: Option<RotatingFile>,
}

fn log_state() -> &'static Mutex<LogState> {
    LOG_STATE.get_or_init(|| Mutex::new(LogState::default()))
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn apply_flags(enabled: bool, content_enabled: bool, timings_enabled: bool) {
    LOG_ENABLED.store(enabled, Ordering::Relaxed);
    LOG_CONTENT_ENABLED.store(enabled && content_enabled, Ordering::Relaxed);
    LOG_TIMINGS_ENABLED.store(enabled && timings_enabled, Ordering::Relaxed);

    let mut state = log_state()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    state.writer = if enabled {
        RotatingFile::open(log_file_path(), LOG_MAX_BYTES)
    } else {
        None
    };
}

/// Configure logging based on CLI flags or environment.
pub fn init_logging(config: &HostConfig) {
    apply_flags(
        config.logging_enabled(),
        config.log_content,
        config.log_timings,
    );
}

/// Write a debug line to the log file when logging is enabled.
pub fn log_debug(msg: &str) {
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let line = format!("[{}] {msg}\n", unix_secs());
    let mut state = log_state()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(writer) = state.writer.as_mut() {
        writer.write_line(&line);
    }
}

/// Write logs that may contain user content (file text, paths, URIs).
pub fn log_debug_content(msg: &str) {
    if !LOG_CONTENT_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    log_debug(msg);
}

/// Record how long a step took, only with `--log-timings`.
pub fn log_timing(step: &str, elapsed: Duration) {
    if !LOG_TIMINGS_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    log_debug(&format!("timing {step}: {:.3}ms", elapsed.as_secs_f64() * 1000.0));
}

/// Write a minimal crash log entry, omitting the payload unless content logging is on.
pub fn log_panic(info: &panic::PanicHookInfo<'_>) {
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown".to_string());

    let payload = if LOG_CONTENT_ENABLED.load(Ordering::Relaxed) {
        if let Some(text) = info.payload().downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = info.payload().downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        }
    } else {
        "panic payload omitted (log-content disabled)".to_string()
    };

    let line = format!(
        "[{}] panic at {location}: {payload} (v{})\n",
        unix_secs(),
        env!("CARGO_PKG_VERSION")
    );
    if let Some(mut crash_log) = RotatingFile::open(crash_log_path(), CRASH_LOG_MAX_BYTES) {
        crash_log.write_line(&line);
    }
}

#[cfg(test)]
pub(crate) fn set_logging_for_tests(enabled: bool, content_enabled: bool) {
    apply_flags(enabled, content_enabled, enabled);
}
