//! Native messaging host for the external-editor browser extension.
//!
//! The browser starts this binary and speaks length-prefixed JSON over
//! stdin/stdout. Diagnostics go to files in the temp dir, never to stdout.

use anyhow::{Context, Result};
use exteditor_host::signals::install_termination_handlers;
use exteditor_host::{
    init_logging, init_tracing, log_debug, log_debug_content, log_file_path, log_panic, run_host,
    HostConfig,
};
use std::panic;
use std::process;

fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        log_panic(info);
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        log_debug(&format!("panic at {location}"));
        log_debug_content(&format!("panic: {info}"));
        previous(info);
    }));
}

fn main() -> Result<()> {
    let config = HostConfig::parse_args()?;
    init_logging(&config);
    init_tracing(&config);
    install_panic_hook();
    log_debug("=== exteditor host started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));
    log_debug_content(&format!("run dir: {}", config.run_dir().display()));

    install_termination_handlers().context("installing signal handlers")?;

    let code = run_host(&config)?;
    log_debug(&format!("exiting with code {code}"));
    process::exit(code);
}
