//! Termination signal handling for the session loop.

use crate::log_debug;
use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicI32, Ordering};

static PENDING_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Only stores the signal number (async-signal-safe).
extern "C" fn handle_termination(signo: libc::c_int) {
    PENDING_SIGNAL.store(signo, Ordering::SeqCst);
}

/// Route SIGINT, SIGTERM and SIGHUP to the shutdown flag.
pub fn install_termination_handlers() -> Result<()> {
    for signo in [libc::SIGINT, libc::SIGTERM, libc::SIGHUP] {
        unsafe {
            // SAFETY: handle_termination only writes an atomic, which is
            // async-signal-safe.
            let handler = handle_termination as *const () as libc::sighandler_t;
            if libc::signal(signo, handler) == libc::SIG_ERR {
                log_debug(&format!("failed to install handler for signal {signo}"));
                return Err(anyhow!("failed to install handler for signal {signo}"));
            }
        }
    }
    Ok(())
}

/// Take the pending termination signal, if any.
pub fn take_termination_signal() -> Option<i32> {
    match PENDING_SIGNAL.swap(0, Ordering::SeqCst) {
        0 => None,
        signo => Some(signo),
    }
}

/// Shell convention for "terminated by signal".
pub fn exit_code_for_signal(signo: i32) -> i32 {
    128 + signo
}
