use super::EditorConfig;
use crate::error::{HostError, HostResult};
use crate::{fs_util, log_debug, log_debug_content, log_timing};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Instant;

/// Captured result of an editor process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Sent by the waiter thread once the editor exits.
#[derive(Debug)]
pub struct LaunchCompletion {
    /// Caller-chosen tag, the originating message id for the router.
    pub tag: u64,
    pub pid: u32,
    pub result: HostResult<LaunchOutcome>,
}

/// Returned when an editor process was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTicket {
    pub pid: u32,
    pub argv: Vec<String>,
}

/// Spawns the editor and reports each exit on a shared completion channel.
pub struct ProcessLauncher {
    completions: Sender<LaunchCompletion>,
}

impl ProcessLauncher {
    pub fn new() -> (Self, Receiver<LaunchCompletion>) {
        let (tx, rx) = unbounded();
        (Self { completions: tx }, rx)
    }

    /// Open `file` in the configured editor.
    ///
    /// Returns `Ok(None)` without spawning when `file` is not a regular file or
    /// the editor is not executable. The argv is built by [`EditorConfig::argv_for`]
    /// and handed to the OS directly; no shell is involved.
    pub fn spawn(
        &self,
        file: &Path,
        editor: &EditorConfig,
        tag: u64,
    ) -> HostResult<Option<LaunchTicket>> {
        if !fs_util::is_file(file) {
            log_debug_content(&format!("launch skipped, not a file: {}", file.display()));
            return Ok(None);
        }
        if !editor.editor_executable() {
            log_debug("launch skipped, editor path is not executable");
            return Ok(None);
        }

        let argv = editor.argv_for(file);
        log_debug_content(&format!(
            "launching {} {}",
            editor.editor_path,
            shell_words::join(&argv)
        ));

        let child = Command::new(&editor.editor_path)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                HostError::Launch(format!("failed to start {}: {err}", editor.editor_name()))
            })?;

        let pid = child.id();
        let editor_name = editor.editor_name();
        let completions = self.completions.clone();
        let started = Instant::now();
        thread::spawn(move || {
            let result = match child.wait_with_output() {
                Ok(output) => {
                    let outcome = LaunchOutcome {
                        exit_code: output.status.code(),
                        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    };
                    if output.status.success() {
                        Ok(outcome)
                    } else {
                        let status = outcome
                            .exit_code
                            .map(|code| format!("exit code {code}"))
                            .unwrap_or_else(|| "signal".to_string());
                        Err(HostError::Launch(format!(
                            "{editor_name} exited with {status}: {}",
                            outcome.stderr.trim()
                        )))
                    }
                }
                Err(err) => Err(HostError::Launch(format!(
                    "failed waiting on {editor_name}: {err}"
                ))),
            };
            log_timing("editor session", started.elapsed());
            let _ = completions.send(LaunchCompletion { tag, pid, result });
        });

        tracing::info!(pid, tag, "editor launched");
        Ok(Some(LaunchTicket { pid, argv }))
    }
}
