use crate::config::HostConfig;
use crate::editor::{LaunchCompletion, ProcessLauncher};
use crate::error::{HostError, HostResult};
use crate::signals::{exit_code_for_signal, take_termination_signal};
use crate::temp_store::{FsBackend, StoreBackend, TempFileStore};
use crate::{log_debug, log_debug_content};
use anyhow::Result;
use crossbeam_channel::{never, select, unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use super::codec::{encode, FrameDecoder};
use super::protocol::HostMessage;
use super::router::Router;

/// How often the loop wakes to check for termination signals.
const SESSION_TICK_MS: u64 = 50;
const STDIN_READ_BUFFER_BYTES: usize = 64 * 1024;

/// Exit code for stdin EOF.
pub const EXIT_CLEAN: i32 = 0;
/// Exit code for fatal protocol or startup failures.
pub const EXIT_FATAL: i32 = 1;

// ============================================================================
// Stdin
// ============================================================================

/// Raw input forwarded by the reader thread.
#[derive(Debug)]
pub enum Inbound {
    Chunk(Vec<u8>),
    Eof,
    Failed(String),
}

/// Forward stdin to `tx` as raw chunks; no framing happens on this thread.
pub fn spawn_stdin_reader(tx: Sender<Inbound>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buf = vec![0u8; STDIN_READ_BUFFER_BYTES];
        loop {
            let event = match stdin.read(&mut buf) {
                Ok(0) => Inbound::Eof,
                Ok(n) => Inbound::Chunk(buf[..n].to_vec()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => Inbound::Failed(err.to_string()),
            };
            let done = !matches!(event, Inbound::Chunk(_));
            if tx.send(event).is_err() || done {
                return;
            }
        }
    })
}

// ============================================================================
// Session
// ============================================================================

/// One connection to the extension: decoder, router, and output sink.
pub struct HostSession<W: Write, B: StoreBackend = FsBackend> {
    decoder: FrameDecoder,
    router: Router<B>,
    out: W,
    max_frame_bytes: usize,
    next_message_id: u64,
    /// Outstanding editor launches per message id
    in_flight: HashMap<u64, usize>,
    finished: bool,
}

impl<W: Write, B: StoreBackend> HostSession<W, B> {
    pub fn new(router: Router<B>, out: W, max_frame_bytes: usize) -> Self {
        Self {
            decoder: FrameDecoder::new(max_frame_bytes),
            router,
            out,
            max_frame_bytes,
            next_message_id: 0,
            in_flight: HashMap::new(),
            finished: false,
        }
    }

    pub fn router(&self) -> &Router<B> {
        &self.router
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Messages still waiting on at least one editor.
    pub fn pending_messages(&self) -> usize {
        self.in_flight.len()
    }

    /// Create the temp tree and announce readiness.
    pub fn start(&mut self) -> HostResult<()> {
        self.router.store_mut().prepare()?;
        self.send(&HostMessage::ready())?;
        log_debug("host session ready");
        tracing::info!(pid = std::process::id(), "host ready");
        Ok(())
    }

    /// Decode `chunk` fully, then dispatch each frame in arrival order.
    ///
    /// An `Err` is always fatal for the session.
    pub fn handle_chunk(&mut self, chunk: &[u8]) -> HostResult<()> {
        let messages = self.decoder.decode(chunk)?;
        for message in messages {
            let message_id = self.next_message_id;
            self.next_message_id += 1;

            let dispatched = self.router.dispatch(message_id, &message);
            for reply in dispatched.replies() {
                self.send(reply)?;
            }

            let pending = dispatched.launches().len();
            if pending == 0 {
                log_debug(&format!(
                    "message {message_id} complete ({} keys)",
                    dispatched.outcomes.len()
                ));
            } else {
                self.in_flight.insert(message_id, pending);
            }
        }
        Ok(())
    }

    /// Record an editor exit; logs the message once its last editor is done.
    pub fn handle_completion(&mut self, completion: LaunchCompletion) {
        let LaunchCompletion { tag, pid, result } = completion;
        match &result {
            Ok(outcome) => {
                if !outcome.stdout.is_empty() {
                    log_debug_content(&format!("editor {pid} stdout: {}", outcome.stdout.trim_end()));
                }
                if !outcome.stderr.is_empty() {
                    log_debug_content(&format!("editor {pid} stderr: {}", outcome.stderr.trim_end()));
                }
                tracing::info!(pid, message_id = tag, "editor exited");
            }
            Err(err) => {
                log_debug(&format!("editor {pid} failed: {err}"));
                tracing::warn!(pid, message_id = tag, error = %err, "editor failed");
            }
        }

        if let Some(remaining) = self.in_flight.get_mut(&tag) {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.in_flight.remove(&tag);
                log_debug(&format!("message {tag} complete"));
            }
        }
    }

    /// Announce exit and remove the per-run temp root. Runs at most once.
    pub fn shutdown(&mut self, code: i32) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(err) = self.send(&HostMessage::exit(code)) {
            log_debug(&format!("exit status not delivered: {err}"));
        }
        self.router.store_mut().purge_all();
        log_debug(&format!("host session shut down with code {code}"));
        tracing::info!(code, "host shut down");
    }

    /// Frame and write one message. Oversized messages are dropped; a failed
    /// write means the peer is gone and is reported as a protocol error.
    fn send(&mut self, message: &HostMessage) -> HostResult<()> {
        let frame = match encode(message, self.max_frame_bytes) {
            Ok(frame) => frame,
            Err(err @ HostError::FrameTooLarge { .. }) => {
                log_debug(&format!("dropping {}: {err}", message.name()));
                tracing::warn!(message = message.name(), error = %err, "outbound frame dropped");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        self.out
            .write_all(&frame)
            .and_then(|()| self.out.flush())
            .map_err(|err| HostError::Protocol(format!("stdout write failed: {err}")))
    }
}

/// Unwinding out of the loop still announces exit and removes the temp root.
impl<W: Write, B: StoreBackend> Drop for HostSession<W, B> {
    fn drop(&mut self) {
        if !self.finished {
            self.shutdown(EXIT_FATAL);
        }
    }
}

// ============================================================================
// Loop
// ============================================================================

/// Drive `session` until EOF, a fatal error, or `shutdown_probe` yields an exit
/// code. After EOF the loop stops reading and keeps collecting editor exits
/// until no message is pending, so temp files outlive their editors. Shutdown
/// runs on every path; the returned code is the process exit code.
pub fn run_session<W, B, F>(
    session: &mut HostSession<W, B>,
    inbound: &Receiver<Inbound>,
    completions: &Receiver<LaunchCompletion>,
    mut shutdown_probe: F,
) -> i32
where
    W: Write,
    B: StoreBackend,
    F: FnMut() -> Option<i32>,
{
    if let Err(err) = session.start() {
        log_debug(&format!("host startup failed: {err}"));
        tracing::error!(error = %err, "host startup failed");
        session.shutdown(EXIT_FATAL);
        return EXIT_FATAL;
    }

    let tick_interval = Duration::from_millis(SESSION_TICK_MS);
    let closed = never::<Inbound>();
    let mut draining = false;
    let code = loop {
        if let Some(code) = shutdown_probe() {
            log_debug(&format!("termination requested, exit code {code}"));
            break code;
        }
        if draining && session.pending_messages() == 0 {
            break EXIT_CLEAN;
        }
        let inbound = if draining { &closed } else { inbound };
        select! {
            recv(inbound) -> event => match event {
                Ok(Inbound::Chunk(bytes)) => {
                    if let Err(err) = session.handle_chunk(&bytes) {
                        log_debug(&format!("fatal: {err}"));
                        tracing::error!(error = %err, "session terminated");
                        break EXIT_FATAL;
                    }
                }
                Ok(Inbound::Eof) | Err(_) => {
                    log_debug(&format!(
                        "stdin closed, waiting on {} message(s)",
                        session.pending_messages()
                    ));
                    draining = true;
                }
                Ok(Inbound::Failed(err)) => {
                    log_debug(&format!("stdin read error: {err}"));
                    break EXIT_FATAL;
                }
            },
            recv(completions) -> completion => {
                if let Ok(completion) = completion {
                    session.handle_completion(completion);
                }
            }
            default(tick_interval) => {}
        }
    };

    session.shutdown(code);
    code
}

/// Serve the extension over the process's stdin and stdout.
pub fn run_host(config: &HostConfig) -> Result<i32> {
    let store = TempFileStore::on_disk(config.run_dir());
    let (launcher, completions) = ProcessLauncher::new();
    let router = Router::new(store, launcher);
    let stdout = io::stdout();
    let mut session = HostSession::new(router, stdout.lock(), config.max_frame_bytes);

    let (tx, inbound) = unbounded();
    let _reader = spawn_stdin_reader(tx);

    Ok(run_session(&mut session, &inbound, &completions, || {
        take_termination_signal().map(exit_code_for_signal)
    }))
}
