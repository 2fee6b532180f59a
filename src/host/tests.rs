use super::*;
use crate::editor::LaunchCompletion;
use crate::temp_store::{MemoryBackend, TempFileStore};
use crossbeam_channel::{unbounded, Receiver};
use serde_json::{json, Value};
use std::fs;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MAX: usize = 1024 * 1024;

fn frame(value: &Value) -> Vec<u8> {
    encode(value, MAX).expect("encode")
}

fn disk_session(root: &Path) -> (HostSession<Vec<u8>>, Receiver<LaunchCompletion>) {
    let (launcher, completions) = crate::editor::ProcessLauncher::new();
    let router = Router::new(TempFileStore::on_disk(root), launcher);
    let mut session = HostSession::new(router, Vec::new(), MAX);
    session.start().expect("start");
    (session, completions)
}

fn memory_session() -> HostSession<Vec<u8>, MemoryBackend> {
    let (launcher, _completions) = crate::editor::ProcessLauncher::new();
    let store = TempFileStore::new("/run/exteditorhost/1", MemoryBackend::new());
    let mut session = HostSession::new(Router::new(store, launcher), Vec::new(), MAX);
    session.start().expect("start");
    session
}

/// Every frame written so far, minus the leading ready status.
fn replies<B: crate::temp_store::StoreBackend>(session: &HostSession<Vec<u8>, B>) -> Vec<Value> {
    let mut frames = FrameDecoder::new(MAX)
        .decode(session.writer())
        .expect("decode output");
    assert_eq!(frames.remove(0)["host-status"]["status"], "ready");
    frames
}

fn descriptor(window_id: Value, tab_id: Value, file_name: &str) -> Value {
    json!({
        "dir": "tmpfiles",
        "windowId": window_id,
        "tabId": tab_id,
        "host": "example.com",
        "fileName": file_name,
        "dataId": "field-1",
        "mode": "text",
    })
}

fn create_message(data: &Value, value: &str) -> Value {
    json!({"temp-file-create": {"data": data, "value": value}})
}

fn write_stub_editor(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("stub-editor.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
    path
}

fn write_editor_config(dir: &Path, editor: &Path) -> PathBuf {
    let path = dir.join("editorconfig.json");
    fs::write(
        &path,
        json!({"editorPath": editor.to_string_lossy()}).to_string(),
    )
    .expect("write config");
    path
}

fn config_message(config: &Path) -> Value {
    json!({"editor-config-get": config.to_string_lossy()})
}

/// Output sink that outlives the session owning it.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("output lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Startup and shutdown
// -------------------------------------------------------------------------

#[test]
fn start_announces_ready_with_pid() {
    let session = memory_session();
    let frames = FrameDecoder::new(MAX)
        .decode(session.writer())
        .expect("decode");
    assert_eq!(
        frames,
        vec![json!({"host-status": {
            "pid": std::process::id().to_string(),
            "status": "ready",
        }})]
    );
}

#[test]
fn shutdown_reports_code_once_and_removes_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("run");
    let (mut session, _rx) = disk_session(&root);
    assert!(root.join("tmpfiles").is_dir());
    assert!(root.join("tmpfiles_pb").is_dir());

    session.shutdown(143);
    session.shutdown(0);
    let frames = replies(&session);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["host-status"]["status"], "exit");
    assert_eq!(frames[0]["host-status"]["exit"], 143);
    assert!(!root.exists());
}

// -------------------------------------------------------------------------
// temp-file-create / temp-file-get
// -------------------------------------------------------------------------

#[test]
fn temp_file_create_writes_file_and_echoes_descriptor() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut session, _rx) = disk_session(dir.path());
    let data = descriptor(json!(1), json!(2), "1.txt");

    session
        .handle_chunk(&frame(&create_message(&data, "hello")))
        .expect("chunk");

    let expected_path = dir.path().join("tmpfiles/1/2/example.com/1.txt");
    assert_eq!(fs::read_to_string(&expected_path).expect("read"), "hello");
    assert_eq!(
        replies(&session),
        vec![json!({"file-data": {
            "filePath": expected_path.to_string_lossy(),
            "data": data,
        }})]
    );
    assert_eq!(session.pending_messages(), 0);
}

#[test]
fn incomplete_descriptor_writes_nothing() {
    let mut session = memory_session();
    let mut data = descriptor(json!("1"), json!("2"), "1.txt");
    data["host"] = json!("");
    session
        .handle_chunk(&frame(&create_message(&data, "hello")))
        .expect("chunk");
    assert!(replies(&session).is_empty());
    let store = session.router().store();
    assert_eq!(store.backend().entries_under(&store.regular_dir()), 0);
}

#[test]
fn back_to_back_frames_in_one_chunk_are_both_handled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut session, _rx) = disk_session(dir.path());
    let first = descriptor(json!(1), json!(1), "a.txt");
    let second = descriptor(json!(1), json!(1), "b.txt");

    let mut chunk = frame(&create_message(&first, "one"));
    chunk.extend(frame(&create_message(&second, "two")));
    session.handle_chunk(&chunk).expect("chunk");

    let frames = replies(&session);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["file-data"]["data"]["fileName"], "a.txt");
    assert_eq!(frames[1]["file-data"]["data"]["fileName"], "b.txt");
}

#[test]
fn frame_split_across_one_byte_chunks_dispatches_once() {
    let mut session = memory_session();
    let data = descriptor(json!(4), json!(9), "split.txt");
    let bytes = frame(&create_message(&data, "split"));
    for byte in &bytes {
        session
            .handle_chunk(std::slice::from_ref(byte))
            .expect("chunk");
    }
    let frames = replies(&session);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["file-data"]["data"], data);
}

#[test]
fn temp_file_get_returns_current_text_with_timestamp() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut session, _rx) = disk_session(dir.path());
    let data = descriptor(json!(1), json!(7), "1.txt");
    session
        .handle_chunk(&frame(&create_message(&data, "draft")))
        .expect("create");
    let path = dir.path().join("tmpfiles/1/7/example.com/1.txt");
    fs::write(&path, "edited in editor").expect("external edit");

    let get = json!({"temp-file-get": {
        "filePath": path.to_string_lossy(),
        "dataId": "field-1",
        "tabId": 7,
    }});
    session.handle_chunk(&frame(&get)).expect("get");

    let frames = replies(&session);
    let sync = &frames[1]["sync-text"];
    assert_eq!(sync["value"], "edited in editor");
    assert_eq!(sync["dataId"], "field-1");
    assert_eq!(sync["tabId"], 7);
    assert_eq!(sync["data"]["filePath"], path.to_string_lossy().into_owned());
    assert!(sync["data"]["timestamp"].as_u64().expect("timestamp") > 0);
}

#[test]
fn temp_file_get_for_missing_file_is_silent() {
    let mut session = memory_session();
    let get = json!({"temp-file-get": {
        "filePath": "/run/exteditorhost/1/tmpfiles/1/1/a.org/gone.txt",
        "dataId": "x",
    }});
    session.handle_chunk(&frame(&get)).expect("get");
    session
        .handle_chunk(&frame(&json!({"temp-file-get": {}})))
        .expect("get");
    assert!(replies(&session).is_empty());
}

#[test]
fn oversized_reply_is_dropped_without_ending_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (launcher, _rx) = crate::editor::ProcessLauncher::new();
    let router = Router::new(TempFileStore::on_disk(dir.path()), launcher);
    let mut session = HostSession::new(router, Vec::new(), 1024);
    session.start().expect("start");

    let data = descriptor(json!(1), json!(1), "big.txt");
    session
        .handle_chunk(&frame(&create_message(&data, "small")))
        .expect("create");
    let path = dir.path().join("tmpfiles/1/1/example.com/big.txt");
    fs::write(&path, "x".repeat(4096)).expect("grow file");

    let get = json!({"temp-file-get": {"filePath": path.to_string_lossy()}});
    session.handle_chunk(&frame(&get)).expect("oversized reply is not fatal");

    let frames = replies(&session);
    assert_eq!(frames.len(), 1);
    assert!(frames[0].get("file-data").is_some());
}

// -------------------------------------------------------------------------
// temp-files-pb-remove
// -------------------------------------------------------------------------

#[test]
fn private_purge_requires_truthy_payload() {
    let mut session = memory_session();
    let mut data = descriptor(json!(1), json!(1), "p.txt");
    data["dir"] = json!("tmpfiles_pb");
    session
        .handle_chunk(&frame(&create_message(&data, "secret")))
        .expect("create");
    let private = session.router().store().private_dir();

    for falsy in [json!(false), json!(0), json!(""), json!(null)] {
        session
            .handle_chunk(&frame(&json!({"temp-files-pb-remove": falsy})))
            .expect("noop");
        assert!(session.router().store().backend().entries_under(&private) > 0);
    }

    session
        .handle_chunk(&frame(&json!({"temp-files-pb-remove": true})))
        .expect("purge");
    let backend = session.router().store().backend();
    assert!(backend.has_dir(&private));
    assert_eq!(backend.entries_under(&private), 0);
    assert_eq!(replies(&session).len(), 1);
}

// -------------------------------------------------------------------------
// editor-config-get / launches
// -------------------------------------------------------------------------

#[test]
fn editor_config_get_replies_with_merged_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let editor = write_stub_editor(dir.path(), "exit 0");
    let config_path = dir.path().join("editorconfig.json");
    fs::write(
        &config_path,
        json!({
            "editorPath": editor.to_string_lossy(),
            "cmdArgs": "-n --wait",
            "cmdArgsBeforeFile": true,
            "unknownKey": 1,
        })
        .to_string(),
    )
    .expect("write config");

    let mut session = memory_session();
    let msg = json!({"editor-config-get": config_path.to_string_lossy()});
    session.handle_chunk(&frame(&msg)).expect("config");

    assert_eq!(
        replies(&session),
        vec![json!({"editor-config-res": {
            "editorName": "stub-editor.sh",
            "editorPath": editor.to_string_lossy(),
            "executable": true,
        }})]
    );
    let config = session.router().editor_config();
    assert!(config.cmd_args_before_file);
    assert_eq!(config.argv_for(Path::new("/f")), vec!["-n", "--wait", "/f"]);
}

#[test]
fn failing_key_does_not_block_the_others() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut session, _rx) = disk_session(dir.path());
    let data = descriptor(json!(1), json!(1), "1.txt");
    let msg = json!({
        "editor-config-get": dir.path().join("missing.json").to_string_lossy(),
        "local-file-view": {"uri": "https://example.com/not-a-file"},
        "temp-file-create": {"data": data, "value": "still written"},
    });
    session.handle_chunk(&frame(&msg)).expect("chunk");

    let frames = replies(&session);
    assert_eq!(frames.len(), 1);
    assert!(frames[0].get("file-data").is_some());
}

#[test]
fn unknown_keys_and_non_objects_are_ignored() {
    let mut session = memory_session();
    session
        .handle_chunk(&frame(&json!({"bogus": {"x": 1}})))
        .expect("unknown key");
    session.handle_chunk(&frame(&json!([1, 2]))).expect("array");
    session.handle_chunk(&frame(&json!("text"))).expect("string");
    assert!(replies(&session).is_empty());
}

#[test]
fn launch_completion_finishes_message() {
    let dir = tempfile::tempdir().expect("tempdir");
    let editor = write_stub_editor(dir.path(), "exit 0");
    let config_path = write_editor_config(dir.path(), &editor);

    let (mut session, completions) = disk_session(&dir.path().join("run"));
    session
        .handle_chunk(&frame(&config_message(&config_path)))
        .expect("config");
    let data = descriptor(json!(1), json!(1), "1.txt");
    session
        .handle_chunk(&frame(&create_message(&data, "open me")))
        .expect("create");
    assert_eq!(session.pending_messages(), 1);

    let completion = completions
        .recv_timeout(Duration::from_secs(10))
        .expect("editor completion");
    assert!(completion.result.is_ok());
    session.handle_completion(completion);
    assert_eq!(session.pending_messages(), 0);
}

#[test]
fn config_then_create_in_one_chunk_uses_fresh_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let editor = write_stub_editor(dir.path(), "exit 0");
    let config_path = write_editor_config(dir.path(), &editor);
    let (mut session, completions) = disk_session(&dir.path().join("run"));

    let data = descriptor(json!(1), json!(1), "1.txt");
    let mut chunk = frame(&config_message(&config_path));
    chunk.extend(frame(&create_message(&data, "hello")));
    session.handle_chunk(&chunk).expect("chunk");

    let frames = replies(&session);
    assert_eq!(frames.len(), 2);
    assert_eq!(
        frames[0]["editor-config-res"]["editorPath"],
        editor.to_string_lossy().into_owned()
    );
    assert_eq!(frames[1]["file-data"]["data"], data);
    assert_eq!(session.pending_messages(), 1);

    let completion = completions
        .recv_timeout(Duration::from_secs(10))
        .expect("editor completion");
    assert!(completion.result.is_ok());
    session.handle_completion(completion);
    assert_eq!(session.pending_messages(), 0);
}

// -------------------------------------------------------------------------
// Protocol failures and the run loop
// -------------------------------------------------------------------------

#[test]
fn invalid_frames_are_fatal() {
    let mut session = memory_session();
    let mut bad = 5u32.to_ne_bytes().to_vec();
    bad.extend_from_slice(b"nope!");
    assert!(session.handle_chunk(&bad).unwrap_err().is_fatal());

    let mut session = memory_session();
    let oversized = ((MAX + 1) as u32).to_ne_bytes();
    assert!(session.handle_chunk(&oversized).is_err());
}

#[test]
fn run_session_exits_cleanly_on_eof() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("run");
    let (launcher, completions) = crate::editor::ProcessLauncher::new();
    let router = Router::new(TempFileStore::on_disk(&root), launcher);
    let mut session = HostSession::new(router, Vec::new(), MAX);

    let (tx, inbound) = unbounded();
    let data = descriptor(json!(1), json!(1), "1.txt");
    tx.send(Inbound::Chunk(frame(&create_message(&data, "hello"))))
        .expect("send");
    tx.send(Inbound::Eof).expect("send");

    let code = run_session(&mut session, &inbound, &completions, || None);
    assert_eq!(code, EXIT_CLEAN);

    let frames = replies(&session);
    assert_eq!(frames.len(), 2);
    assert!(frames[0].get("file-data").is_some());
    assert_eq!(frames[1]["host-status"]["exit"], 0);
    assert!(!root.exists());
}

#[test]
fn eof_waits_for_running_editors_before_cleanup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let seen = dir.path().join("seen.txt");
    let editor = write_stub_editor(
        dir.path(),
        &format!("sleep 1\ncat \"$1\" > '{}'", seen.display()),
    );
    let config_path = write_editor_config(dir.path(), &editor);
    let root = dir.path().join("run");
    let (launcher, completions) = crate::editor::ProcessLauncher::new();
    let router = Router::new(TempFileStore::on_disk(&root), launcher);
    let mut session = HostSession::new(router, Vec::new(), MAX);

    let (tx, inbound) = unbounded();
    let data = descriptor(json!(1), json!(1), "1.txt");
    tx.send(Inbound::Chunk(frame(&config_message(&config_path))))
        .expect("send");
    tx.send(Inbound::Chunk(frame(&create_message(&data, "hello"))))
        .expect("send");
    tx.send(Inbound::Eof).expect("send");

    let code = run_session(&mut session, &inbound, &completions, || None);
    assert_eq!(code, EXIT_CLEAN);
    assert_eq!(session.pending_messages(), 0);
    assert_eq!(fs::read_to_string(&seen).expect("editor read its file"), "hello");
    assert!(!root.exists());
    let frames = replies(&session);
    assert_eq!(frames.last().expect("exit frame")["host-status"]["exit"], 0);
}

#[test]
fn panic_inside_session_still_cleans_up() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("run");
    let out = SharedBuf::default();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let (launcher, _rx) = crate::editor::ProcessLauncher::new();
        let router = Router::new(TempFileStore::on_disk(&root), launcher);
        let mut session = HostSession::new(router, out.clone(), MAX);
        session.start().expect("start");
        let data = descriptor(json!(1), json!(1), "1.txt");
        session
            .handle_chunk(&frame(&create_message(&data, "draft")))
            .expect("create");
        assert!(root.join("tmpfiles/1/1/example.com/1.txt").is_file());
        panic!("session invariant violated");
    }));
    assert!(result.is_err());
    assert!(!root.exists());

    let bytes = out.0.lock().expect("output lock").clone();
    let frames = FrameDecoder::new(MAX).decode(&bytes).expect("decode");
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2]["host-status"]["status"], "exit");
    assert_eq!(frames[2]["host-status"]["exit"], EXIT_FATAL);
}

#[test]
fn run_session_stops_on_protocol_error() {
    let mut session = memory_session_unstarted();
    let (_launcher, completions) = crate::editor::ProcessLauncher::new();
    let (tx, inbound) = unbounded();
    tx.send(Inbound::Chunk(u32::MAX.to_ne_bytes().to_vec()))
        .expect("send");

    let code = run_session(&mut session, &inbound, &completions, || None);
    assert_eq!(code, EXIT_FATAL);
    let frames = replies(&session);
    assert_eq!(frames[0]["host-status"]["exit"], EXIT_FATAL);
}

#[test]
fn run_session_honors_termination_probe() {
    let mut session = memory_session_unstarted();
    let (_launcher, completions) = crate::editor::ProcessLauncher::new();
    let (_tx, inbound) = unbounded::<Inbound>();
    let mut polls = 0;

    let code = run_session(&mut session, &inbound, &completions, || {
        polls += 1;
        (polls > 2).then_some(128 + libc::SIGTERM)
    });
    assert_eq!(code, 143);
    let frames = replies(&session);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["host-status"]["exit"], 143);
}

fn memory_session_unstarted() -> HostSession<Vec<u8>, MemoryBackend> {
    let (launcher, _completions) = crate::editor::ProcessLauncher::new();
    let store = TempFileStore::new("/run/exteditorhost/2", MemoryBackend::new());
    HostSession::new(Router::new(store, launcher), Vec::new(), MAX)
}
