use crate::editor::{EditorConfig, EditorConfigPatch, LaunchTicket, ProcessLauncher};
use crate::error::{HostError, HostResult};
use crate::fs_util::uri_to_file_path;
use crate::temp_store::{FsBackend, StoreBackend, TempFileKey, TempFileStore};
use crate::{log_debug, log_debug_content};
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::protocol::{
    descriptor_field, is_truthy, Command, HostMessage, LocalFileView, TempFileCreate,
};

// ============================================================================
// Dispatch Results
// ============================================================================

/// What one command key produced.
#[derive(Debug)]
pub enum DispatchResult {
    /// Editor config merged from the file named by the payload
    EditorConfigReply(HostMessage),
    /// `None` when the file is missing or the editor is unusable
    FileView(Option<LaunchTicket>),
    /// Temp file written; the editor launch is reported separately so its
    /// failure does not suppress the reply
    TempFileCreated {
        reply: HostMessage,
        launch: HostResult<Option<LaunchTicket>>,
    },
    /// Descriptor incomplete; nothing written
    TempFileSkipped,
    /// `None` when the file is empty or unreadable
    TempFileContent(Option<HostMessage>),
    PurgeComplete { purged: bool },
}

impl DispatchResult {
    pub fn reply(&self) -> Option<&HostMessage> {
        match self {
            DispatchResult::EditorConfigReply(reply)
            | DispatchResult::TempFileCreated { reply, .. } => Some(reply),
            DispatchResult::TempFileContent(reply) => reply.as_ref(),
            DispatchResult::FileView(_)
            | DispatchResult::TempFileSkipped
            | DispatchResult::PurgeComplete { .. } => None,
        }
    }

    pub fn launched(&self) -> Option<&LaunchTicket> {
        match self {
            DispatchResult::FileView(ticket) => ticket.as_ref(),
            DispatchResult::TempFileCreated {
                launch: Ok(ticket), ..
            } => ticket.as_ref(),
            _ => None,
        }
    }
}

/// Every command key of one inbound message, in the order they appeared.
#[derive(Debug)]
pub struct Dispatched {
    pub message_id: u64,
    pub outcomes: Vec<(Command, HostResult<DispatchResult>)>,
}

impl Dispatched {
    pub fn replies(&self) -> impl Iterator<Item = &HostMessage> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| outcome.as_ref().ok())
            .filter_map(DispatchResult::reply)
    }

    /// Pids of editors this message started and has not yet heard back from.
    pub fn launches(&self) -> Vec<u32> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| outcome.as_ref().ok())
            .filter_map(DispatchResult::launched)
            .map(|ticket| ticket.pid)
            .collect()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Owns the temp store, the editor config, and the launcher; maps command keys
/// to actions.
pub struct Router<B: StoreBackend = FsBackend> {
    store: TempFileStore<B>,
    editor: EditorConfig,
    launcher: ProcessLauncher,
}

impl<B: StoreBackend> Router<B> {
    pub fn new(store: TempFileStore<B>, launcher: ProcessLauncher) -> Self {
        Self {
            store,
            editor: EditorConfig::default(),
            launcher,
        }
    }

    pub fn store(&self) -> &TempFileStore<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TempFileStore<B> {
        &mut self.store
    }

    pub fn editor_config(&self) -> &EditorConfig {
        &self.editor
    }

    /// Run every recognized key of `message`. Unknown keys and non-object
    /// messages are ignored; one key failing never stops the others.
    pub fn dispatch(&mut self, message_id: u64, message: &Value) -> Dispatched {
        let mut outcomes = Vec::new();
        let Some(entries) = message.as_object() else {
            log_debug(&format!("message {message_id} ignored: not an object"));
            return Dispatched {
                message_id,
                outcomes,
            };
        };

        for (key, payload) in entries {
            let Some(command) = Command::from_key(key) else {
                log_debug(&format!("message {message_id}: ignoring key {key}"));
                continue;
            };
            let outcome = self.handle(command, payload, message_id);
            if let Err(err) = &outcome {
                log_debug(&format!(
                    "message {message_id}: {} failed: {err}",
                    command.as_str()
                ));
                tracing::warn!(message_id, command = command.as_str(), error = %err, "command failed");
            } else {
                tracing::debug!(message_id, command = command.as_str(), "command handled");
            }
            outcomes.push((command, outcome));
        }

        Dispatched {
            message_id,
            outcomes,
        }
    }

    fn handle(
        &mut self,
        command: Command,
        payload: &Value,
        message_id: u64,
    ) -> HostResult<DispatchResult> {
        match command {
            Command::EditorConfigGet => self.editor_config_get(payload),
            Command::LocalFileView => self.local_file_view(payload, message_id),
            Command::TempFileCreate => self.temp_file_create(payload, message_id),
            Command::TempFileGet => Ok(self.temp_file_get(payload)),
            Command::TempFilesPrivateRemove => self.purge_private(payload),
        }
    }

    fn editor_config_get(&mut self, payload: &Value) -> HostResult<DispatchResult> {
        let path = payload
            .as_str()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| HostError::Config("editor config path must be a string".into()))?;
        let text = fs::read_to_string(path).map_err(|err| HostError::fs(path, err))?;
        let patch = EditorConfigPatch::parse(&text)?;
        self.editor.apply(patch);
        log_debug_content(&format!("editor config loaded from {path}"));

        Ok(DispatchResult::EditorConfigReply(
            HostMessage::EditorConfigRes {
                editor_name: self.editor.editor_name(),
                editor_path: self.editor.editor_path.clone(),
                executable: self.editor.editor_executable(),
            },
        ))
    }

    fn local_file_view(&mut self, payload: &Value, message_id: u64) -> HostResult<DispatchResult> {
        let view: LocalFileView = serde_json::from_value(payload.clone())
            .map_err(|err| HostError::Config(format!("invalid local-file-view payload: {err}")))?;
        let path = uri_to_file_path(&view.uri)?;
        let ticket = self.launcher.spawn(&path, &self.editor, message_id)?;
        Ok(DispatchResult::FileView(ticket))
    }

    fn temp_file_create(
        &mut self,
        payload: &Value,
        message_id: u64,
    ) -> HostResult<DispatchResult> {
        let request: TempFileCreate = serde_json::from_value(payload.clone())
            .map_err(|err| HostError::Config(format!("invalid temp-file-create payload: {err}")))?;
        let key = TempFileKey {
            dir: descriptor_field(&request.data, "dir"),
            window_id: descriptor_field(&request.data, "windowId"),
            tab_id: descriptor_field(&request.data, "tabId"),
            host: descriptor_field(&request.data, "host"),
        };
        let file_name = descriptor_field(&request.data, "fileName");

        let Some(record) = self.store.create(&key, &file_name, &request.value)? else {
            return Ok(DispatchResult::TempFileSkipped);
        };

        let launch = self
            .launcher
            .spawn(&record.file_path, &self.editor, message_id);
        if let Err(err) = &launch {
            log_debug(&format!("message {message_id}: editor launch failed: {err}"));
        }
        Ok(DispatchResult::TempFileCreated {
            reply: HostMessage::FileData {
                file_path: record.file_path.to_string_lossy().into_owned(),
                data: request.data,
            },
            launch,
        })
    }

    fn temp_file_get(&self, payload: &Value) -> DispatchResult {
        let file_path = payload.get("filePath").and_then(Value::as_str);
        let record = self.store.fetch_with_timestamp(file_path.map(Path::new));

        let mut data = payload.clone();
        let Some(fields) = data.as_object_mut() else {
            return DispatchResult::TempFileContent(None);
        };
        fields.insert("timestamp".to_string(), Value::from(record.timestamp));
        if record.content.is_empty() {
            return DispatchResult::TempFileContent(None);
        }

        let data_id = fields.get("dataId").cloned().unwrap_or(Value::Null);
        let tab_id = fields.get("tabId").cloned().unwrap_or(Value::Null);
        DispatchResult::TempFileContent(Some(HostMessage::SyncText {
            data,
            data_id,
            tab_id,
            value: record.content,
        }))
    }

    fn purge_private(&mut self, payload: &Value) -> HostResult<DispatchResult> {
        if !is_truthy(payload) {
            return Ok(DispatchResult::PurgeComplete { purged: false });
        }
        self.store.purge_private()?;
        Ok(DispatchResult::PurgeComplete { purged: true })
    }
}
