//! Message shapes exchanged with the browser extension.
//!
//! Every frame carries one JSON object. Inbound objects are keyed by command
//! name; outbound objects have exactly one key naming the reply.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Commands (extension → host)
// ============================================================================

pub const EDITOR_CONFIG_GET: &str = "editor-config-get";
pub const LOCAL_FILE_VIEW: &str = "local-file-view";
pub const TMP_FILE_CREATE: &str = "temp-file-create";
pub const TMP_FILE_GET: &str = "temp-file-get";
pub const TMP_FILES_PB_REMOVE: &str = "temp-files-pb-remove";

/// Command keys the host understands; any other key is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    EditorConfigGet,
    LocalFileView,
    TempFileCreate,
    TempFileGet,
    TempFilesPrivateRemove,
}

impl Command {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            EDITOR_CONFIG_GET => Some(Command::EditorConfigGet),
            LOCAL_FILE_VIEW => Some(Command::LocalFileView),
            TMP_FILE_CREATE => Some(Command::TempFileCreate),
            TMP_FILE_GET => Some(Command::TempFileGet),
            TMP_FILES_PB_REMOVE => Some(Command::TempFilesPrivateRemove),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::EditorConfigGet => EDITOR_CONFIG_GET,
            Command::LocalFileView => LOCAL_FILE_VIEW,
            Command::TempFileCreate => TMP_FILE_CREATE,
            Command::TempFileGet => TMP_FILE_GET,
            Command::TempFilesPrivateRemove => TMP_FILES_PB_REMOVE,
        }
    }
}

/// Payload of `local-file-view`.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalFileView {
    pub uri: String,
}

/// Payload of `temp-file-create`. `data` is echoed back untouched in `file-data`.
#[derive(Debug, Clone, Deserialize)]
pub struct TempFileCreate {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub value: String,
}

/// String form of a descriptor field. Window and tab ids arrive as numbers or
/// strings depending on the browser, so both are accepted.
pub fn descriptor_field(data: &Value, name: &str) -> String {
    match data.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// JavaScript truthiness, used for flag-like payloads.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// Replies (host → extension)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Ready,
    Exit,
}

/// Messages emitted by the host. Serialized externally tagged, so each frame
/// is `{"<reply-name>": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HostMessage {
    /// Sent once on startup and once on shutdown. `pid` is the decimal
    /// process id as a string.
    #[serde(rename = "host-status")]
    HostStatus {
        pid: String,
        status: HostStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit: Option<i32>,
    },

    #[serde(rename = "editor-config-res", rename_all = "camelCase")]
    EditorConfigRes {
        editor_name: String,
        editor_path: String,
        executable: bool,
    },

    /// A temp file was written for the descriptor in `data`
    #[serde(rename = "file-data", rename_all = "camelCase")]
    FileData { file_path: String, data: Value },

    /// Current text of a temp file, with `data.timestamp` refreshed
    #[serde(rename = "sync-text", rename_all = "camelCase")]
    SyncText {
        data: Value,
        #[serde(skip_serializing_if = "Value::is_null")]
        data_id: Value,
        #[serde(skip_serializing_if = "Value::is_null")]
        tab_id: Value,
        value: String,
    },
}

impl HostMessage {
    pub fn ready() -> Self {
        HostMessage::HostStatus {
            pid: std::process::id().to_string(),
            status: HostStatus::Ready,
            exit: None,
        }
    }

    pub fn exit(code: i32) -> Self {
        HostMessage::HostStatus {
            pid: std::process::id().to_string(),
            status: HostStatus::Exit,
            exit: Some(code),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostMessage::HostStatus { .. } => "host-status",
            HostMessage::EditorConfigRes { .. } => "editor-config-res",
            HostMessage::FileData { .. } => "file-data",
            HostMessage::SyncText { .. } => "sync-text",
        }
    }
}
