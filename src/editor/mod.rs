//! Editor configuration, argument tokenizing, and process launching.

pub mod args;
mod launcher;

use crate::error::{HostError, HostResult};
use crate::fs_util;
use serde::{Deserialize, Deserializer};
use std::path::Path;

pub use args::{escape_path_arg, normalize_arg, split_line, tokenize, RawArgs};
pub use launcher::{LaunchCompletion, LaunchOutcome, LaunchTicket, ProcessLauncher};

/// How the external editor is invoked. Owned by the router, read by every launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorConfig {
    pub editor_path: String,
    pub cmd_args: RawArgs,
    /// Place `cmd_args` before the target file instead of after it.
    pub cmd_args_before_file: bool,
}

/// Editor config file contents. An absent key leaves the current value
/// untouched; an explicit `null` resets it to the default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfigPatch {
    #[serde(default, deserialize_with = "present")]
    pub editor_path: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub cmd_args: Option<Option<RawArgs>>,
    #[serde(default, deserialize_with = "present")]
    pub cmd_args_before_file: Option<Option<bool>>,
}

/// Outer `Some` for any key that appears, so `null` is told apart from absence.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl EditorConfigPatch {
    pub fn parse(text: &str) -> HostResult<Self> {
        serde_json::from_str(text)
            .map_err(|err| HostError::Config(format!("unparsable editor config: {err}")))
    }
}

impl EditorConfig {
    pub fn apply(&mut self, patch: EditorConfigPatch) {
        if let Some(path) = patch.editor_path {
            self.editor_path = path.unwrap_or_default();
        }
        if let Some(args) = patch.cmd_args {
            self.cmd_args = args.unwrap_or_default();
        }
        if let Some(before) = patch.cmd_args_before_file {
            self.cmd_args_before_file = before.unwrap_or_default();
        }
    }

    /// Display name of the editor binary.
    pub fn editor_name(&self) -> String {
        fs_util::file_name_from_path(&self.editor_path)
    }

    pub fn editor_executable(&self) -> bool {
        !self.editor_path.is_empty() && fs_util::is_executable(Path::new(&self.editor_path))
    }

    /// Final argv for opening `file`.
    pub fn argv_for(&self, file: &Path) -> Vec<String> {
        let file_arg = RawArgs::List(vec![escape_path_arg(&file.to_string_lossy())]);
        let (first, second) = if self.cmd_args_before_file {
            (&self.cmd_args, &file_arg)
        } else {
            (&file_arg, &self.cmd_args)
        };
        let mut argv = tokenize(first);
        argv.extend(tokenize(second));
        argv
    }
}
