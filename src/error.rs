//! Error taxonomy shared by the codec, store, launcher, and router.

use std::io;
use std::path::PathBuf;

/// Failures the host can hit while serving the extension.
///
/// `Protocol` and `Encoding` end the session; everything else is scoped to the
/// command key that produced it.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Malformed or oversized inbound frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Outbound value could not be framed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Outbound payload larger than the peer accepts; only that message is dropped.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("filesystem error at '{}': {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Editor could not be started or exited unsuccessfully.
    #[error("launch error: {0}")]
    Launch(String),

    #[error("config error: {0}")]
    Config(String),
}

impl HostError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether the session must stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Encoding(_))
    }
}

pub type HostResult<T> = Result<T, HostError>;
