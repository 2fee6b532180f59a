//! Native-messaging host: framing, command routing, and the session loop.
//!
//! The extension talks to the host over stdin/stdout. Each frame is one JSON
//! object; inbound objects are keyed by command, outbound objects by reply.

pub mod codec;
pub mod protocol;
mod router;
mod session;
#[cfg(test)]
mod tests;

pub use codec::{encode, FrameDecoder, PREFIX_LEN};
pub use protocol::{Command, HostMessage, HostStatus};
pub use router::{DispatchResult, Dispatched, Router};
pub use session::{
    run_host, run_session, spawn_stdin_reader, HostSession, Inbound, EXIT_CLEAN, EXIT_FATAL,
};
