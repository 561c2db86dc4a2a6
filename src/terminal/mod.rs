//! One WebSocket per browser tab multiplexing many PTY sessions, each
//! addressed by a client-chosen session id. Socket loss detaches sessions
//! rather than killing them (see [`registry`] and [`ws::handle_socket`]).

mod framing;
mod registry;
mod ws;

pub use registry::{PtyRegistry, PtySession, PtyState, SpawnParams};
pub use ws::handle_socket;
