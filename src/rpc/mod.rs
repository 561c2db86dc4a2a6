//! JSON-RPC-over-stdio bridge to a long-lived child process (the agent CLI).
//!
//! One [`RpcClient`] owns at most one live child at a time. Requests are
//! correlated by integer id against a completion map; server-initiated
//! notifications and stderr lines are fanned out to every live subscriber.

mod client;

pub use client::{Notification, RpcClient, RpcEvent, Subscription};
