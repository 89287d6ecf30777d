//! bridge-transport: the TCP connection supervisor for mod-host.
//!
//! Two independent pieces, matching the two mod-host sockets:
//! `ModHostClient` for short-lived command round trips, `FeedbackReader` for
//! the long-lived, reconnecting feedback stream.

mod client;
mod feedback_reader;

pub use client::{parse_resp_int, ModHostClient};
pub use feedback_reader::{EventSink, FeedbackReader};
