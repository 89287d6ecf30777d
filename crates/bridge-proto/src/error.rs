//! Error taxonomy shared by every bridge crate.
//!
//! Mirrors the four categories from the error handling design: transport,
//! protocol, domain and state failures. Each RPC handler collapses these
//! down to a single `{error: <message>}` reply; best-effort internal paths
//! log and continue instead of propagating.

use thiserror::Error;

/// Transport-layer failure: a socket could not be opened, written to, or
/// read from within its timeout.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection refused")]
    ConnectionRefused,

    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("connection closed by peer")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Protocol-layer failure: the bytes on the wire did not match what the
/// component expected.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid JSON")]
    InvalidJson,

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("missing required parameter: {0}")]
    MissingParam(&'static str),

    #[error("mod-host reply did not match the expected `resp <int>` shape: {0}")]
    UnexpectedReply(String),
}

/// Domain-layer failure: a well-formed request referred to something the
/// registry does not know about, or mod-host rejected the operation.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("unknown plugin uri: {0}")]
    UnknownUri(String),

    #[error("unknown instance id: {0}")]
    UnknownInstance(String),

    #[error("mod-host rejected the request with code {0}")]
    RejectedCode(i32),
}

/// State-layer failure: an operation was invoked before its prerequisite
/// state was established.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("audio system has not been initialized")]
    NotInitialized,
}

/// Umbrella error used wherever a handler needs to return any of the four
/// categories through a single `?`-friendly type.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    State(#[from] StateError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
