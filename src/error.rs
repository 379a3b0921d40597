//! Error types for pop3-dashboard

use crate::session::ConnectionState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not resolve host: {0}")]
    HostUnresolved(String),

    #[error("Connection timed out: {0}")]
    ConnectTimeout(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed by server")]
    StreamClosed,

    /// The server answered with something that is not valid protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{operation} is not valid while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    /// `-ERR` reply to a retrieval request.
    #[error("Message not found: {0}")]
    NotFound(String),

    /// `-ERR` reply to a command that has no dedicated negative outcome.
    #[error("Server rejected the command: {0}")]
    Rejected(String),

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Link-level failures: resolution, connect, handshake, or mid-session I/O.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::HostUnresolved(_)
                | Self::ConnectTimeout(_)
                | Self::Tls(_)
                | Self::Io(_)
                | Self::StreamClosed
        )
    }

    /// The server or the client state broke the protocol contract, as
    /// opposed to a well-formed negative reply.
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::InvalidState { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
