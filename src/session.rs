//! POP3 session engine
//!
//! Drives the request/response cycle and the connection state machine:
//!
//! ```text
//!   Disconnected --greeting--> Connected --USER/PASS--> Authenticated
//!        |                         |                          |
//!        +------------- QUIT or fatal I/O error ---------------+--> Closed
//! ```
//!
//! Only one request is ever in flight, so the session holds no locks.
//! A transport failure or an unreadable status line leaves the stream
//! position unknown; the session then drops the transport and moves to
//! `Closed`. Negative replies (`-ERR`) never change the state.

use crate::backend::{AuthOutcome, MailBackend, MailboxStat, MessageInfo, QuitStatus};
use crate::command::Command;
use crate::config::Pop3Config;
use crate::error::{Error, Result};
use crate::response::{self, Envelope};
use crate::transport::{BoxedStream, Transport};
use async_trait::async_trait;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, trace, warn};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Authenticated,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
            Self::Closed => "closed",
        })
    }
}

/// A POP3 conversation over one transport.
#[derive(Debug)]
pub struct Pop3Session<S> {
    transport: Option<Transport<S>>,
    state: ConnectionState,
    greeting: String,
}

impl Pop3Session<BoxedStream> {
    /// Connect per `config` and read the server greeting.
    pub async fn connect(config: &Pop3Config) -> Result<Self> {
        let transport = Transport::connect(config).await?;
        let session = Self::start(transport).await?;
        info!("Connected to POP3 server at {}", config.address());
        Ok(session)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Pop3Session<S> {
    /// Run a session over an already connected stream.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::start(Transport::new(stream)).await
    }

    async fn start(transport: Transport<S>) -> Result<Self> {
        let mut session = Self {
            transport: Some(transport),
            state: ConnectionState::Disconnected,
            greeting: String::new(),
        };

        let greeting = session.read_envelope().await?;
        if !greeting.ok {
            session.close_transport().await;
            return Err(Error::Rejected(greeting.payload));
        }

        debug!("Server greeting: {}", greeting.payload);
        session.greeting = greeting.payload;
        session.state = ConnectionState::Connected;
        Ok(session)
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Text following `+OK` in the server greeting.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Log in with USER then PASS.
    ///
    /// PASS is only sent after a positive USER reply. A `-ERR` at either
    /// step yields [`AuthOutcome::Rejected`] with the server's text and
    /// leaves the session `Connected` for another attempt.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<AuthOutcome> {
        self.require("USER", &[ConnectionState::Connected])?;

        let reply = self.exchange(&Command::User(username.to_string())).await?;
        if !reply.ok {
            return Ok(AuthOutcome::Rejected {
                message: reply.payload,
            });
        }

        let reply = self.exchange(&Command::Pass(password.to_string())).await?;
        if !reply.ok {
            return Ok(AuthOutcome::Rejected {
                message: reply.payload,
            });
        }

        self.state = ConnectionState::Authenticated;
        info!("Logged in as {}", username);
        Ok(AuthOutcome::Accepted)
    }

    /// Message count and maildrop size.
    pub async fn stat(&mut self) -> Result<MailboxStat> {
        self.require("STAT", &[ConnectionState::Authenticated])?;

        let reply = self.exchange(&Command::Stat).await?;
        if !reply.ok {
            return Err(Error::Rejected(reply.payload));
        }

        let (message_count, total_size) = response::parse_count_pair(&reply.payload)?;
        Ok(MailboxStat {
            message_count,
            total_size,
        })
    }

    /// Number and size of every message.
    ///
    /// The whole body is read before parsing, so a malformed line fails
    /// the call without leaving unread data on the stream.
    pub async fn list(&mut self) -> Result<Vec<MessageInfo>> {
        self.require("LIST", &[ConnectionState::Authenticated])?;

        let (reply, body) = self.request(&Command::List).await?;
        if !reply.ok {
            return Err(Error::Rejected(reply.payload));
        }

        body.iter()
            .map(|line| {
                let (number, size) = response::parse_count_pair(line)?;
                Ok(MessageInfo { number, size })
            })
            .collect()
    }

    /// Raw lines of message `number`, each trimmed.
    ///
    /// A `-ERR` reply (out of range, deleted) is [`Error::NotFound`].
    pub async fn retrieve(&mut self, number: u32) -> Result<Vec<String>> {
        self.require("RETR", &[ConnectionState::Authenticated])?;

        let (reply, body) = self.request(&Command::Retr(number)).await?;
        if !reply.ok {
            return Err(Error::NotFound(reply.payload));
        }

        Ok(body.into_iter().map(|line| line.trim().to_string()).collect())
    }

    /// Send QUIT without waiting for the reply, then release the stream.
    ///
    /// Never fails: I/O errors are reported as [`QuitStatus::Degraded`].
    /// On a session that is already closed this does nothing.
    pub async fn quit(&mut self) -> QuitStatus {
        let Some(mut transport) = self.transport.take() else {
            self.state = ConnectionState::Closed;
            return QuitStatus::Clean;
        };
        self.state = ConnectionState::Closed;

        trace!("Sending: {}", Command::Quit);
        let sent = transport.write_line(&Command::Quit.encode()).await;
        let closed = transport.close().await;

        match sent.and(closed) {
            Ok(()) => {
                info!("POP3 session closed");
                QuitStatus::Clean
            }
            Err(e) => {
                warn!("Connection degraded during QUIT: {}", e);
                QuitStatus::Degraded(e.to_string())
            }
        }
    }

    // -- private helpers --

    fn require(&self, operation: &'static str, allowed: &[ConnectionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Send one command and decode its status line.
    async fn exchange(&mut self, command: &Command) -> Result<Envelope> {
        trace!("Sending: {}", command);
        let sent = match self.transport.as_mut() {
            Some(transport) => transport.write_line(&command.encode()).await,
            None => Err(Error::StreamClosed),
        };
        if let Err(e) = sent {
            return Err(self.fail(e).await);
        }
        self.read_envelope().await
    }

    /// Send one command and, for a positive reply to a multi-line
    /// command, collect its body as well.
    async fn request(&mut self, command: &Command) -> Result<(Envelope, Vec<String>)> {
        let reply = self.exchange(command).await?;
        let body = if reply.ok && command.is_multiline() {
            self.read_body().await?
        } else {
            Vec::new()
        };
        Ok((reply, body))
    }

    async fn read_envelope(&mut self) -> Result<Envelope> {
        let line = self.read_line().await?;
        match Envelope::parse(&line) {
            Ok(envelope) => Ok(envelope),
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Collect body lines up to (not including) the `.` terminator.
    async fn read_body(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if response::is_terminator(&line) {
                return Ok(lines);
            }
            lines.push(response::unstuff(&line).to_string());
        }
    }

    async fn read_line(&mut self) -> Result<String> {
        let read = match self.transport.as_mut() {
            Some(transport) => transport.read_line().await,
            None => Err(Error::StreamClosed),
        };
        match read {
            Ok(line) => Ok(line),
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Close the session after an error that desynchronised the stream.
    async fn fail(&mut self, err: Error) -> Error {
        if self.state != ConnectionState::Closed {
            warn!("Closing POP3 session after error: {}", err);
        }
        self.close_transport().await;
        err
    }

    async fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await.ok();
        }
        self.state = ConnectionState::Closed;
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> MailBackend for Pop3Session<S> {
    fn name(&self) -> &'static str {
        "pop3"
    }

    fn is_open(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Authenticated
        )
    }

    async fn authenticate(&mut self, username: &str, password: &str) -> Result<AuthOutcome> {
        Self::authenticate(self, username, password).await
    }

    async fn stat(&mut self) -> Result<MailboxStat> {
        Self::stat(self).await
    }

    async fn list(&mut self) -> Result<Vec<MessageInfo>> {
        Self::list(self).await
    }

    async fn retrieve(&mut self, number: u32) -> Result<Vec<String>> {
        Self::retrieve(self, number).await
    }

    async fn quit(&mut self) -> QuitStatus {
        Self::quit(self).await
    }
}
