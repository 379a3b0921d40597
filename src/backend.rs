//! Backend-agnostic mail operations
//!
//! The CLI drives either the built-in POP3 engine or the library-backed
//! IMAP backend through [`MailBackend`], so it never needs to know which
//! one is behind the connection.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Message count and total size of the maildrop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MailboxStat {
    pub message_count: u32,
    pub total_size: u64,
}

/// One entry of a listing: message number and size in octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageInfo {
    pub number: u32,
    pub size: u64,
}

/// Result of a login attempt.
///
/// A rejection carries the server's text verbatim and does not say
/// whether the username or the password was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    Rejected { message: String },
}

impl AuthOutcome {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// How the connection ended. Quit never fails; it only reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuitStatus {
    Clean,
    Degraded(String),
}

#[async_trait]
pub trait MailBackend: Send {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    /// Whether further operations can be issued.
    fn is_open(&self) -> bool;

    async fn authenticate(&mut self, username: &str, password: &str) -> Result<AuthOutcome>;

    async fn stat(&mut self) -> Result<MailboxStat>;

    async fn list(&mut self) -> Result<Vec<MessageInfo>>;

    /// Fetch one message as display lines, in order.
    async fn retrieve(&mut self, number: u32) -> Result<Vec<String>>;

    /// End the session and release the connection.
    async fn quit(&mut self) -> QuitStatus;
}
