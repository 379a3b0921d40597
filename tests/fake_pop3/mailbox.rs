//! Test data model for the fake POP3 server
//!
//! Provides a builder-style API for constructing maildrop state:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .credentials("alice", "secret")
//!     .message("Subject: Hi\r\n\r\nHello")
//!     .message("Subject: Again\r\n\r\nHello again")
//!     .build();
//! ```
//!
//! POP3 has no folders: a maildrop is one numbered list of messages,
//! and message numbers start at 1.

/// A maildrop plus the credentials that unlock it.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub username: String,
    pub password: String,
    pub messages: Vec<TestMessage>,
    /// Drop the connection instead of answering this command keyword.
    pub hang_up_on: Option<String>,
}

impl Mailbox {
    /// Look up a message by its 1-based number.
    pub fn get(&self, number: usize) -> Option<&TestMessage> {
        number
            .checked_sub(1)
            .and_then(|index| self.messages.get(index))
    }

    pub fn total_size(&self) -> usize {
        self.messages.iter().map(TestMessage::size).sum()
    }
}

/// One stored message, kept as lines without their CRLF.
#[derive(Debug, Clone)]
pub struct TestMessage {
    pub lines: Vec<String>,
}

impl TestMessage {
    /// Size in octets as it would sit in the maildrop, CRLF included.
    pub fn size(&self) -> usize {
        self.lines.iter().map(|line| line.len() + 2).sum()
    }
}

/// Builder for constructing a `Mailbox` step by step.
pub struct MailboxBuilder {
    mailbox: Mailbox,
}

impl MailboxBuilder {
    /// Starts with `testuser` / `testpass` and no messages.
    pub fn new() -> Self {
        Self {
            mailbox: Mailbox {
                username: "testuser".to_string(),
                password: "testpass".to_string(),
                messages: Vec::new(),
                hang_up_on: None,
            },
        }
    }

    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.mailbox.username = username.to_string();
        self.mailbox.password = password.to_string();
        self
    }

    /// Append a message. `raw` is split on line breaks.
    pub fn message(mut self, raw: &str) -> Self {
        self.mailbox.messages.push(TestMessage {
            lines: raw.lines().map(str::to_string).collect(),
        });
        self
    }

    pub fn hang_up_on(mut self, keyword: &str) -> Self {
        self.mailbox.hang_up_on = Some(keyword.to_ascii_uppercase());
        self
    }

    /// Consume the builder and return the finished `Mailbox`.
    pub fn build(self) -> Mailbox {
        self.mailbox
    }
}
