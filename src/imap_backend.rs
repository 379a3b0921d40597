//! Library-backed mail backend
//!
//! Serves the same operations as the POP3 engine through `async-imap`
//! against the server's INBOX, opened read-only with EXAMINE. Messages
//! are rendered with `mailparse`; the POP3 core never parses MIME.

use crate::backend::{AuthOutcome, MailBackend, MailboxStat, MessageInfo, QuitStatus};
use crate::config::Pop3Config;
use crate::error::{Error, Result};
use crate::session::ConnectionState;
use crate::transport::{self, BoxedStream};
use async_imap::Session;
use async_trait::async_trait;
use futures::StreamExt;
use mailparse::{MailHeaderMap, ParsedMail};
use std::mem;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info, warn};

const INBOX: &str = "INBOX";

type ImapStream = Compat<BoxedStream>;
type ImapSession = Session<ImapStream>;

enum Link {
    Connected(async_imap::Client<ImapStream>),
    Authenticated { session: ImapSession, exists: u32 },
    Closed,
}

impl Link {
    const fn state(&self) -> ConnectionState {
        match self {
            Self::Connected(_) => ConnectionState::Connected,
            Self::Authenticated { .. } => ConnectionState::Authenticated,
            Self::Closed => ConnectionState::Closed,
        }
    }
}

/// Mail access through the `async-imap` library.
pub struct ImapBackend {
    link: Link,
}

impl ImapBackend {
    /// Open a plain or TLS stream per `config` and hand it to the library.
    pub async fn connect(config: &Pop3Config) -> Result<Self> {
        let stream = transport::open_stream(config).await?;
        debug!("IMAP stream to {} open", config.address());
        Ok(Self::from_stream(stream))
    }

    #[must_use]
    pub fn from_stream(stream: BoxedStream) -> Self {
        Self {
            link: Link::Connected(async_imap::Client::new(stream.compat())),
        }
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.link.state()
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.link.state(),
        }
    }

    /// Drop the link after a transport-level failure.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_transport() {
                warn!("Closing IMAP link after error: {}", e);
                self.link = Link::Closed;
            }
        }
        result
    }
}

#[async_trait]
impl MailBackend for ImapBackend {
    fn name(&self) -> &'static str {
        "imap"
    }

    fn is_open(&self) -> bool {
        !matches!(self.link, Link::Closed)
    }

    async fn authenticate(&mut self, username: &str, password: &str) -> Result<AuthOutcome> {
        let client = match mem::replace(&mut self.link, Link::Closed) {
            Link::Connected(client) => client,
            other => {
                self.link = other;
                return Err(self.invalid("LOGIN"));
            }
        };

        match client.login(username, password).await {
            Ok(mut session) => {
                let mailbox = session
                    .examine(INBOX)
                    .await
                    .map_err(|e| from_imap("EXAMINE", e))?;
                info!("Logged in as {} ({} messages)", username, mailbox.exists);
                self.link = Link::Authenticated {
                    session,
                    exists: mailbox.exists,
                };
                Ok(AuthOutcome::Accepted)
            }
            Err((async_imap::error::Error::No(message), client)) => {
                self.link = Link::Connected(client);
                Ok(AuthOutcome::Rejected { message })
            }
            Err((e, _)) => Err(from_imap("LOGIN", e)),
        }
    }

    async fn stat(&mut self) -> Result<MailboxStat> {
        let result = match &mut self.link {
            Link::Authenticated { session, exists } => {
                fetch_sizes(session, exists).await.map(|sizes| MailboxStat {
                    message_count: *exists,
                    total_size: sizes.iter().map(|m| m.size).sum(),
                })
            }
            _ => return Err(self.invalid("STAT")),
        };
        self.settle(result)
    }

    async fn list(&mut self) -> Result<Vec<MessageInfo>> {
        let result = match &mut self.link {
            Link::Authenticated { session, exists } => fetch_sizes(session, exists).await,
            _ => return Err(self.invalid("LIST")),
        };
        self.settle(result)
    }

    async fn retrieve(&mut self, number: u32) -> Result<Vec<String>> {
        let result = match &mut self.link {
            Link::Authenticated { session, exists } => fetch_body(session, exists, number).await,
            _ => return Err(self.invalid("RETR")),
        };
        let raw = self.settle(result)?;
        render_message(&raw)
    }

    async fn quit(&mut self) -> QuitStatus {
        match mem::replace(&mut self.link, Link::Closed) {
            Link::Authenticated { mut session, .. } => match session.logout().await {
                Ok(()) => {
                    info!("IMAP session closed");
                    QuitStatus::Clean
                }
                Err(e) => {
                    warn!("Connection degraded during LOGOUT: {}", e);
                    QuitStatus::Degraded(e.to_string())
                }
            },
            Link::Connected(_) | Link::Closed => QuitStatus::Clean,
        }
    }
}

fn from_imap(context: &str, err: async_imap::error::Error) -> Error {
    match err {
        async_imap::error::Error::Io(e) => Error::Io(e),
        async_imap::error::Error::ConnectionLost => Error::StreamClosed,
        other => Error::Imap(format!("{context} failed: {other}")),
    }
}

/// Re-open INBOX so the message count reflects new arrivals.
async fn refresh(session: &mut ImapSession, exists: &mut u32) -> Result<()> {
    let mailbox = session
        .examine(INBOX)
        .await
        .map_err(|e| from_imap("EXAMINE", e))?;
    *exists = mailbox.exists;
    Ok(())
}

async fn fetch_sizes(session: &mut ImapSession, exists: &mut u32) -> Result<Vec<MessageInfo>> {
    refresh(session, exists).await?;
    if *exists == 0 {
        return Ok(vec![]);
    }

    let mut fetches = session
        .fetch("1:*", "RFC822.SIZE")
        .await
        .map_err(|e| from_imap("FETCH", e))?;

    // A missing size is reported only after the stream is drained.
    let mut infos = Vec::new();
    let mut unsized_message = None;
    while let Some(item) = fetches.next().await {
        let fetch = item.map_err(|e| from_imap("FETCH", e))?;
        match fetch.size {
            Some(size) => infos.push(MessageInfo {
                number: fetch.message,
                size: u64::from(size),
            }),
            None => {
                unsized_message.get_or_insert(fetch.message);
            }
        }
    }
    drop(fetches);

    if let Some(number) = unsized_message {
        warn!("Server sent no RFC822.SIZE for message {}", number);
        return Err(Error::Imap(format!(
            "FETCH returned no RFC822.SIZE for message {number}"
        )));
    }

    infos.sort_by_key(|m| m.number);
    Ok(infos)
}

async fn fetch_body(session: &mut ImapSession, exists: &mut u32, number: u32) -> Result<Vec<u8>> {
    refresh(session, exists).await?;
    if number == 0 || number > *exists {
        return Err(Error::NotFound(format!("message {number} does not exist")));
    }

    let mut fetches = session
        .fetch(number.to_string(), "BODY.PEEK[]")
        .await
        .map_err(|e| from_imap("FETCH", e))?;

    // Drain the stream even after the body shows up.
    let mut body = None;
    while let Some(item) = fetches.next().await {
        let fetch = item.map_err(|e| from_imap("FETCH", e))?;
        if body.is_none() && fetch.message == number {
            body = fetch.body().map(<[u8]>::to_vec);
        }
    }
    drop(fetches);

    body.ok_or_else(|| Error::NotFound(format!("no body returned for message {number}")))
}

/// Turn a raw RFC 5322 message into display lines.
///
/// Emits the From/To/Subject/Description headers, then every text/plain
/// part in order, descending into multiparts and attached messages.
/// Other parts are skipped.
pub fn render_message(raw: &[u8]) -> Result<Vec<String>> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| Error::Parse(e.to_string()))?;
    let mut out = Vec::new();
    render_part(&parsed, true, &mut out)?;
    Ok(out)
}

fn render_part(part: &ParsedMail<'_>, is_message: bool, out: &mut Vec<String>) -> Result<()> {
    if is_message {
        render_envelope(part, out);
    }

    let mimetype = part.ctype.mimetype.to_ascii_lowercase();
    if mimetype == "text/plain" {
        let body = part.get_body().map_err(|e| Error::Parse(e.to_string()))?;
        out.push(String::new());
        out.extend(body.lines().map(str::to_string));
    } else if mimetype.starts_with("multipart/") {
        for sub in &part.subparts {
            render_part(sub, false, out)?;
        }
    } else if mimetype == "message/rfc822" {
        out.push("Nested-Message:".to_string());
        let inner = part.get_body_raw().map_err(|e| Error::Parse(e.to_string()))?;
        let nested = mailparse::parse_mail(&inner).map_err(|e| Error::Parse(e.to_string()))?;
        render_part(&nested, true, out)?;
    } else {
        debug!("Skipping {} part", mimetype);
    }
    Ok(())
}

fn render_envelope(part: &ParsedMail<'_>, out: &mut Vec<String>) {
    for from in part.headers.get_all_values("From") {
        out.push(format!("From: {from}"));
    }
    for to in part.headers.get_all_values("To") {
        out.push(format!("To: {to}"));
    }
    if let Some(subject) = part.headers.get_first_value("Subject") {
        out.push(format!("Subject: {subject}"));
    }
    if let Some(description) = part.headers.get_first_value("Content-Description") {
        out.push(format!("Description: {description}"));
    }
}
