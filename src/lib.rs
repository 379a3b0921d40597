//! POP3 mail client library
//!
//! A small POP3 (RFC 1939) client engine over plain TCP or implicit TLS,
//! plus a library-backed IMAP alternative sharing the same
//! [`MailBackend`] operations. A console [`ProgressIndicator`] animates
//! while a network operation is pending.
//!
//! The engine tracks the connection state, validates every server reply,
//! and never sends the password after the server refuses the username.

mod backend;
mod command;
mod config;
mod error;
mod imap_backend;
mod progress;
mod response;
mod session;
mod transport;

pub use backend::{AuthOutcome, MailBackend, MailboxStat, MessageInfo, QuitStatus};
pub use command::Command;
pub use config::{BackendKind, Pop3Config, ProgressConfig, Security};
pub use error::{Error, Result};
pub use imap_backend::{ImapBackend, render_message};
pub use progress::{ProgressIndicator, ProgressState, marker_position, render_frame};
pub use response::{Envelope, parse_count_pair};
pub use session::{ConnectionState, Pop3Session};
pub use transport::{AsyncStream, BoxedStream, Transport, open_stream};
