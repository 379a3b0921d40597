//! Fake POP3 server for integration testing
//!
//! This module provides an in-process POP3 server that speaks enough
//! of the protocol to test `Pop3Session` end-to-end:
//!
//! TCP (optionally TLS) -> greeting -> USER/PASS -> STAT/LIST/RETR -> QUIT
//!
//! ## Module layout
//!
//! - `server` -- TCP listener, TLS setup, and connection dispatch
//! - `handlers/` -- one file per POP3 command (USER, PASS, STAT, etc.)
//! - `mailbox` -- test data model (credentials, messages, builder)
//! - `io` -- shared write helpers

mod handlers;
mod io;
pub mod mailbox;
mod server;

pub use mailbox::MailboxBuilder;
pub use server::FakePop3Server;
