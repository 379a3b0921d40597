//! POP3 request encoding
//!
//! Every request is one line: `COMMAND[ SPACE argument]` followed by CRLF.

use std::fmt;

/// A client request understood by the session engine.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(String),
    Stat,
    List,
    Retr(u32),
    Quit,
}

impl Command {
    /// The command keyword as sent on the wire.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::User(_) => "USER",
            Self::Pass(_) => "PASS",
            Self::Stat => "STAT",
            Self::List => "LIST",
            Self::Retr(_) => "RETR",
            Self::Quit => "QUIT",
        }
    }

    /// Whether the server answers this command with a multi-line body
    /// after a positive status line.
    #[must_use]
    pub const fn is_multiline(&self) -> bool {
        matches!(self, Self::List | Self::Retr(_))
    }

    /// The request line without its terminator.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::User(arg) | Self::Pass(arg) => format!("{} {}", self.keyword(), arg.trim()),
            Self::Retr(n) => format!("{} {n}", self.keyword()),
            Self::Stat | Self::List | Self::Quit => self.keyword().to_string(),
        }
    }
}

/// Log-safe rendering: the PASS argument is never printed.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass(_) => write!(f, "{} ****", self.keyword()),
            other => f.write_str(&other.encode()),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({self})")
    }
}
