//! Connection and progress configuration

use crate::error::{Error, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// How the byte stream to the server is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    #[default]
    Plain,
    /// Implicit TLS: the handshake runs before the first protocol byte.
    Tls,
}

impl Security {
    /// Well-known port for this mode (RFC 1939 / RFC 8314).
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Plain => 110,
            Self::Tls => 995,
        }
    }
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "none" | "" => Ok(Self::Plain),
            "tls" | "ssl" => Ok(Self::Tls),
            other => Err(Error::Config(format!("Unknown security mode: {other}"))),
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::Tls => "tls",
        })
    }
}

/// Which implementation serves the mail operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// The built-in POP3 session engine.
    #[default]
    Pop3,
    /// The library-backed backend built on `async-imap`.
    Imap,
}

impl BackendKind {
    /// Well-known port for this backend under `security`.
    #[must_use]
    pub const fn default_port(self, security: Security) -> u16 {
        match (self, security) {
            (Self::Pop3, security) => security.default_port(),
            (Self::Imap, Security::Plain) => 143,
            (Self::Imap, Security::Tls) => 993,
        }
    }
}

/// Everything needed to reach and log in to a mail server.
#[derive(Debug, Clone)]
pub struct Pop3Config {
    pub host: String,
    pub port: u16,
    pub security: Security,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Skip certificate verification (self-signed test servers).
    pub accept_invalid_certs: bool,
    pub connect_timeout: Duration,
}

impl Pop3Config {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, security: Security) -> Self {
        Self {
            host: host.into(),
            port,
            security,
            username: None,
            password: None,
            accept_invalid_certs: false,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables
    ///
    /// Reads from `.env` file if present. All variables are optional:
    /// - `POP3_HOST` (default: `127.0.0.1`)
    /// - `POP3_SECURITY` (`plain` or `tls`, default: `plain`)
    /// - `POP3_PORT` (default: 110, or 995 with TLS)
    /// - `POP3_USERNAME`, `POP3_PASSWORD`
    /// - `POP3_ACCEPT_INVALID_CERTS` (default: `false`)
    /// - `POP3_CONNECT_TIMEOUT_SECS` (default: `10`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let security: Security = env::var("POP3_SECURITY")
            .unwrap_or_default()
            .parse()?;
        let port = match env::var("POP3_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("Invalid POP3_PORT: {e}")))?,
            Err(_) => security.default_port(),
        };
        let accept_invalid_certs = match env::var("POP3_ACCEPT_INVALID_CERTS") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("Invalid POP3_ACCEPT_INVALID_CERTS: {e}")))?,
            Err(_) => false,
        };
        let timeout_secs = match env::var("POP3_CONNECT_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("Invalid POP3_CONNECT_TIMEOUT_SECS: {e}")))?,
            Err(_) => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        Ok(Self {
            host: env::var("POP3_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port,
            security,
            username: env::var("POP3_USERNAME").ok(),
            password: env::var("POP3_PASSWORD").ok(),
            accept_invalid_certs,
            connect_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// `host:port`, as used for resolution and log lines.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Timing and geometry of the progress animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressConfig {
    pub frame_interval: Duration,
    pub track_width: usize,
}

impl ProgressConfig {
    pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(100);
    pub const MAX_FRAME_INTERVAL: Duration = Duration::from_millis(200);
    pub const DEFAULT_TRACK_WIDTH: usize = 20;

    /// Build a config, resetting out-of-range values.
    ///
    /// Intervals slower than [`Self::MAX_FRAME_INTERVAL`] (or zero) fall back
    /// to the default, and the track is at least one cell wide.
    #[must_use]
    pub fn new(frame_interval: Duration, track_width: usize) -> Self {
        let frame_interval = if frame_interval.is_zero() || frame_interval > Self::MAX_FRAME_INTERVAL
        {
            Self::DEFAULT_FRAME_INTERVAL
        } else {
            frame_interval
        };
        Self {
            frame_interval,
            track_width: track_width.max(1),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FRAME_INTERVAL, Self::DEFAULT_TRACK_WIDTH)
    }
}
