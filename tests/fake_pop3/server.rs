//! In-process fake POP3 server for integration testing
//!
//! # How POP3 works (short overview)
//!
//! POP3 (RFC 1939) is a line-oriented protocol for downloading mail
//! from a single maildrop. Every reply starts with a status token:
//! `+OK` for success, `-ERR` for failure.
//!
//! ```text
//!   Server:  +OK POP3 ready
//!   Client:  USER alice
//!   Server:  +OK
//!   Client:  PASS secret
//!   Server:  +OK maildrop locked and ready
//!   Client:  STAT
//!   Server:  +OK 2 320
//! ```
//!
//! LIST and RETR answer with a status line followed by a body that ends
//! with a line holding a single `.`. Body lines that begin with `.` get
//! an extra `.` prepended ("byte-stuffing") so they cannot be mistaken
//! for the terminator.
//!
//! With implicit TLS (port 995) the handshake happens right after the
//! TCP connect, before the greeting.

use super::handlers::{
    handle_list, handle_pass, handle_quit, handle_retr, handle_stat, handle_user,
};
use super::io::write_line;
use super::mailbox::Mailbox;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

pub const GREETING: &str = "+OK POP3 fake server ready\r\n";

/// Per-connection protocol state.
#[derive(Debug, Default)]
pub struct Session {
    /// Username accepted by USER, waiting for PASS.
    pub user: Option<String>,
    pub authenticated: bool,
}

/// A fake POP3 server on localhost with an OS-assigned port.
///
/// Every command line received is recorded so tests can assert on
/// exactly what the client sent.
pub struct FakePop3Server {
    port: u16,
    commands: Arc<Mutex<Vec<String>>>,
    /// Accept loop; aborted when the server is dropped.
    handle: tokio::task::JoinHandle<()>,
}

impl FakePop3Server {
    /// Start a plain-TCP server with the given maildrop.
    pub async fn start(mailbox: Mailbox) -> Self {
        Self::spawn(mailbox, None).await
    }

    /// Start an implicit-TLS server with a fresh self-signed certificate.
    pub async fn start_tls(mailbox: Mailbox) -> Self {
        // Multiple tests may race to install the provider; losing is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
            .expect("generate self-signed cert");
        let cert_der = cert.cert.der().clone();
        let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

        let tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der.into())
            .expect("build server TLS config");

        Self::spawn(mailbox, Some(TlsAcceptor::from(Arc::new(tls_config)))).await
    }

    async fn spawn(mailbox: Mailbox, acceptor: Option<TlsAcceptor>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let mailbox = Arc::new(mailbox);
        let commands = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&commands);

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _addr)) = listener.accept().await else {
                    break;
                };
                let acceptor = acceptor.clone();
                let mailbox = Arc::clone(&mailbox);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    match acceptor {
                        Some(acceptor) => {
                            let Ok(tls) = acceptor.accept(stream).await else {
                                return;
                            };
                            handle_pop3_session(tls, &mailbox, &recorded).await;
                        }
                        None => handle_pop3_session(stream, &mailbox, &recorded).await,
                    }
                });
            }
        });

        Self {
            port,
            commands,
            handle,
        }
    }

    /// The port the server is listening on.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Command lines received so far, across all connections.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl Drop for FakePop3Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Run the POP3 command loop over an established stream.
async fn handle_pop3_session<S: AsyncRead + AsyncWrite + Unpin>(
    stream: S,
    mailbox: &Mailbox,
    recorded: &Mutex<Vec<String>>,
) {
    let mut reader = BufReader::new(stream);
    if write_line(&mut reader, GREETING).await.is_err() {
        return;
    }

    let mut session = Session::default();

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            continue;
        }
        recorded.lock().unwrap().push(trimmed.to_string());

        let (keyword, argument) = match trimmed.split_once(' ') {
            Some((keyword, argument)) => (keyword.to_ascii_uppercase(), argument),
            None => (trimmed.to_ascii_uppercase(), ""),
        };

        if mailbox.hang_up_on.as_deref() == Some(keyword.as_str()) {
            break;
        }

        let needs_auth = matches!(keyword.as_str(), "STAT" | "LIST" | "RETR");
        if needs_auth && !session.authenticated {
            if write_line(&mut reader, "-ERR not authenticated\r\n")
                .await
                .is_err()
            {
                break;
            }
            continue;
        }

        let ok = match keyword.as_str() {
            "USER" => handle_user(argument, mailbox, &mut session, &mut reader).await,
            "PASS" => handle_pass(argument, mailbox, &mut session, &mut reader).await,
            "STAT" => handle_stat(mailbox, &mut reader).await,
            "LIST" => handle_list(mailbox, &mut reader).await,
            "RETR" => handle_retr(argument, mailbox, &mut reader).await,
            "QUIT" => {
                handle_quit(&mut reader).await;
                break;
            }
            _ => write_line(&mut reader, "-ERR unknown command\r\n")
                .await
                .is_ok(),
        };
        if !ok {
            break;
        }
    }
}
