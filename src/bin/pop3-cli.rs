#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Interactive POP3 mail client with a library-backed IMAP alternative

use clap::{Parser, ValueEnum};
use pop3_dashboard::{
    AuthOutcome, BackendKind, Error, ImapBackend, MailBackend, Pop3Config, Pop3Session,
    ProgressConfig, ProgressIndicator, QuitStatus, Security,
};
use std::future::Future;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const CONNECT_LABEL: &str = "Attempting to connect... ";
const LOGIN_LABEL: &str = "Logging in... ";
const FETCH_LABEL: &str = "Fetching... ";

const BYTES_PER_KB: f64 = 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Parser)]
#[command(name = "pop3-cli")]
#[command(about = "Interactive POP3 mail client")]
struct Args {
    /// Host offered as the default at the prompt
    #[arg(long)]
    host: Option<String>,

    /// Port offered as the default at the prompt
    #[arg(long)]
    port: Option<u16>,

    /// Skip the socket menu and use this backend
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Use implicit TLS together with --backend
    #[arg(long)]
    tls: bool,

    /// Accept self-signed or otherwise invalid certificates
    #[arg(long)]
    insecure: bool,

    /// Progress animation frame interval in milliseconds
    #[arg(long, default_value = "100")]
    frame_interval_ms: u64,

    /// Width of the progress track in cells
    #[arg(long, default_value = "20")]
    track_width: usize,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Pop3,
    Imap,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Pop3 => Self::Pop3,
            BackendArg::Imap => Self::Imap,
        }
    }
}

/// What to do once a client run is over.
enum Flow {
    /// Back to the socket menu.
    Menu,
    Exit,
}

enum Login {
    Done,
    Quit,
    Lost,
}

struct Console {
    lines: Lines<BufReader<Stdin>>,
    progress: ProgressConfig,
    json: bool,
}

impl Console {
    /// Print `text` and read one line. `None` at end of input.
    async fn read(&mut self, text: &str) -> anyhow::Result<Option<String>> {
        print!("{text}");
        io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }

    async fn prompt(&mut self, text: &str) -> anyhow::Result<Option<String>> {
        Ok(self.read(text).await?.map(|line| line.trim().to_string()))
    }

    /// Read a password without echo when attached to a terminal.
    async fn password(&mut self, text: &str) -> anyhow::Result<Option<String>> {
        if !io::stdin().is_terminal() {
            return self.read(text).await;
        }
        let text = text.to_string();
        let password =
            tokio::task::spawn_blocking(move || rpassword::prompt_password(text)).await??;
        Ok(Some(password))
    }

    /// Run `operation` with the progress line animating.
    ///
    /// In JSON mode the animation goes to stderr, out of the JSON documents.
    async fn busy<T>(&self, label: &str, operation: impl Future<Output = T>) -> T {
        if self.json {
            animate(
                ProgressIndicator::new(io::stderr(), label, self.progress),
                operation,
            )
            .await
        } else {
            animate(ProgressIndicator::stdout(label, self.progress), operation).await
        }
    }
}

async fn animate<W, T>(mut progress: ProgressIndicator<W>, operation: impl Future<Output = T>) -> T
where
    W: Write + Send + 'static,
{
    progress.start();
    let out = operation.await;
    progress.stop().await;
    out
}

fn is_quit(input: &str) -> bool {
    input.eq_ignore_ascii_case("quit")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let defaults = Pop3Config::from_env()?;
    let mut console = Console {
        lines: BufReader::new(tokio::io::stdin()).lines(),
        progress: ProgressConfig::new(
            Duration::from_millis(args.frame_interval_ms),
            args.track_width,
        ),
        json: args.json,
    };

    loop {
        let (kind, security) = match args.backend {
            Some(backend) => {
                let security = if args.tls { Security::Tls } else { Security::Plain };
                (backend.into(), security)
            }
            None => match choose_socket(&mut console).await? {
                Some(choice) => choice,
                None => break,
            },
        };

        let flow = run_client(&mut console, &args, &defaults, kind, security).await?;
        if matches!(flow, Flow::Exit) || args.backend.is_some() {
            break;
        }
    }

    Ok(())
}

fn print_socket_menu() {
    println!();
    println!("Choose a socket type:");
    println!("1. Unencrypted Socket");
    println!("2. SSL-Socket");
    println!("3. Mail library");
    println!("4. Mail library secured");
    println!("5. Exit program");
}

async fn choose_socket(console: &mut Console) -> anyhow::Result<Option<(BackendKind, Security)>> {
    loop {
        print_socket_menu();
        let Some(choice) = console.prompt("> ").await? else {
            return Ok(None);
        };
        match choice.as_str() {
            "1" => return Ok(Some((BackendKind::Pop3, Security::Plain))),
            "2" => return Ok(Some((BackendKind::Pop3, Security::Tls))),
            "3" => return Ok(Some((BackendKind::Imap, Security::Plain))),
            "4" => return Ok(Some((BackendKind::Imap, Security::Tls))),
            "5" => return Ok(None),
            _ => println!("Please choose an option from 1 to 5"),
        }
    }
}

async fn run_client(
    console: &mut Console,
    args: &Args,
    defaults: &Pop3Config,
    kind: BackendKind,
    security: Security,
) -> anyhow::Result<Flow> {
    let Some(mut backend) = connect(console, args, defaults, kind, security).await? else {
        return Ok(Flow::Menu);
    };

    match login(console, defaults, backend.as_mut()).await? {
        Login::Done => {}
        Login::Quit => {
            let _ = backend.quit().await;
            return Ok(Flow::Menu);
        }
        Login::Lost => {
            println!("Lost connection...");
            return Ok(Flow::Menu);
        }
    }

    dashboard(console, backend.as_mut()).await?;
    Ok(Flow::Exit)
}

async fn open_backend(
    kind: BackendKind,
    config: &Pop3Config,
) -> pop3_dashboard::Result<Box<dyn MailBackend>> {
    let backend: Box<dyn MailBackend> = match kind {
        BackendKind::Pop3 => Box::new(Pop3Session::connect(config).await?),
        BackendKind::Imap => Box::new(ImapBackend::connect(config).await?),
    };
    Ok(backend)
}

async fn connect(
    console: &mut Console,
    args: &Args,
    defaults: &Pop3Config,
    kind: BackendKind,
    security: Security,
) -> anyhow::Result<Option<Box<dyn MailBackend>>> {
    let host_default = args.host.clone().unwrap_or_else(|| defaults.host.clone());
    let port_default = args.port.unwrap_or_else(|| kind.default_port(security));

    loop {
        let Some(host) = console
            .prompt(&format!("Host [{host_default}] (or 'quit'): "))
            .await?
        else {
            return Ok(None);
        };
        if is_quit(&host) {
            return Ok(None);
        }
        let host = if host.is_empty() { host_default.clone() } else { host };

        let Some(port) = console.prompt(&format!("Port [{port_default}]: ")).await? else {
            return Ok(None);
        };
        if is_quit(&port) {
            return Ok(None);
        }
        let port = if port.is_empty() {
            port_default
        } else {
            match port.parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => {
                    println!("Port must be a number between 1 and 65535");
                    continue;
                }
            }
        };

        let mut config = Pop3Config::new(host, port, security);
        config.accept_invalid_certs = args.insecure || defaults.accept_invalid_certs;
        config.connect_timeout = defaults.connect_timeout;

        match console.busy(CONNECT_LABEL, open_backend(kind, &config)).await {
            Ok(backend) => {
                info!("Connected to {} via {}", config.address(), backend.name());
                println!("Connected to {}", config.address());
                return Ok(Some(backend));
            }
            Err(e) => {
                warn!("Connect to {} failed: {}", config.address(), e);
                println!("{}", connect_hint(&e));
            }
        }
    }
}

fn connect_hint(err: &Error) -> String {
    match err {
        Error::HostUnresolved(_) => "Unknown host, check the address and try again".to_string(),
        Error::ConnectTimeout(_) => "Connection timed out, try again".to_string(),
        Error::Tls(reason) => format!("Secure connection failed: {reason}"),
        Error::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
            "Connection refused, is the server running on that port?".to_string()
        }
        other => format!("Could not connect: {other}"),
    }
}

async fn login(
    console: &mut Console,
    defaults: &Pop3Config,
    backend: &mut dyn MailBackend,
) -> anyhow::Result<Login> {
    loop {
        let Some(username) = console.prompt("Username (or 'quit'): ").await? else {
            return Ok(Login::Quit);
        };
        if is_quit(&username) {
            return Ok(Login::Quit);
        }
        let username = match (username.is_empty(), &defaults.username) {
            (false, _) => username,
            (true, Some(default)) => default.clone(),
            (true, None) => continue,
        };

        let Some(password) = console.password("Password: ").await? else {
            return Ok(Login::Quit);
        };
        let password = if password.is_empty() {
            defaults.password.clone().unwrap_or_default()
        } else {
            password
        };

        match console
            .busy(LOGIN_LABEL, backend.authenticate(&username, &password))
            .await
        {
            Ok(AuthOutcome::Accepted) => {
                println!("Logged in as {username}");
                return Ok(Login::Done);
            }
            Ok(AuthOutcome::Rejected { message }) => {
                debug!("Login rejected: {}", message);
                println!("Credentials don't match! Try Again");
            }
            Err(e) if !backend.is_open() => {
                println!("{e}");
                return Ok(Login::Lost);
            }
            Err(e) => println!("Login failed: {e}"),
        }
    }
}

fn print_dashboard() {
    println!();
    println!("Dashboard:");
    println!("1. Mailbox status");
    println!("2. List messages");
    println!("3. Retrieve message");
    println!("5. Quit");
    println!("6. Show this menu");
}

async fn dashboard(console: &mut Console, backend: &mut dyn MailBackend) -> anyhow::Result<()> {
    print_dashboard();

    loop {
        let choice = console
            .prompt("> ")
            .await?
            .unwrap_or_else(|| "5".to_string());

        let result = match choice.parse::<u32>() {
            Ok(1) => show_stat(console, backend).await,
            Ok(2) => show_list(console, backend).await,
            Ok(3) => show_message(console, backend).await,
            Ok(5) => {
                match backend.quit().await {
                    QuitStatus::Clean => println!("Client shutdown"),
                    QuitStatus::Degraded(reason) => {
                        debug!("Quit degraded: {}", reason);
                        println!("Lost connection...");
                    }
                }
                return Ok(());
            }
            _ => {
                print_dashboard();
                continue;
            }
        };

        if let Err(e) = result {
            println!("{e}");
            if !backend.is_open() {
                println!("Lost connection...");
                return Ok(());
            }
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn scaled(bytes: u64, unit: f64) -> f64 {
    bytes as f64 / unit
}

async fn show_stat(console: &Console, backend: &mut dyn MailBackend) -> anyhow::Result<()> {
    let stat = console.busy(FETCH_LABEL, backend.stat()).await?;

    if console.json {
        println!("{}", serde_json::to_string_pretty(&stat)?);
    } else {
        println!("Messages: {}", stat.message_count);
        println!("Mailbox size: {:.2} MB", scaled(stat.total_size, BYTES_PER_MB));
    }
    Ok(())
}

async fn show_list(console: &Console, backend: &mut dyn MailBackend) -> anyhow::Result<()> {
    let messages = console.busy(FETCH_LABEL, backend.list()).await?;

    if console.json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!("No messages");
    }
    for message in &messages {
        println!(
            "{}\t({:.2} KB)",
            message.number,
            scaled(message.size, BYTES_PER_KB)
        );
    }
    Ok(())
}

async fn show_message(console: &mut Console, backend: &mut dyn MailBackend) -> anyhow::Result<()> {
    let Some(input) = console.prompt("Message number: ").await? else {
        return Ok(());
    };
    let number = match input.parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => {
            println!("Message number must be a positive integer");
            return Ok(());
        }
    };

    let lines = console.busy(FETCH_LABEL, backend.retrieve(number)).await?;

    if console.json {
        let message = serde_json::json!({ "number": number, "lines": lines });
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        for line in &lines {
            println!("{line}");
        }
    }
    Ok(())
}
