//! Shared I/O helpers for the fake POP3 server.
//!
//! Every write is flushed right away so the client sees each reply as
//! soon as the handler produces it.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Write a string to the stream and flush.
pub async fn write_line<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    line: &str,
) -> std::io::Result<()> {
    stream.get_mut().write_all(line.as_bytes()).await?;
    stream.get_mut().flush().await
}

/// Write a multi-line body, byte-stuffing lines that start with `.`,
/// followed by the lone `.` terminator.
pub async fn write_body<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    lines: &[String],
) -> std::io::Result<()> {
    let mut out = String::new();
    for line in lines {
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out.push_str(".\r\n");
    write_line(stream, &out).await
}
