//! RETR command handler.
//!
//! Sends the stored lines byte-stuffed, so a body line `.hidden` goes
//! out as `..hidden`.

use crate::fake_pop3::io::{write_body, write_line};
use crate::fake_pop3::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_retr<S: AsyncRead + AsyncWrite + Unpin>(
    argument: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) -> bool {
    let message = argument
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|number| mailbox.get(number));

    let Some(message) = message else {
        return write_line(stream, "-ERR no such message\r\n").await.is_ok();
    };

    let status = format!("+OK {} octets\r\n", message.size());
    if write_line(stream, &status).await.is_err() {
        return false;
    }
    write_body(stream, &message.lines).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_pop3::MailboxBuilder;
    use crate::fake_pop3::handlers::test_support::{output, pipe};

    async fn run(argument: &str) -> String {
        let mailbox = MailboxBuilder::new()
            .message("Subject: Hi\r\n\r\n.hidden\r\nend")
            .build();
        let (mut stream, client) = pipe();
        handle_retr(argument, &mailbox, &mut stream).await;
        output(stream, client).await
    }

    #[tokio::test]
    async fn body_is_byte_stuffed() {
        let out = run("1").await;
        assert_eq!(
            out,
            "+OK 29 octets\r\nSubject: Hi\r\n\r\n..hidden\r\nend\r\n.\r\n"
        );
    }

    #[tokio::test]
    async fn missing_message_is_an_error() {
        assert_eq!(run("2").await, "-ERR no such message\r\n");
        assert_eq!(run("0").await, "-ERR no such message\r\n");
        assert_eq!(run("one").await, "-ERR no such message\r\n");
    }
}
