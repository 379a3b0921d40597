//! LIST command handler (no-argument form only).

use crate::fake_pop3::io::{write_body, write_line};
use crate::fake_pop3::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// One `<number> <octets>` line per message, then the terminator.
pub async fn handle_list<S: AsyncRead + AsyncWrite + Unpin>(
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) -> bool {
    let status = format!(
        "+OK {} messages ({} octets)\r\n",
        mailbox.messages.len(),
        mailbox.total_size()
    );
    if write_line(stream, &status).await.is_err() {
        return false;
    }

    let lines: Vec<String> = mailbox
        .messages
        .iter()
        .enumerate()
        .map(|(index, message)| format!("{} {}", index + 1, message.size()))
        .collect();
    write_body(stream, &lines).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_pop3::MailboxBuilder;
    use crate::fake_pop3::handlers::test_support::{output, pipe};

    #[tokio::test]
    async fn lists_every_message_then_terminator() {
        let mailbox = MailboxBuilder::new().message("ab").message("cde").build();
        let (mut stream, client) = pipe();
        assert!(handle_list(&mailbox, &mut stream).await);
        assert_eq!(
            output(stream, client).await,
            "+OK 2 messages (9 octets)\r\n1 4\r\n2 5\r\n.\r\n"
        );
    }
}
