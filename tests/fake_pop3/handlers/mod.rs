//! POP3 command handlers for the fake server.
//!
//! Each handler lives in its own module and answers a single POP3
//! command (USER, PASS, STAT, LIST, RETR, QUIT). Handlers return
//! `false` when the client has gone away.

mod list;
mod retr;

pub use list::handle_list;
pub use pass::handle_pass;
pub use quit::handle_quit;
pub use retr::handle_retr;
pub use stat::handle_stat;
pub use user::handle_user;

#[cfg(test)]
pub mod test_support {
    use tokio::io::{AsyncReadExt, BufReader, DuplexStream};

    /// A server-side stream for a handler plus the client end to read
    /// back what it wrote.
    pub fn pipe() -> (BufReader<DuplexStream>, DuplexStream) {
        let (client, server) = tokio::io::duplex(8192);
        (BufReader::new(server), client)
    }

    /// Close the server side and collect everything the client received.
    pub async fn output(stream: BufReader<DuplexStream>, mut client: DuplexStream) -> String {
        drop(stream);
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }
}
