//! Connection client for the chat server.
//!
//! This module provides the `ChatClient` which handles:
//! - Connecting to the server over TCP
//! - Encoding requests (`who`, rename, private, public) as command lines
//! - Reading server lines one at a time
//!
//! A client can be split into a `ChatReader` and a `ChatWriter` so that
//! server lines are consumed on one task while requests go out on another.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use chat_protocol::Command;

use crate::error::{ClientError, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Default server address
pub const DEFAULT_SERVER_IP: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_SERVER_PORT: u16 = 8888;

/// Where the client connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server IP address or host name
    pub ip: String,

    /// Server port
    pub port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_SERVER_IP.to_string(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

impl ClientConfig {
    /// Returns `ip:port`, bracketing IPv6 literals.
    pub fn addr(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}

// ============================================================================
// Chat Client
// ============================================================================

/// A connection to the chat server.
///
/// # Example
///
/// ```rust,ignore
/// let mut client = ChatClient::connect("127.0.0.1:8888").await?;
/// client.rename("alice").await?;
/// client.public("hello everyone").await?;
/// while let Some(line) = client.recv_line().await? {
///     println!("{line}");
/// }
/// ```
pub struct ChatClient {
    reader: ChatReader,
    writer: ChatWriter,
    local_addr: SocketAddr,
}

impl ChatClient {
    /// Connects to the server at `addr`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Connect` if the connection cannot be made.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = stream.local_addr()?;
        debug!(server = %addr, local = %local_addr, "Connected to chat server");

        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: ChatReader::new(reader),
            writer: ChatWriter::new(writer),
            local_addr,
        })
    }

    /// Connects using a `ClientConfig`.
    pub async fn connect_with(config: &ClientConfig) -> Result<Self> {
        Self::connect(&config.addr()).await
    }

    /// Returns the local address of the connection.
    ///
    /// The server names a fresh session after this address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Requests the list of online users.
    pub async fn who(&mut self) -> Result<()> {
        self.writer.who().await
    }

    /// Requests a new display name.
    pub async fn rename(&mut self, name: &str) -> Result<()> {
        self.writer.rename(name).await
    }

    /// Sends a private message.
    pub async fn private(&mut self, to: &str, content: &str) -> Result<()> {
        self.writer.private(to, content).await
    }

    /// Publishes a message to everyone online.
    pub async fn public(&mut self, text: &str) -> Result<()> {
        self.writer.public(text).await
    }

    /// Sends a raw line, unchecked.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.send_line(line).await
    }

    /// Reads the next line from the server.
    ///
    /// Returns `Ok(None)` once the server has closed the connection.
    pub async fn recv_line(&mut self) -> Result<Option<String>> {
        self.reader.recv_line().await
    }

    /// Splits the client into independently owned halves.
    pub fn into_split(self) -> (ChatReader, ChatWriter) {
        (self.reader, self.writer)
    }
}

/// Receiving half of a `ChatClient`.
pub struct ChatReader {
    lines: Lines<BufReader<OwnedReadHalf>>,
}

impl ChatReader {
    fn new(reader: OwnedReadHalf) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Reads the next line from the server, without its terminator.
    pub async fn recv_line(&mut self) -> Result<Option<String>> {
        let line = self.lines.next_line().await?;
        Ok(line.map(|mut line| {
            if line.ends_with('\r') {
                line.pop();
            }
            line
        }))
    }
}

/// Sending half of a `ChatClient`.
pub struct ChatWriter {
    writer: OwnedWriteHalf,
}

impl ChatWriter {
    fn new(writer: OwnedWriteHalf) -> Self {
        Self { writer }
    }

    /// Requests the list of online users.
    pub async fn who(&mut self) -> Result<()> {
        self.send_command(Command::Who).await
    }

    /// Requests a new display name.
    ///
    /// # Errors
    ///
    /// `ClientError::Command` if `name` is empty or contains `|`.
    pub async fn rename(&mut self, name: &str) -> Result<()> {
        self.send_command(Command::Rename { name }).await
    }

    /// Sends a private message.
    ///
    /// # Errors
    ///
    /// `ClientError::Command` if `content` is empty, or if either field
    /// contains `|`.
    pub async fn private(&mut self, to: &str, content: &str) -> Result<()> {
        self.send_command(Command::Private { to, content }).await
    }

    /// Publishes a message to everyone online.
    ///
    /// # Errors
    ///
    /// `ClientError::Ambiguous` if the server would read `text` as a command.
    pub async fn public(&mut self, text: &str) -> Result<()> {
        self.send_command(Command::Public { text }).await
    }

    /// Sends a raw line, unchecked.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Shuts down the sending direction of the connection.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn send_command(&mut self, command: Command<'_>) -> Result<()> {
        let line = encode(command)?;
        self.send_line(&line).await
    }
}

/// Formats `command` and checks the server will parse it back unchanged.
fn encode(command: Command<'_>) -> Result<String> {
    let line = command.to_line();
    if line.contains(['\n', '\r']) {
        return Err(ClientError::Newline);
    }

    let round_trips = Command::parse(&line)? == command;
    if !round_trips {
        return Err(ClientError::Ambiguous(line));
    }

    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_protocol::ParseError;
    use tokio::net::TcpListener;

    #[test]
    fn test_default_config() {
        assert_eq!(ClientConfig::default().addr(), "127.0.0.1:8888");
    }

    #[test]
    fn test_ipv6_config_addr() {
        let config = ClientConfig {
            ip: "::1".to_string(),
            port: 9000,
        };
        assert_eq!(config.addr(), "[::1]:9000");
    }

    #[test]
    fn test_encode_commands() {
        assert_eq!(encode(Command::Who).unwrap(), "who");
        assert_eq!(encode(Command::Rename { name: "bob" }).unwrap(), "rename|bob");
        assert_eq!(
            encode(Command::Private { to: "bob", content: "hi" }).unwrap(),
            "to|bob|hi"
        );
        assert_eq!(encode(Command::Public { text: "hello" }).unwrap(), "hello");
    }

    #[test]
    fn test_encode_rejects_malformed_requests() {
        assert!(matches!(
            encode(Command::Private { to: "bob", content: "" }),
            Err(ClientError::Command(ParseError::EmptyContent))
        ));
        assert!(matches!(
            encode(Command::Private { to: "bob", content: "a|b" }),
            Err(ClientError::Command(ParseError::PrivateFormat))
        ));
        assert!(matches!(
            encode(Command::Rename { name: "" }),
            Err(ClientError::Command(ParseError::RenameFormat))
        ));
        assert!(matches!(
            encode(Command::Public { text: "who" }),
            Err(ClientError::Ambiguous(_))
        ));
        assert!(matches!(
            encode(Command::Public { text: "a\nb" }),
            Err(ClientError::Newline)
        ));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = ChatClient::connect(&addr).await.err().unwrap();
        assert!(matches!(err, ClientError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_requests_and_replies_over_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            let mut received = Vec::new();
            for _ in 0..3 {
                received.push(lines.next_line().await.unwrap().unwrap());
            }
            writer.write_all(b"Update user name to bob.\r\n").await.unwrap();
            received
        });

        let mut client = ChatClient::connect(&addr).await.unwrap();
        client.who().await.unwrap();
        client.rename("bob").await.unwrap();
        client.private("alice", "hi").await.unwrap();

        assert_eq!(
            client.recv_line().await.unwrap().as_deref(),
            Some("Update user name to bob.")
        );
        assert_eq!(client.recv_line().await.unwrap(), None);
        assert_eq!(server.await.unwrap(), vec!["who", "rename|bob", "to|alice|hi"]);
    }
}
