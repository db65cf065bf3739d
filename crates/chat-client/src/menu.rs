//! Menu-driven terminal front end.
//!
//! The menu reads user input from any `AsyncBufRead` and writes prompts to
//! any `AsyncWrite`, so the binary wires it to stdin/stdout while tests feed
//! it a byte slice. Server lines are printed by a separate task; the menu
//! only sends.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::debug;

use crate::client::ChatWriter;
use crate::error::{ClientError, Result};

/// Word that leaves the current chat mode.
pub const EXIT_WORD: &str = "exit";

const MENU_TEXT: &str = "1. Public chat\n2. Private chat\n3. Rename\n0. Exit\n";
const PUBLIC_PROMPT: &str = "Please input chat content, \"exit\" to exit.\n";
const RECIPIENT_PROMPT: &str = "Please input recv user name. \"exit\" to exit.\n";
const PRIVATE_PROMPT: &str = "Please input chat content. \"exit\" to exit.\n";
const RENAME_PROMPT: &str = "Please input user name\n";
const UNDEFINED_CHOICE: &str = "Undefined input flag\n";

/// A top-level menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Public,
    Private,
    Rename,
    Exit,
}

impl MenuChoice {
    /// Parses the number typed at the menu prompt.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Public),
            "2" => Some(Self::Private),
            "3" => Some(Self::Rename),
            "0" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Interactive menu over a `ChatWriter`.
pub struct Menu<R, W> {
    input: Lines<R>,
    output: W,
    chat: ChatWriter,
}

impl<R, W> Menu<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W, chat: ChatWriter) -> Self {
        Self {
            input: input.lines(),
            output,
            chat,
        }
    }

    /// Runs the menu until the user picks exit or input ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the terminal fails. Requests
    /// the server would reject are reported to the user and skipped.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.say(MENU_TEXT).await?;
            let Some(input) = self.read_input().await? else {
                return Ok(());
            };

            match MenuChoice::parse(&input) {
                Some(MenuChoice::Public) => {
                    if !self.public_chat().await? {
                        return Ok(());
                    }
                }
                Some(MenuChoice::Private) => {
                    if !self.private_chat().await? {
                        return Ok(());
                    }
                }
                Some(MenuChoice::Rename) => {
                    if !self.update_name().await? {
                        return Ok(());
                    }
                }
                Some(MenuChoice::Exit) => return Ok(()),
                None => self.say(UNDEFINED_CHOICE).await?,
            }
        }
    }

    /// Consumes the menu and returns the connection writer.
    pub fn into_writer(self) -> ChatWriter {
        self.chat
    }

    // Each mode returns `false` when input has ended.

    async fn public_chat(&mut self) -> Result<bool> {
        loop {
            self.say(PUBLIC_PROMPT).await?;
            let Some(text) = self.read_input().await? else {
                return Ok(false);
            };
            if text == EXIT_WORD {
                return Ok(true);
            }
            if text.is_empty() {
                continue;
            }

            let sent = self.chat.public(&text).await;
            self.check(sent).await?;
        }
    }

    async fn private_chat(&mut self) -> Result<bool> {
        loop {
            self.chat.who().await?;
            self.say(RECIPIENT_PROMPT).await?;
            let Some(recipient) = self.read_input().await? else {
                return Ok(false);
            };
            if recipient == EXIT_WORD {
                return Ok(true);
            }

            loop {
                self.say(PRIVATE_PROMPT).await?;
                let Some(content) = self.read_input().await? else {
                    return Ok(false);
                };
                if content == EXIT_WORD {
                    break;
                }
                if content.is_empty() {
                    continue;
                }

                let sent = self.chat.private(&recipient, &content).await;
                self.check(sent).await?;
            }
        }
    }

    async fn update_name(&mut self) -> Result<bool> {
        self.say(RENAME_PROMPT).await?;
        let Some(name) = self.read_input().await? else {
            return Ok(false);
        };

        let sent = self.chat.rename(&name).await;
        self.check(sent).await?;
        Ok(true)
    }

    /// Reports a rejected request to the user; passes I/O failures up.
    async fn check(&mut self, sent: Result<()>) -> Result<()> {
        match sent {
            Ok(()) => Ok(()),
            Err(e @ (ClientError::Command(_) | ClientError::Ambiguous(_) | ClientError::Newline)) => {
                debug!(error = %e, "Request not sent");
                self.say(&format!("Not sent: {e}\n")).await
            }
            Err(e) => Err(e),
        }
    }

    async fn read_input(&mut self) -> Result<Option<String>> {
        let line = self.input.next_line().await?;
        Ok(line.map(|line| line.trim().to_string()))
    }

    async fn say(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatClient;
    use tokio::io::BufReader;
    use tokio::net::TcpListener;

    #[test]
    fn test_menu_choice_parse() {
        assert_eq!(MenuChoice::parse("1"), Some(MenuChoice::Public));
        assert_eq!(MenuChoice::parse(" 2 "), Some(MenuChoice::Private));
        assert_eq!(MenuChoice::parse("3"), Some(MenuChoice::Rename));
        assert_eq!(MenuChoice::parse("0"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("4"), None);
        assert_eq!(MenuChoice::parse("one"), None);
    }

    /// Runs the menu on `script` and returns what it printed and what the
    /// fake server received.
    async fn run_script(script: &'static str) -> (String, Vec<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(line);
            }
            received
        });

        let client = ChatClient::connect(&addr).await.unwrap();
        let (_reader, writer) = client.into_split();

        let mut output = Vec::new();
        let mut menu = Menu::new(script.as_bytes(), &mut output, writer);
        menu.run().await.unwrap();
        menu.into_writer().shutdown().await.unwrap();

        (String::from_utf8(output).unwrap(), server.await.unwrap())
    }

    #[tokio::test]
    async fn test_exit_sends_nothing() {
        let (printed, received) = run_script("0\n").await;
        assert!(printed.starts_with(MENU_TEXT));
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_public_chat_skips_empty_lines() {
        let (_, received) = run_script("1\nhello\n\nworld\nexit\n0\n").await;
        assert_eq!(received, vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn test_private_chat_lists_users_first() {
        let (_, received) = run_script("2\nbob\nhi\n\nexit\nexit\n0\n").await;
        assert_eq!(received, vec!["who", "to|bob|hi", "who"]);
    }

    #[tokio::test]
    async fn test_rename_sends_request() {
        let (_, received) = run_script("3\nalice\n0\n").await;
        assert_eq!(received, vec!["rename|alice"]);
    }

    #[tokio::test]
    async fn test_rejected_request_is_reported_not_sent() {
        let (printed, received) = run_script("1\nwho\nexit\n0\n").await;
        assert!(printed.contains("Not sent: Line would be read as a different command: who"));
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_undefined_choice_and_eof() {
        let (printed, received) = run_script("9\n").await;
        assert!(printed.contains(UNDEFINED_CHOICE));
        assert!(received.is_empty());
    }
}
