//! Error types for the chat client.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;

use chat_protocol::ParseError;
use thiserror::Error;

/// Client errors.
///
/// Connection and I/O errors end the conversation with the server; the
/// remaining variants reject a single request before anything is sent.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to connect to the server.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        /// Address that was dialled
        addr: String,
        #[source]
        source: io::Error,
    },

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The request would be rejected by the server's command grammar.
    #[error("{0}")]
    Command(#[from] ParseError),

    /// The request would reach the server as a different command.
    ///
    /// For example, publishing the text `who` would be read as a presence
    /// query rather than a public message.
    #[error("Line would be read as a different command: {0}")]
    Ambiguous(String),

    /// The request contains a line terminator.
    #[error("Line must not contain a newline")]
    Newline,
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
