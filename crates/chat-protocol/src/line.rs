//! Outbound lines (server → client).
//!
//! Every outbound message is one free-text line with no envelope. The
//! terminator is added by the codec, never here.

use std::fmt;

/// Broadcast text announcing a session coming online.
pub const ONLINE: &str = "is online";

/// Broadcast text announcing a session going offline.
pub const OFFLINE: &str = "is offline";

/// Last line a session receives before an idle disconnect.
pub const IDLE_TIMEOUT_NOTICE: &str = "You will be offline.";

/// A single line sent to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLine<'a> {
    /// Public message: `[<addr>]<name>: <text>`
    Broadcast {
        addr: &'a str,
        name: &'a str,
        text: &'a str,
    },

    /// Direct message: `<from> say: <content>`
    Private { from: &'a str, content: &'a str },

    /// One entry of a `who` listing: `[<addr>]<name> is online.`
    Presence { addr: &'a str, name: &'a str },

    /// Rename succeeded.
    Renamed { name: &'a str },

    /// Rename target is taken by another session.
    NameTaken,

    /// Private message recipient is not online.
    UnknownUser { name: &'a str },

    /// Private message could not be queued for its recipient.
    Undelivered { name: &'a str },

    /// Inbound line exceeded the maximum length and was discarded.
    LineTooLong { max: usize },

    /// Inbound line was not valid UTF-8.
    InvalidUtf8,

    /// Free-form system notice.
    Notice(&'a str),
}

impl fmt::Display for ServerLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broadcast { addr, name, text } => write!(f, "[{addr}]{name}: {text}"),
            Self::Private { from, content } => write!(f, "{from} say: {content}"),
            Self::Presence { addr, name } => write!(f, "[{addr}]{name} is online."),
            Self::Renamed { name } => write!(f, "Update user name to {name}."),
            Self::NameTaken => write!(f, "The new name has been used."),
            Self::UnknownUser { name } => write!(f, "User {name} is not exist."),
            Self::Undelivered { name } => write!(f, "Msg to {name} was not delivered."),
            Self::LineTooLong { max } => write!(f, "Line too long (max: {max} bytes)."),
            Self::InvalidUtf8 => write!(f, "Line is not valid UTF-8."),
            Self::Notice(text) => f.write_str(text),
        }
    }
}
