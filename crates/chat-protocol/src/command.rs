//! Parsing of inbound command lines.
//!
//! One line (already stripped of its terminator) maps to exactly one
//! [`Command`]. Prefixes are matched literally before the line is split on
//! `|`, so a line that starts with `rename|` or `to|` but has the wrong
//! number of fields is a [`ParseError`] for the sender, never a broadcast.

use thiserror::Error;

/// Presence query.
pub const WHO: &str = "who";

/// Prefix of the rename command: `rename|<name>`.
pub const RENAME_PREFIX: &str = "rename|";

/// Prefix of the private message command: `to|<name>|<content>`.
pub const PRIVATE_PREFIX: &str = "to|";

/// Separator between command fields.
pub const FIELD_SEPARATOR: char = '|';

/// A parsed inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// List everyone currently online.
    Who,

    /// Change the sender's display name.
    Rename {
        /// Requested display name
        name: &'a str,
    },

    /// Direct message to a single user.
    Private {
        /// Recipient display name
        to: &'a str,
        /// Message body (never empty)
        content: &'a str,
    },

    /// Anything else is published to everyone online.
    Public {
        /// The line as received
        text: &'a str,
    },
}

/// Malformed command lines.
///
/// The `Display` text is sent back to the offending client verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// `rename|` line that is not exactly `rename|<non-empty name>`.
    #[error("Rename format error, please use rename|name")]
    RenameFormat,

    /// `to|` line that does not split into exactly three fields.
    #[error("Msg format error, please use to|name|content")]
    PrivateFormat,

    /// `to|<name>|` with nothing after the last separator.
    #[error("Msg is empty.")]
    EmptyContent,
}

impl<'a> Command<'a> {
    /// Parses a single line.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for prefixed lines with the wrong shape.
    pub fn parse(line: &'a str) -> Result<Self, ParseError> {
        if line == WHO {
            return Ok(Self::Who);
        }

        if line.starts_with(RENAME_PREFIX) {
            let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
            return match fields.as_slice() {
                [_, name] if !name.is_empty() => Ok(Self::Rename { name: *name }),
                _ => Err(ParseError::RenameFormat),
            };
        }

        if line.starts_with(PRIVATE_PREFIX) {
            let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
            return match fields.as_slice() {
                [_, _, content] if content.is_empty() => Err(ParseError::EmptyContent),
                [_, to, content] => Ok(Self::Private {
                    to: *to,
                    content: *content,
                }),
                _ => Err(ParseError::PrivateFormat),
            };
        }

        Ok(Self::Public { text: line })
    }

    /// Formats a command back into its wire form (without terminator).
    pub fn to_line(&self) -> String {
        match self {
            Self::Who => WHO.to_string(),
            Self::Rename { name } => format!("{RENAME_PREFIX}{name}"),
            Self::Private { to, content } => {
                format!("{PRIVATE_PREFIX}{to}{FIELD_SEPARATOR}{content}")
            }
            Self::Public { text } => (*text).to_string(),
        }
    }
}
