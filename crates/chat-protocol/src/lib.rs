//! Chat Protocol - newline-delimited text protocol
//!
//! This crate provides the pieces shared by the server (chatd) and the
//! line client:
//! - `command` - grammar for inbound lines (`who`, `rename|..`, `to|..|..`)
//! - `line` - formatting of outbound lines (broadcasts, notices)
//! - `codec` - line framing with inbound activity reporting
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod codec;
pub mod command;
pub mod line;

pub use codec::{Inbound, LineCodec, MAX_LINE_LENGTH};
pub use command::{Command, ParseError, FIELD_SEPARATOR, PRIVATE_PREFIX, RENAME_PREFIX, WHO};
pub use line::{ServerLine, IDLE_TIMEOUT_NOTICE, OFFLINE, ONLINE};
