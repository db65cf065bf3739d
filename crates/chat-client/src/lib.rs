//! chat-client - client library and menu front end for the chat server
//!
//! - `client` - `ChatClient` connection with typed requests and line reads
//! - `menu` - interactive menu (public chat, private chat, rename, exit)
//! - `error` - `ClientError`
//!
//! **Panic-Free Policy:** All production code follows the project's
//! panic-free guidelines. No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()`.

pub mod client;
pub mod error;
pub mod menu;

pub use client::{ChatClient, ChatReader, ChatWriter, ClientConfig, DEFAULT_SERVER_IP, DEFAULT_SERVER_PORT};
pub use error::{ClientError, Result};
pub use menu::{Menu, MenuChoice};
