//! chatd - presence-aware TCP broadcast chat server
//!
//! This crate provides the core infrastructure for the chat daemon:
//! - `registry` - Presence registry actor, the single owner of who is online
//! - `hub` - Broadcast hub that orders and fans out public messages
//! - `mailbox` - Bounded per-session outbound queues
//! - `server` - TCP listener and per-connection sessions
//! - `config` - Server configuration (defaults, TOML file)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         chatd                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │   ChatServer    │     │       RegistryActor         │    │
//! │  │ (TcpListener)   │     │  (name → SessionHandle)     │    │
//! │  └────────┬────────┘     └──────────────▲──────────────┘    │
//! │           │ accept                      │ commands          │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐  publish  ┌────────┴────────────┐      │
//! │  │     Session     │──────────▶│    BroadcastHub     │      │
//! │  │ (read + drain)  │           │ (ordered fan-out)   │      │
//! │  └────────▲────────┘           └────────┬────────────┘      │
//! │           │ Mailbox                     │ try_send          │
//! │           └─────────────────────────────┘                   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod hub;
pub mod mailbox;
pub mod registry;
pub mod server;
