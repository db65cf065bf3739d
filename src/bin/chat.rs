//! chat - menu-driven terminal client for chatd
//!
//! # Usage
//!
//! ```bash
//! chat --ip 127.0.0.1 --port 8888
//! ```
//!
//! Lines from the server are printed as they arrive while the menu waits
//! for input. Set `RUST_LOG` to get diagnostics on stderr.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use chat_client::{ChatClient, ChatReader, ClientConfig, Menu, DEFAULT_SERVER_IP, DEFAULT_SERVER_PORT};

/// chat - talk to a chatd server
#[derive(Parser, Debug)]
#[command(name = "chat", version, about)]
struct Args {
    /// Server address
    #[arg(long, default_value = DEFAULT_SERVER_IP)]
    ip: String,

    /// Server port
    #[arg(long, default_value_t = DEFAULT_SERVER_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let args = Args::parse();
    let config = ClientConfig {
        ip: args.ip,
        port: args.port,
    };

    let client = ChatClient::connect_with(&config)
        .await
        .context("Link server failed")?;
    println!("Link server success.");

    let (reader, writer) = client.into_split();
    let printer = tokio::spawn(print_server_lines(reader));

    let mut menu = Menu::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), writer);

    tokio::select! {
        result = menu.run() => result.context("Menu failed")?,
        _ = printer => println!("Server closed the connection."),
    }

    Ok(())
}

async fn print_server_lines(mut reader: ChatReader) {
    loop {
        match reader.recv_line().await {
            Ok(Some(line)) => println!("{line}"),
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Read from server failed");
                break;
            }
        }
    }
}
