//! Simple notification relay example
//!
//! Run with: cargo run --example simple_relay [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_relay                  # binds to 0.0.0.0:3001
//!   cargo run --example simple_relay 127.0.0.1:4000   # custom address
//!
//! Talk to it with netcat (one JSON object per line):
//!
//!   nc localhost 3001
//!   {"type":"register","user":{"domain":"d1","platform":"web","user_id":"u1","first_name":"Ada","role":"admin"}}
//!   {"type":"ping"}
//!
//! And from a second terminal:
//!
//!   nc localhost 3001
//!   {"type":"broadcast","message":"hello","user_id":"u1"}
//!
//! Broadcasts with no matching client online are kept in
//! `pending_notifications.json` and replayed when a matching client
//! registers.

use std::net::SocketAddr;

use relay_rs::{RelayServer, ServerConfig};

#[tokio::main]
async fn main() -> relay_rs::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_rs=debug,info".into()),
        )
        .init();

    let bind_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:3001".to_string())
        .parse()
        .expect("invalid bind address");

    let config = ServerConfig::default().bind(bind_addr);
    let server = RelayServer::new(config);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
