//! Ping server: answers message id 0 with a ping and id 1 with a greeting.
//!
//! Run with: `cargo run --example ping_server [bind_addr]`
//! Log level: `RUST_LOG=debug cargo run --example ping_server`

use async_trait::async_trait;
use hubnet::prelude::*;
use std::net::SocketAddr;
use std::sync::Arc;

struct PingRouter;

#[async_trait]
impl Router for PingRouter {
    async fn handle(&self, request: &Request) {
        tracing::info!(
            msg_id = request.msg_id(),
            data = %String::from_utf8_lossy(request.data()),
            "ping"
        );
        if let Err(e) = request
            .connection()
            .send_buffered(0, &b"ping...ping...ping"[..])
        {
            tracing::warn!(error = %e, "reply dropped");
        }
    }
}

struct HelloRouter;

#[async_trait]
impl Router for HelloRouter {
    async fn handle(&self, request: &Request) {
        tracing::info!(
            msg_id = request.msg_id(),
            data = %String::from_utf8_lossy(request.data()),
            "hello"
        );
        if let Err(e) = request
            .connection()
            .send_buffered(1, &b"Hello hubnet router"[..])
        {
            tracing::warn!(error = %e, "reply dropped");
        }
    }
}

async fn on_connection_begin(conn: Arc<Connection>) {
    conn.set_property("Name", "hubnet");
    conn.set_property("Home", "https://github.com/hubnet-rs/hubnet");
    tracing::info!(conn_id = conn.id(), "connection begin, properties set");

    if let Err(e) = conn.send(2, &b"DoConnection BEGIN..."[..]).await {
        tracing::warn!(conn_id = conn.id(), error = %e, "greeting dropped");
    }
}

async fn on_connection_lost(conn: Arc<Connection>) {
    if let Ok(name) = conn.get_property::<&str>("Name") {
        tracing::info!(conn_id = conn.id(), name, "connection property");
    }
    if let Ok(home) = conn.get_property::<&str>("Home") {
        tracing::info!(conn_id = conn.id(), home, "connection property");
    }
    tracing::info!(conn_id = conn.id(), "connection lost");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::default().name("ping-server");
    if let Some(addr) = std::env::args().nth(1) {
        config = config.bind(addr.parse::<SocketAddr>()?);
    }

    let server = Server::new(config);
    server.set_on_conn_start(on_connection_begin);
    server.set_on_conn_stop(on_connection_lost);
    server.add_router(0, PingRouter)?;
    server.add_router(1, HelloRouter)?;

    let shutdown = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutting down");
        shutdown.stop().await;
    });

    println!("Press Ctrl+C to stop");
    server.serve().await?;

    println!("Server stopped");
    Ok(())
}
