//! Ping client: sends one message per second and prints every reply.
//!
//! Run with: `cargo run --example ping_client [server_addr] [msg_id]`

use hubnet::prelude::*;
use std::net::SocketAddr;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let addr: SocketAddr = args.next().as_deref().unwrap_or("127.0.0.1:8999").parse()?;
    let msg_id: u32 = match args.next() {
        Some(id) => id.parse()?,
        None => 0,
    };

    println!("Connecting to {}...", addr);
    let mut client = TcpClient::connect(TcpClientConfig::new(addr)).await?;
    println!("Connected");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            result = round_trip(&mut client, msg_id) => {
                if !result? {
                    println!("Server closed the connection");
                    return Ok(());
                }
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    client.close().await?;
    println!("Client stopped");
    Ok(())
}

/// Sends one message and prints replies until the one matching `msg_id`.
///
/// Returns `false` once the server has closed the connection.
async fn round_trip(client: &mut TcpClient, msg_id: u32) -> Result<bool, TransportError> {
    client.send(msg_id, &b"hubnet client test message"[..]).await?;

    while let Some(msg) = client.recv().await? {
        println!(
            "==> Recv Msg: ID={}, len={}, data={}",
            msg.id(),
            msg.payload_len(),
            String::from_utf8_lossy(msg.payload())
        );
        if msg.id() == msg_id {
            return Ok(true);
        }
    }
    Ok(false)
}
