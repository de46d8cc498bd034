//! Example: Client and server on an in-process mesh
//!
//! Two nodes share a [`LocalMesh`]. The client sets, reads and bursts a value
//! to the server, then waits out a Get nobody answers.
//!
//! Run with: `cargo run --example round_trip`
//! Set `RUST_LOG=debug` to see the access-layer traffic.

#![allow(clippy::uninlined_format_args)]

use mesh_generic_byte::config::ModelConfig;
use mesh_generic_byte::utils::logging::init_logging;
use mesh_generic_byte::{
    AccessModel, Address, ByteClient, ByteServer, LocalMesh, MeshNode, Metrics,
};
use std::sync::{Arc, Mutex};

const CLIENT_ADDR: Address = Address(0x0100);
const SERVER_ADDR: Address = Address(0x0200);
const STATUS_GROUP: Address = Address(0xC000);

/// Pump both nodes until the client's request slot is free
async fn exchange(
    client: &mut ByteClient,
    client_node: &mut MeshNode,
    server: &mut ByteServer,
    server_node: &mut MeshNode,
) {
    while client.is_busy() {
        while let Some(event) = server_node.try_next_event() {
            server.handle_event(server_node, &event);
        }
        let (for_client, event) = tokio::select! {
            event = client_node.next_event() => (true, event),
            event = server_node.next_event() => (false, event),
        };
        match (for_client, event) {
            (true, Some(event)) => {
                client.handle_event(client_node, &event);
            }
            (false, Some(event)) => {
                server.handle_event(server_node, &event);
            }
            (_, None) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ModelConfig::from_env()?;
    config.validate_strict()?;
    init_logging(&config.logging)?;

    println!("=== Generic Byte Round Trip ===\n");

    let mesh = LocalMesh::new();
    let mut client_node = mesh.add_node(CLIENT_ADDR, 1)?;
    let mut server_node = mesh.add_node(SERVER_ADDR, 1)?;
    let metrics = Arc::new(Metrics::new());

    let value = Arc::new(Mutex::new(0u8));
    let get_value = value.clone();
    let set_value = value.clone();
    let mut server = ByteServer::builder()
        .with_config(&config.server)
        .metrics(metrics.clone())
        .on_get(move |_| get_value.lock().map(|v| *v).unwrap_or(0))
        .on_set(move |_, requested| {
            let stored = requested.min(100);
            if let Ok(mut v) = set_value.lock() {
                *v = stored;
            }
            stored
        })
        .init(&mut server_node)?;

    let mut client = ByteClient::builder()
        .with_config(&config.client)
        .metrics(metrics.clone())
        .on_status(|handle, status, src| {
            println!("  client {:?}: {:?} from {:?}", handle.0, status, src);
        })
        .init(&mut client_node)?;

    client_node.set_publish_address(client.handle(), SERVER_ADDR)?;
    server_node.set_publish_address(server.handle(), STATUS_GROUP)?;

    println!("1. Set 42");
    client.set(&mut client_node, 42)?;
    exchange(&mut client, &mut client_node, &mut server, &mut server_node).await;

    println!("2. Set 250 (server clamps)");
    client.set(&mut client_node, 250)?;
    exchange(&mut client, &mut client_node, &mut server, &mut server_node).await;

    println!("3. Get");
    client.get(&mut client_node)?;
    exchange(&mut client, &mut client_node, &mut server, &mut server_node).await;

    println!("4. Unacknowledged burst of 7");
    let repeats = client.unreliable_repeats();
    client.set_unreliable(&mut client_node, 7, repeats)?;
    while let Some(event) = server_node.try_next_event() {
        server.handle_event(&mut server_node, &event);
    }
    println!("  server value is now {:?}", value.lock().map(|v| *v).ok());

    println!("5. Get with the server gone quiet");
    client.get(&mut client_node)?;
    while client.is_busy() {
        if let Some(event) = client_node.next_event().await {
            client.handle_event(&mut client_node, &event);
        }
    }

    metrics.log_metrics();
    println!("\n{:#?}", metrics.snapshot());
    Ok(())
}
