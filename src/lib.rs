//! # Mesh Generic Byte
//!
//! Client and server roles of a vendor-specific mesh model that carries one
//! byte of state (0..=100) between nodes.
//!
//! ## Modules
//! - [`core`]: opcodes, fixed-layout messages and access PDU framing
//! - [`protocol`]: the client state machine and the server dispatcher
//! - [`transport`]: the access-layer boundary and an in-process mesh
//! - [`config`]: TOML and environment configuration
//! - [`utils`]: logging setup and metrics
//!
//! ## Example
//! ```no_run
//! use mesh_generic_byte::{AccessModel, Address, ByteClient, ByteServer, LocalMesh};
//!
//! # async fn run() -> mesh_generic_byte::Result<()> {
//! let mesh = LocalMesh::new();
//! let mut server_node = mesh.add_node(Address(0x0200), 1)?;
//! let mut client_node = mesh.add_node(Address(0x0100), 1)?;
//!
//! let mut server = ByteServer::builder()
//!     .on_get(|_| 0)
//!     .on_set(|_, value| value)
//!     .init(&mut server_node)?;
//! let mut client = ByteClient::builder()
//!     .on_status(|_, status, src| println!("{status:?} from {src:?}"))
//!     .init(&mut client_node)?;
//! client_node.set_publish_address(client.handle(), Address(0x0200))?;
//!
//! client.set(&mut client_node, 42)?;
//! if let Some(event) = server_node.next_event().await {
//!     server.handle_event(&mut server_node, &event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::ModelConfig;
pub use error::{ModelError, Result};
pub use protocol::{AccessModel, ByteClient, ByteServer, ByteStatus};
pub use transport::local::{LocalMesh, MeshNode};
pub use transport::{AccessEvent, AccessLayer, Address, ModelHandle};
pub use utils::Metrics;
