//! # Generic Byte Models
//!
//! Client and server roles of the Generic Byte model.
//!
//! ## Components
//! - **Client**: one outstanding acknowledged request at a time, with
//!   provenance and range checks on every Status
//! - **Server**: opcode dispatch to application get/set callbacks, Status
//!   replies and unsolicited publishes
//! - **Dispatcher**: [`AccessModel`] trait routing access-layer events to
//!   the message stage or the transfer-resolution stage
//!
//! ## Message Flow
//! ```text
//! Client ──Set/Get──▶ Server ──set_cb/get_cb──▶ application
//!   ▲                   │
//!   └─────Status────────┘ (+ Status publish after Set)
//! ```

pub mod client;
pub mod dispatcher;
pub mod server;

pub use client::{ByteClient, ByteStatus, ClientBuilder, PendingRequest, TransferState};
pub use dispatcher::AccessModel;
pub use server::{ByteServer, ServerBuilder};
