//! # Core Wire Components
//!
//! Opcodes, message layouts and access-layer framing shared by the client
//! and the server.
//!
//! ## Components
//! - **Opcode**: the closed Generic Byte opcode set and vendor opcode encoding
//! - **Message**: fixed-layout Set, Set-Unreliable and Status payloads
//! - **Packet**: access PDU framing with the transport's length limit
//!
//! ## Wire Format
//! ```text
//! [Opcode(1)] [CompanyId LE(2)] [Payload(0..2)]
//! ```

pub mod message;
pub mod opcode;
pub mod packet;
