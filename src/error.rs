//! # Error Types
//!
//! Error handling for the Generic Byte model and its access layer.
//!
//! Every variant here is returned synchronously from an issue-time operation
//! (init, set, get, publish, register). Asynchronous outcomes of a reliable
//! transfer (reply received, timed out, cancelled) are never errors; they are
//! reported through the client's status callback as
//! [`ByteStatus`](crate::protocol::client::ByteStatus).
//!
//! ## Error Categories
//! - **Argument Errors**: missing mandatory callbacks, invalid parameters
//! - **Registration Errors**: model already bound, unknown element, no free slot
//! - **Transfer Errors**: reliable transfer already active, no publish address
//! - **Wire Errors**: oversized or malformed access PDUs
//! - **Configuration Errors**: unreadable or invalid configuration
//!
//! ## Example Usage
//! ```rust
//! use mesh_generic_byte::error::{ModelError, Result};
//! use tracing::error;
//!
//! fn check_busy(busy: bool) -> Result<()> {
//!     if busy {
//!         return Err(ModelError::InvalidState);
//!     }
//!     Ok(())
//! }
//!
//! if let Err(e) = check_busy(true) {
//!     error!(error = %e, "Request rejected");
//! }
//! ```

use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Missing callbacks
    pub const ERR_STATUS_CB_MISSING: &str = "client status callback";
    pub const ERR_GET_CB_MISSING: &str = "server get callback";
    pub const ERR_SET_CB_MISSING: &str = "server set callback";

    /// Lookup failures
    pub const ERR_ELEMENT_NOT_FOUND: &str = "element index out of range";
    pub const ERR_MODEL_NOT_FOUND: &str = "invalid model handle";

    /// Parameter validation
    pub const ERR_TIMEOUT_RANGE: &str = "reliable timeout out of range";
    pub const ERR_DROP_RATE_RANGE: &str = "drop rate must be within 0.0..=1.0";
    pub const ERR_ELEMENT_COUNT: &str = "node needs at least one element";
    pub const ERR_PUBLISH_PERIOD: &str = "publish period must be non-zero";
}

/// Primary error type for all model and access-layer operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Missing mandatory argument: {0}")]
    NullArgument(&'static str),

    #[error("No resources available to register the model or queue the message")]
    ResourceExhausted,

    #[error("Model {model_id:#06x} already bound to element {element_index}")]
    AlreadyBound { element_index: u16, model_id: u16 },

    #[error("Not found: {0}")]
    NotFound(&'static str),

    #[error("A reliable transfer is already active")]
    InvalidState,

    #[error("Publish address or key binding missing or malformed")]
    InvalidAddressConfig,

    #[error("Message too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("Malformed payload for opcode {opcode:#04x}: {length} bytes")]
    MalformedPayload { opcode: u8, length: usize },

    #[error("Unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ModelError
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ModelError::AlreadyBound {
            element_index: 1,
            model_id: 0x0004,
        };
        assert_eq!(err.to_string(), "Model 0x0004 already bound to element 1");

        let err = ModelError::MalformedPayload {
            opcode: 0xD1,
            length: 3,
        };
        assert_eq!(err.to_string(), "Malformed payload for opcode 0xd1: 3 bytes");

        let err = ModelError::NullArgument(constants::ERR_STATUS_CB_MISSING);
        assert!(err.to_string().contains("status callback"));
    }
}
