//! # Access Layer Boundary
//!
//! The models never talk to a radio. They talk to an access layer that
//! registers models, resolves publish addresses, sends acknowledged and
//! unacknowledged messages, and reports everything that happens afterwards
//! as [`AccessEvent`]s.
//!
//! ## Event Stages
//! - [`AccessEvent::Message`]: an inbound message for a registered opcode
//! - [`AccessEvent::ReliableStatus`]: a reliable transfer was resolved
//! - [`AccessEvent::PublishTimeout`]: the periodic publish interval elapsed
//!
//! A reply to a reliable transfer produces a `Message` event first and a
//! `ReliableStatus` event afterwards. The two are independent: a model may
//! reject the message and the transfer still resolves.
//!
//! ## Implementations
//! - [`local`]: in-process mesh over tokio channels, for tests and demos

use crate::core::opcode::VendorOpcode;
use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod local;

/// Shortest timeout an acknowledged transfer may use
pub const RELIABLE_TIMEOUT_MIN: Duration = Duration::from_secs(2);

/// Longest timeout an acknowledged transfer may use
pub const RELIABLE_TIMEOUT_MAX: Duration = Duration::from_secs(60);

/// 16-bit mesh address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub u16);

impl Address {
    pub const UNASSIGNED: Address = Address(0x0000);

    /// Unicast range is 0x0001..=0x7FFF
    pub fn is_unicast(self) -> bool {
        self.0 != 0 && self.0 & 0x8000 == 0
    }

    /// Group and virtual ranges
    pub fn is_group(self) -> bool {
        self.0 & 0xC000 == 0xC000
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Opaque handle the access layer assigns on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelHandle(pub u16);

/// Outbound message: opcode and encoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxMessage {
    pub opcode: VendorOpcode,
    pub payload: Bytes,
}

impl TxMessage {
    pub fn new(opcode: impl Into<VendorOpcode>, payload: Bytes) -> Self {
        Self {
            opcode: opcode.into(),
            payload,
        }
    }
}

/// Inbound message with its delivery metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxMessage {
    pub opcode: VendorOpcode,
    pub payload: Bytes,
    /// Element address of the sender
    pub src: Address,
    /// Address the message was sent to (unicast or group)
    pub dst: Address,
}

/// Acknowledged send: the message plus what completes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReliableRequest {
    pub message: TxMessage,
    pub reply_opcode: VendorOpcode,
    pub timeout: Duration,
}

/// How a reliable transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReliableOutcome {
    /// A message with the expected reply opcode arrived
    Success,
    /// No reply within the timeout
    Timeout,
    /// Aborted through [`AccessLayer::cancel_reliable`]
    Cancelled,
}

/// Everything the access layer reports back to a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessEvent {
    Message {
        handle: ModelHandle,
        message: RxMessage,
    },
    ReliableStatus {
        handle: ModelHandle,
        outcome: ReliableOutcome,
    },
    PublishTimeout {
        handle: ModelHandle,
    },
}

impl AccessEvent {
    /// Model the event is addressed to
    pub fn handle(&self) -> ModelHandle {
        match self {
            AccessEvent::Message { handle, .. }
            | AccessEvent::ReliableStatus { handle, .. }
            | AccessEvent::PublishTimeout { handle } => *handle,
        }
    }
}

/// Access-layer services a model depends on
pub trait AccessLayer {
    /// Add a model on `element_index` that receives `opcodes`
    fn register(
        &mut self,
        element_index: u16,
        model_id: u16,
        opcodes: &[VendorOpcode],
    ) -> Result<ModelHandle>;

    /// Publish `request` and track its reply. Completion arrives later as
    /// [`AccessEvent::ReliableStatus`].
    fn send_reliable(&mut self, handle: ModelHandle, request: ReliableRequest) -> Result<()>;

    /// Publish without acknowledgement
    fn publish(&mut self, handle: ModelHandle, message: &TxMessage) -> Result<()>;

    /// Answer `request`, addressed back to its sender
    fn reply(&mut self, handle: ModelHandle, request: &RxMessage, message: &TxMessage)
        -> Result<()>;

    /// Abort the active reliable transfer, if any
    fn cancel_reliable(&mut self, handle: ModelHandle);

    /// Current publish destination of the model
    fn publish_address(&self, handle: ModelHandle) -> Option<Address>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_ranges() {
        assert!(Address(0x0001).is_unicast());
        assert!(Address(0x7FFF).is_unicast());
        assert!(!Address::UNASSIGNED.is_unicast());
        assert!(!Address(0xC000).is_unicast());
        assert!(Address(0xC000).is_group());
        assert!(Address(0xFFFF).is_group());
        assert!(!Address(0x8000).is_group());
    }

    #[test]
    fn test_event_handle() {
        let event = AccessEvent::ReliableStatus {
            handle: ModelHandle(3),
            outcome: ReliableOutcome::Timeout,
        };
        assert_eq!(event.handle(), ModelHandle(3));
        assert_eq!(Address(0x0102).to_string(), "0x0102");
    }
}
