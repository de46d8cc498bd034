//! Fixed-layout Generic Byte messages.
//!
//! Payloads are packed byte structures with no padding:
//!
//! ```text
//! Set / SetUnreliable: [value(1)] [tid(1)]
//! Get:                 (empty)
//! Status:              [value(1)]
//! ```

use crate::core::opcode::Opcode;
use crate::error::{ModelError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Lowest value a Status may report
pub const VALUE_MIN: u8 = 0;

/// Highest value a Status may report
pub const VALUE_MAX: u8 = 100;

/// Range of values the client accepts in a Status
pub const VALUE_RANGE: RangeInclusive<u8> = VALUE_MIN..=VALUE_MAX;

/// Payload length of Set and SetUnreliable
pub const SET_LEN: usize = 2;

/// Payload length of Status
pub const STATUS_LEN: usize = 1;

/// Whether `value` may be reported to the application
#[inline]
pub fn is_valid_value(value: u8) -> bool {
    VALUE_RANGE.contains(&value)
}

/// Transaction identifier carried by Set-family messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tid(pub u8);

/// Per-client TID source. Wraps at 255.
#[derive(Debug, Clone, Default)]
pub struct TidCounter {
    next: u8,
}

impl TidCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an arbitrary value, e.g. one restored across a reboot
    pub fn starting_at(next: u8) -> Self {
        Self { next }
    }

    /// Hand out the current TID and advance
    pub fn next_tid(&mut self) -> Tid {
        let tid = Tid(self.next);
        self.next = self.next.wrapping_add(1);
        tid
    }

    /// TID the next call to [`next_tid`](Self::next_tid) will return
    pub fn peek(&self) -> Tid {
        Tid(self.next)
    }
}

/// Acknowledged Set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetRequest {
    pub value: u8,
    pub tid: Tid,
}

/// Unacknowledged Set, same layout as [`SetRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetUnreliableRequest {
    pub value: u8,
    pub tid: Tid,
}

/// Status, sent as reply or unsolicited publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub value: u8,
}

impl SetRequest {
    pub fn to_bytes(&self) -> [u8; SET_LEN] {
        [self.value, self.tid.0]
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let [value, tid] = fixed::<SET_LEN>(Opcode::Set, data)?;
        Ok(Self {
            value,
            tid: Tid(tid),
        })
    }
}

impl SetUnreliableRequest {
    pub fn to_bytes(&self) -> [u8; SET_LEN] {
        [self.value, self.tid.0]
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let [value, tid] = fixed::<SET_LEN>(Opcode::SetUnreliable, data)?;
        Ok(Self {
            value,
            tid: Tid(tid),
        })
    }
}

impl StatusReply {
    pub fn to_bytes(&self) -> [u8; STATUS_LEN] {
        [self.value]
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let [value] = fixed::<STATUS_LEN>(Opcode::Status, data)?;
        Ok(Self { value })
    }
}

fn fixed<const N: usize>(opcode: Opcode, data: &[u8]) -> Result<[u8; N]> {
    <[u8; N]>::try_from(data).map_err(|_| ModelError::MalformedPayload {
        opcode: opcode.as_u8(),
        length: data.len(),
    })
}

/// Every message of the model, tagged by opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteMessage {
    Set(SetRequest),
    Get,
    SetUnreliable(SetUnreliableRequest),
    Status(StatusReply),
}

impl ByteMessage {
    pub fn opcode(&self) -> Opcode {
        match self {
            ByteMessage::Set(_) => Opcode::Set,
            ByteMessage::Get => Opcode::Get,
            ByteMessage::SetUnreliable(_) => Opcode::SetUnreliable,
            ByteMessage::Status(_) => Opcode::Status,
        }
    }

    /// Encode the payload (opcode not included)
    pub fn payload(&self) -> Bytes {
        match self {
            ByteMessage::Set(m) => Bytes::copy_from_slice(&m.to_bytes()),
            ByteMessage::Get => Bytes::new(),
            ByteMessage::SetUnreliable(m) => Bytes::copy_from_slice(&m.to_bytes()),
            ByteMessage::Status(m) => Bytes::copy_from_slice(&m.to_bytes()),
        }
    }

    /// Decode a payload received under `opcode`
    pub fn decode(opcode: Opcode, data: &[u8]) -> Result<Self> {
        match opcode {
            Opcode::Set => SetRequest::from_bytes(data).map(ByteMessage::Set),
            Opcode::Get if data.is_empty() => Ok(ByteMessage::Get),
            Opcode::Get => Err(ModelError::MalformedPayload {
                opcode: opcode.as_u8(),
                length: data.len(),
            }),
            Opcode::SetUnreliable => {
                SetUnreliableRequest::from_bytes(data).map(ByteMessage::SetUnreliable)
            }
            Opcode::Status => StatusReply::from_bytes(data).map(ByteMessage::Status),
        }
    }
}
