use crate::core::message::ByteMessage;
use crate::core::opcode::{VendorOpcode, VENDOR_OPCODE_LEN};
use crate::error::{ModelError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Largest access PDU the transport accepts, opcode included
pub const ACCESS_MESSAGE_LENGTH_MAX: usize = 380;

/// Access-layer frame: vendor opcode followed by the message payload
///
/// ```text
/// [Opcode(1)] [CompanyId LE(2)] [Payload(N)]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPdu {
    pub opcode: VendorOpcode,
    pub payload: Bytes,
}

impl AccessPdu {
    pub fn new(opcode: VendorOpcode, payload: Bytes) -> Self {
        Self { opcode, payload }
    }

    /// Build the PDU for a model message
    pub fn from_message(message: &ByteMessage) -> Self {
        Self::new(message.opcode().vendor(), message.payload())
    }

    /// Total encoded length
    #[inline]
    pub fn encoded_len(&self) -> usize {
        VENDOR_OPCODE_LEN + self.payload.len()
    }

    /// Serialize, rejecting frames above [`ACCESS_MESSAGE_LENGTH_MAX`]
    pub fn to_bytes(&self) -> Result<Bytes> {
        let len = self.encoded_len();
        if len > ACCESS_MESSAGE_LENGTH_MAX {
            return Err(ModelError::PayloadTooLarge(len));
        }

        let mut buf = BytesMut::with_capacity(len);
        buf.put_slice(&self.opcode.to_bytes());
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Parse a received frame. The payload shares the input buffer.
    pub fn from_bytes(data: &Bytes) -> Result<Self> {
        if data.len() > ACCESS_MESSAGE_LENGTH_MAX {
            return Err(ModelError::PayloadTooLarge(data.len()));
        }
        let opcode = VendorOpcode::from_bytes(data)?;
        Ok(Self {
            opcode,
            payload: data.slice(VENDOR_OPCODE_LEN..),
        })
    }
}
