//! Vendor opcodes and model identifiers for the Generic Byte model.
//!
//! The model lives in the vendor opcode space. On the wire a vendor opcode is
//! three bytes: the opcode byte (top two bits set) followed by the company
//! identifier in little-endian order.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};

/// Company identifier the model is registered under (Nordic Semiconductor)
pub const COMPANY_ID: u16 = 0x0059;

/// Generic Byte Server model ID
pub const SERVER_MODEL_ID: u16 = 0x0004;

/// Generic Byte Client model ID
pub const CLIENT_MODEL_ID: u16 = 0x0005;

/// Length of an encoded vendor opcode in bytes
pub const VENDOR_OPCODE_LEN: usize = 3;

/// Prefix bits every vendor opcode byte carries
const VENDOR_PREFIX: u8 = 0xC0;

/// Generic Byte opcodes. The set is closed for this model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// Acknowledged Set
    Set = 0xD1,
    /// Get
    Get = 0xD2,
    /// Unacknowledged Set
    SetUnreliable = 0xD3,
    /// Status, as reply or unsolicited publish
    Status = 0xD4,
}

impl Opcode {
    /// Every opcode of the model, in wire order
    pub const ALL: [Opcode; 4] = [
        Opcode::Set,
        Opcode::Get,
        Opcode::SetUnreliable,
        Opcode::Status,
    ];

    /// Raw opcode byte
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Scope this opcode to the model's company identifier
    #[inline]
    pub fn vendor(self) -> VendorOpcode {
        VendorOpcode::new(self.as_u8(), COMPANY_ID)
    }

    /// Human-readable name for logs
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Set => "SET",
            Opcode::Get => "GET",
            Opcode::SetUnreliable => "SET_UNRELIABLE",
            Opcode::Status => "STATUS",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ModelError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0xD1 => Ok(Opcode::Set),
            0xD2 => Ok(Opcode::Get),
            0xD3 => Ok(Opcode::SetUnreliable),
            0xD4 => Ok(Opcode::Status),
            other => Err(ModelError::UnknownOpcode(other)),
        }
    }
}

/// A vendor-scoped opcode: opcode byte plus company identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorOpcode {
    pub opcode: u8,
    pub company_id: u16,
}

impl VendorOpcode {
    pub const fn new(opcode: u8, company_id: u16) -> Self {
        Self { opcode, company_id }
    }

    /// Encode as the 3-byte wire form
    pub fn to_bytes(self) -> [u8; VENDOR_OPCODE_LEN] {
        let company = self.company_id.to_le_bytes();
        [VENDOR_PREFIX | self.opcode, company[0], company[1]]
    }

    /// Decode the 3-byte wire form at the start of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < VENDOR_OPCODE_LEN {
            return Err(ModelError::MalformedPayload {
                opcode: data.first().copied().unwrap_or(0),
                length: data.len(),
            });
        }
        if data[0] & VENDOR_PREFIX != VENDOR_PREFIX {
            return Err(ModelError::UnknownOpcode(data[0]));
        }
        Ok(Self {
            opcode: data[0],
            company_id: u16::from_le_bytes([data[1], data[2]]),
        })
    }

    /// Resolve to a model opcode if this belongs to the model's company
    pub fn model_opcode(self) -> Result<Opcode> {
        if self.company_id != COMPANY_ID {
            return Err(ModelError::UnknownOpcode(self.opcode));
        }
        Opcode::try_from(self.opcode)
    }
}

impl From<Opcode> for VendorOpcode {
    fn from(opcode: Opcode) -> Self {
        opcode.vendor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_opcode_wire_form() {
        assert_eq!(Opcode::Set.vendor().to_bytes(), [0xD1, 0x59, 0x00]);
        assert_eq!(Opcode::Status.vendor().to_bytes(), [0xD4, 0x59, 0x00]);
    }

    #[test]
    fn test_vendor_opcode_decode() {
        let decoded = VendorOpcode::from_bytes(&[0xD2, 0x59, 0x00, 0xFF]).unwrap();
        assert_eq!(decoded, Opcode::Get.vendor());
        assert_eq!(decoded.model_opcode().unwrap(), Opcode::Get);
    }

    #[test]
    fn test_sig_opcode_rejected() {
        // 0x82 0x01 is a two-byte SIG opcode
        assert_eq!(
            VendorOpcode::from_bytes(&[0x82, 0x01, 0x00]),
            Err(ModelError::UnknownOpcode(0x82))
        );
    }

    #[test]
    fn test_truncated_opcode() {
        assert!(matches!(
            VendorOpcode::from_bytes(&[0xD1, 0x59]),
            Err(ModelError::MalformedPayload { length: 2, .. })
        ));
    }

    #[test]
    fn test_foreign_company_not_a_model_opcode() {
        let foreign = VendorOpcode::new(0xD1, 0x004C);
        assert_eq!(foreign.model_opcode(), Err(ModelError::UnknownOpcode(0xD1)));
    }

    #[test]
    fn test_unknown_opcode_byte() {
        assert_eq!(Opcode::try_from(0xD5), Err(ModelError::UnknownOpcode(0xD5)));
        for op in Opcode::ALL {
            assert_eq!(Opcode::try_from(op.as_u8()).unwrap(), op);
        }
    }
}
