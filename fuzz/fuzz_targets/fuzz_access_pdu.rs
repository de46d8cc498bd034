#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use mesh_generic_byte::core::message::ByteMessage;
use mesh_generic_byte::core::packet::AccessPdu;

fuzz_target!(|data: &[u8]| {
    // Frame parsing and payload decoding must never panic
    let frame = Bytes::copy_from_slice(data);
    if let Ok(pdu) = AccessPdu::from_bytes(&frame) {
        if let Ok(opcode) = pdu.opcode.model_opcode() {
            let _ = ByteMessage::decode(opcode, &pdu.payload);
        }
    }
});
