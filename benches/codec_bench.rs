use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use mesh_generic_byte::core::message::{ByteMessage, SetRequest, StatusReply, Tid};
use mesh_generic_byte::core::opcode::Opcode;
use mesh_generic_byte::core::packet::AccessPdu;

#[allow(clippy::unwrap_used)]
fn bench_access_pdu(c: &mut Criterion) {
    let mut group = c.benchmark_group("access_pdu");
    let messages = vec![
        ByteMessage::Set(SetRequest {
            value: 42,
            tid: Tid(7),
        }),
        ByteMessage::Get,
        ByteMessage::Status(StatusReply { value: 100 }),
    ];

    group.bench_function("encode", |b| {
        b.iter_batched(
            || messages.clone(),
            |msgs| {
                for m in msgs {
                    let _ = AccessPdu::from_message(&m).to_bytes().unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });

    let frame: Bytes = AccessPdu::from_message(&messages[0]).to_bytes().unwrap();
    group.bench_function("decode", |b| {
        b.iter(|| {
            let pdu = AccessPdu::from_bytes(&frame).unwrap();
            let opcode = pdu.opcode.model_opcode().unwrap();
            let _ = ByteMessage::decode(opcode, &pdu.payload).unwrap();
        })
    });

    group.bench_function("decode_status", |b| {
        let payload = [55u8];
        b.iter(|| ByteMessage::decode(Opcode::Status, &payload).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_access_pdu);
criterion_main!(benches);
