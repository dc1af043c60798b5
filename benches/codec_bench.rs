//! Performance benchmarks for RelayCodec.
//!
//! These benchmarks measure encode/decode cost for the envelope shapes that
//! dominate a relay session: short APDU exchanges and the capability
//! descriptor reply.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use bytes::BytesMut;
use cardbridge_core::{Advertisement, MacAddress};
use cardbridge_protocol::{Envelope, EnvelopeMeta, Message, Payload, RelayCodec, RelayInfo};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

/// SELECT by AID, the most common first APDU of a session.
fn create_select_envelope() -> Envelope {
    Envelope::new(
        EnvelopeMeta::new("bench-relay"),
        Message::Payload(Payload::exchange(vec![
            0x00, 0xA4, 0x04, 0x00, 0x07, 0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10, 0x00,
        ])),
    )
}

/// Capability descriptor reply.
fn create_relay_info_envelope() -> Envelope {
    let found = Advertisement::new(
        MacAddress::new([0xD4, 0x01, 0x02, 0x03, 0x04, 0x05]),
        "ACR1555U-J1",
        -58,
    );
    let info = RelayInfo::for_reader(
        vec![0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C, 0xA0, 0x00],
        "ACR1555U PICC Interface",
        &found,
    );
    Envelope::new(EnvelopeMeta::new("bench-relay"), Message::RelayInfo(info))
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    for (name, envelope) in [
        ("select_apdu", create_select_envelope()),
        ("relay_info", create_relay_info_envelope()),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut codec = RelayCodec::new();
                let mut buffer = BytesMut::new();
                codec.encode(black_box(envelope.clone()), &mut buffer).unwrap();
                black_box(buffer);
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));

    for (name, envelope) in [
        ("select_apdu", create_select_envelope()),
        ("relay_info", create_relay_info_envelope()),
    ] {
        let mut codec = RelayCodec::new();
        let mut encoded = BytesMut::new();
        codec.encode(envelope, &mut encoded).unwrap();
        let encoded_bytes = encoded.freeze();

        group.bench_function(name, |b| {
            b.iter(|| {
                let mut codec = RelayCodec::new();
                let mut buffer = BytesMut::from(&encoded_bytes[..]);
                black_box(codec.decode(&mut buffer).unwrap());
            });
        });
    }

    group.finish();
}

/// Extended APDUs of growing size.
fn bench_payload_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload_sizes");

    for size in [16usize, 256, 4096] {
        group.throughput(Throughput::Bytes(size as u64));

        let envelope = Envelope::new(
            EnvelopeMeta::new("bench-relay"),
            Message::Payload(Payload::exchange(vec![0x5A; size])),
        );

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut codec = RelayCodec::new();
                let mut buffer = BytesMut::new();
                codec.encode(black_box(envelope.clone()), &mut buffer).unwrap();
                black_box(codec.decode(&mut buffer).unwrap());
            });
        });
    }

    group.finish();
}

/// Frame delivered in small TCP-sized chunks into one accumulating buffer.
fn bench_decode_partial_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_partial_streaming");
    group.throughput(Throughput::Elements(1));

    let mut encoder = RelayCodec::new();
    let mut buffer = BytesMut::new();
    encoder.encode(create_relay_info_envelope(), &mut buffer).unwrap();
    let full_frame = buffer.freeze();

    for chunk_size in [8usize, 32, 128] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("chunk_{chunk_size}_bytes")),
            &chunk_size,
            |b, &size| {
                b.iter(|| {
                    let mut codec = RelayCodec::new();
                    let mut buf = BytesMut::new();
                    let mut result = None;

                    for chunk in full_frame.chunks(size) {
                        buf.extend_from_slice(chunk);
                        if let Ok(Some(envelope)) = codec.decode(&mut buf) {
                            result = Some(envelope);
                            break;
                        }
                    }

                    black_box(result);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_payload_sizes,
    bench_decode_partial_streaming,
);

criterion_main!(benches);
