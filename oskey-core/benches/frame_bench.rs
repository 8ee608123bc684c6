use criterion::{black_box, criterion_group, criterion_main, Criterion};
use oskey_core::{constants::MAX_PAYLOAD, frame, Reassembler};

fn bench_encode(c: &mut Criterion) {
    let payload = vec![0xABu8; 1024];

    c.bench_function("frame_encode_1kb", |b| {
        b.iter(|| black_box(frame::encode(&payload).unwrap()));
    });
}

fn bench_decode(c: &mut Criterion) {
    let encoded = frame::encode(&vec![0xABu8; 1024]).unwrap();

    c.bench_function("frame_decode_1kb", |b| {
        b.iter(|| black_box(frame::try_decode_one(&encoded)));
    });
}

fn bench_reassemble_small_chunks(c: &mut Criterion) {
    let encoded = frame::encode(&vec![0xABu8; MAX_PAYLOAD]).unwrap();

    c.bench_function("reassemble_max_frame_64b_chunks", |b| {
        b.iter(|| {
            let mut reassembler = Reassembler::new();
            let mut frames = 0;
            for chunk in encoded.chunks(64) {
                frames += reassembler.feed(chunk).len();
            }
            black_box(frames)
        });
    });
}

fn bench_resync_noise(c: &mut Criterion) {
    let mut wire = vec![0x55u8; 256];
    wire.extend_from_slice(&frame::encode(&[0xABu8; 64]).unwrap());

    c.bench_function("reassemble_after_256b_noise", |b| {
        b.iter(|| black_box(Reassembler::new().feed(&wire)));
    });
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_reassemble_small_chunks,
    bench_resync_noise,
);
criterion_main!(benches);
