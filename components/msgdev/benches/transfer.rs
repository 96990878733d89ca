//! Write/read round trip through the operation table

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use host_platform::mock::UserBuffer;
use msgdev::{SessionManager, MESSAGE_CAPACITY};

fn bench_round_trip(c: &mut Criterion) {
    let manager = SessionManager::new();
    let mut group = c.benchmark_group("round_trip");

    for len in [16usize, 64, MESSAGE_CAPACITY] {
        let src = UserBuffer::from_bytes(&vec![0x5A; len]);
        let mut dest = UserBuffer::with_capacity(MESSAGE_CAPACITY);

        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter(|| {
                manager.write(&src, len).unwrap();
                manager.read(&mut dest, MESSAGE_CAPACITY).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_rejected_write(c: &mut Criterion) {
    let manager = SessionManager::new();
    let src = UserBuffer::from_bytes(&[0u8; MESSAGE_CAPACITY + 1]);

    c.bench_function("write_too_large", |b| {
        b.iter(|| manager.write(&src, MESSAGE_CAPACITY + 1).is_err())
    });
}

criterion_group!(benches, bench_round_trip, bench_rejected_write);
criterion_main!(benches);
