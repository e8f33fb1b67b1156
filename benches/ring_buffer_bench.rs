//! Criterion benchmark untuk Ring Buffer dan Port
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use twinport::core::RingBuffer;
use twinport::{Channel, Port, PortEvent, RunLoop};

fn bench_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");
    group.throughput(Throughput::Elements(1));

    group.bench_function("push", |b| {
        let mut rb: RingBuffer<u64, 65536> = RingBuffer::new();
        let mut i = 0u64;
        b.iter(|| {
            if let Err(v) = rb.try_push(black_box(i)) {
                rb.pop();
                let _ = rb.try_push(v);
            }
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("pop", |b| {
        let mut rb: RingBuffer<u64, 65536> = RingBuffer::new();
        for i in 0..32768 {
            let _ = rb.try_push(i);
        }
        b.iter(|| {
            if let Some(v) = rb.pop() {
                let _ = rb.try_push(black_box(v));
            }
        });
    });

    group.bench_function("push_pop_cycle", |b| {
        let mut rb: RingBuffer<u64, 65536> = RingBuffer::new();
        let mut i = 0u64;
        b.iter(|| {
            let _ = rb.try_push(black_box(i));
            black_box(rb.pop());
            i = i.wrapping_add(1);
        });
    });

    group.finish();
}

fn bench_port(c: &mut Criterion) {
    let mut group = c.benchmark_group("port");

    for batch_size in [1usize, 100, 1000] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_function(format!("write_read_{}", batch_size), |b| {
            let channel = Channel::new();
            let run_loop = RunLoop::new().expect("run loop");
            let tx = Port::init(&channel, &run_loop, |_: &Port, _: PortEvent| {}).expect("tx");
            let rx = Port::init(&channel, &run_loop, |_: &Port, _: PortEvent| {}).expect("rx");
            let payload = vec![0u8; 64];

            b.iter(|| {
                for _ in 0..batch_size {
                    let _ = tx.write(black_box(payload.as_slice()));
                }
                for _ in 0..batch_size {
                    black_box(rx.read());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_push_pop, bench_port);
criterion_main!(benches);
