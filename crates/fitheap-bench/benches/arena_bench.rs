//! Criterion benchmarks for the arena allocator.
//!
//! Three groups: the allocate/deallocate round trip on an empty arena,
//! best-fit scans against chains of increasing length, and the read-only
//! introspection walks.

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};

use fitheap_core::{ArenaAllocator, HEADER_SIZE, render_layout};

/// An arena holding `holes` free blocks of 32 bytes, each fenced by an
/// allocated block so nothing coalesces, plus a 64-byte free tail.
fn fragmented_heap(holes: usize) -> ArenaAllocator {
    let arena_bytes = 2 * holes * (HEADER_SIZE + 32) + HEADER_SIZE + 64;
    let mut heap = ArenaAllocator::new(arena_bytes).expect("arena");
    let mut ptrs = Vec::with_capacity(2 * holes);
    for _ in 0..2 * holes {
        ptrs.push(heap.allocate(32).expect("fill"));
    }
    for ptr in ptrs.iter().step_by(2) {
        let outcome = heap.deallocate(*ptr).expect("carve hole");
        assert!(outcome.released());
    }
    heap.drain_lifecycle_events();
    heap
}

fn bench_alloc_free_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_free_cycle");
    for size in [16usize, 64, 256, 1024] {
        group.bench_with_input(BenchmarkId::new("fresh_arena", size), &size, |b, &sz| {
            b.iter_batched_ref(
                || ArenaAllocator::new(64 * 1024).expect("arena"),
                |heap| {
                    let ptr = heap.allocate(sz).expect("allocate");
                    let outcome = heap.deallocate(ptr).expect("deallocate");
                    criterion::black_box(outcome.released());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_best_fit_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("best_fit_scan");
    for holes in [8usize, 64, 256] {
        group.bench_with_input(BenchmarkId::new("chain", holes), &holes, |b, &n| {
            b.iter_batched_ref(
                || fragmented_heap(n),
                |heap| {
                    // Only the tail fits, so the scan visits every block.
                    let ptr = heap.allocate(40).expect("allocate");
                    let outcome = heap.deallocate(ptr).expect("deallocate");
                    criterion::black_box(outcome.released());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_introspection(c: &mut Criterion) {
    let mut group = c.benchmark_group("introspection");
    for holes in [8usize, 64, 256] {
        let heap = fragmented_heap(holes);
        group.bench_with_input(BenchmarkId::new("dump_layout", holes), &holes, |b, _| {
            b.iter(|| criterion::black_box(heap.dump_layout()));
        });
        group.bench_with_input(BenchmarkId::new("render_layout", holes), &holes, |b, _| {
            let records = heap.dump_layout();
            b.iter(|| criterion::black_box(render_layout(&records)));
        });
        group.bench_with_input(BenchmarkId::new("validate", holes), &holes, |b, _| {
            b.iter(|| criterion::black_box(heap.validate().expect("validate")));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_alloc_free_cycle,
    bench_best_fit_scan,
    bench_introspection
);
criterion_main!(benches);
