use core::hint::black_box;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pi_spigot::{Bbp, DigitEngine, PoolConfig, WorkerPool, compute_digits};
use tokio::runtime::Builder;

#[derive(Clone, Copy, Debug)]
struct RequestBenchParams {
    digits: u64,
    cycles: u64,
    workers: usize,
}

fn digit_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/digit_at");

    // Cost grows linearly with the position because of the head sum.
    for position in [0_u64, 64, 256, 4096] {
        group.bench_with_input(
            BenchmarkId::from_parameter(position),
            &position,
            |b, &position| b.iter(|| Bbp.digit_at(black_box(position)).unwrap()),
        );
    }

    group.finish();
}

fn request_bench(c: &mut Criterion) {
    let digits_cases = [64, 257];
    let cycles_cases = [1, 8, 64];
    let workers_cases = [1, 2, 4, 8];

    // Generate cartesian product of all param combinations
    let mut cases = Vec::new();
    for &digits in &digits_cases {
        for &cycles in &cycles_cases {
            for &workers in &workers_cases {
                cases.push(RequestBenchParams {
                    digits,
                    cycles,
                    workers,
                });
            }
        }
    }
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    for params in &cases {
        let pool = WorkerPool::new(PoolConfig::with_size(params.workers), Bbp).unwrap();

        let mut group = c.benchmark_group("scheduler/compute_digits");
        group.throughput(Throughput::Elements(params.digits));
        group.bench_function(
            format!(
                "digits/{}/cycles/{}/workers/{}",
                params.digits, params.cycles, params.workers
            ),
            |b| {
                b.to_async(&rt).iter(|| async {
                    black_box(
                        compute_digits(&pool, params.digits, params.cycles)
                            .await
                            .unwrap(),
                    )
                });
            },
        );
        group.finish();

        rt.block_on(pool.shutdown()).unwrap();
    }
}

criterion_group!(benches, digit_bench, request_bench);
criterion_main!(benches);
