//! Throughput of charges under same-user and distinct-user contention

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use point_ledger::{Config, PointLedger};
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const OPS_PER_THREAD: usize = 100;

fn run_charges(ledger: &Arc<PointLedger>, user_for_thread: impl Fn(usize) -> i64) {
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let ledger = Arc::clone(ledger);
            let user = user_for_thread(t);
            thread::spawn(move || {
                for _ in 0..OPS_PER_THREAD {
                    // Ceiling rejections are fine here; only lock traffic matters
                    let _ = ledger.charge(user, 1_000);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("charge_contention");
    group.throughput(Throughput::Elements((THREADS * OPS_PER_THREAD) as u64));

    group.bench_function(BenchmarkId::new("same_user", THREADS), |b| {
        b.iter(|| {
            let ledger = Arc::new(PointLedger::in_memory(&Config::default()).unwrap());
            run_charges(&ledger, |_| 1);
        })
    });

    group.bench_function(BenchmarkId::new("distinct_users", THREADS), |b| {
        b.iter(|| {
            let ledger = Arc::new(PointLedger::in_memory(&Config::default()).unwrap());
            run_charges(&ledger, |t| t as i64 + 1);
        })
    });

    group.finish();
}

criterion_group!(benches, bench_contention);
criterion_main!(benches);
