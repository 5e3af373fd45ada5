use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use gated_array::{SafeSimpleArray, SimpleArray, ThreadGate};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn bench_enter_exit_uncontended(c: &mut Criterion) {
    c.bench_function("gate::enter_exit_uncontended", |b| {
        let gate = ThreadGate::new(());
        b.iter(|| {
            let sentry = gate.enter();
            black_box(&sentry);
        })
    });
}

fn bench_enter_reentrant_depth4(c: &mut Criterion) {
    c.bench_function("gate::enter_reentrant_depth4", |b| {
        let gate = ThreadGate::new(());
        b.iter(|| {
            let a = gate.enter();
            let b2 = gate.enter();
            let c2 = gate.enter();
            let d = gate.enter();
            black_box((&a, &b2, &c2, &d));
        })
    });
}

fn bench_close_open_uncontended(c: &mut Criterion) {
    c.bench_function("gate::close_open_uncontended", |b| {
        let gate = ThreadGate::new(());
        b.iter(|| {
            let sentry = gate.close();
            black_box(&sentry);
        })
    });
}

fn bench_bar_raise_lower(c: &mut Criterion) {
    c.bench_function("gate::bar_raise_lower", |b| {
        let gate = ThreadGate::new(());
        b.iter(|| {
            let sentry = gate.bar_entry();
            black_box(&sentry);
        })
    });
}

fn bench_safe_read_1k(c: &mut Criterion) {
    c.bench_function("gate::safe_get_1k_on_10k", |b| {
        let safe = SafeSimpleArray::new(SimpleArray::new());
        for i in 0..10_000u64 {
            safe.set(i as i64, i);
        }
        let targets: Vec<i64> = lcg(13).take(1_000).map(|x| (x % 10_000) as i64).collect();
        b.iter(|| {
            for &i in &targets {
                black_box(safe.get(i));
            }
        })
    });
}

fn bench_safe_write_1k(c: &mut Criterion) {
    c.bench_function("gate::safe_set_1k", |b| {
        b.iter_batched(
            SafeSimpleArray::<u64>::default,
            |safe| {
                for x in lcg(17).take(1_000) {
                    safe.set((x % 4_096) as i64, x);
                }
                black_box(safe)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_safe_iter_10k(c: &mut Criterion) {
    c.bench_function("gate::safe_iter_all_10k", |b| {
        let safe = SafeSimpleArray::new(SimpleArray::new());
        for i in 0..10_000u64 {
            safe.set(i as i64, i);
        }
        b.iter(|| {
            let mut sum = 0u64;
            for (_, v) in safe.iter() {
                sum = sum.wrapping_add(v);
            }
            black_box(sum)
        })
    });
}

fn bench_contended_shared_4x1000(c: &mut Criterion) {
    c.bench_function("gate::contended_enter_4x1000", |b| {
        let gate = ThreadGate::new(());
        b.iter(|| {
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| {
                        for _ in 0..1_000 {
                            let sentry = gate.enter();
                            black_box(&sentry);
                        }
                    });
                }
            })
        })
    });
}

fn bench_contended_mixed_4x500(c: &mut Criterion) {
    c.bench_function("gate::contended_safe_mixed_4x500", |b| {
        let safe: SafeSimpleArray<u64> = SafeSimpleArray::default();
        for i in 0..1_024u64 {
            safe.set(i as i64, i);
        }
        b.iter(|| {
            std::thread::scope(|scope| {
                for worker in 0..4u64 {
                    let safe = &safe;
                    scope.spawn(move || {
                        for (step, x) in lcg(worker + 1).take(500).enumerate() {
                            let index = (x % 1_024) as i64;
                            if step % 4 == 0 {
                                safe.set(index, x);
                            } else {
                                black_box(safe.get(index));
                            }
                        }
                    });
                }
            })
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_gate;
    config = bench_config();
    targets = bench_enter_exit_uncontended,
              bench_enter_reentrant_depth4,
              bench_close_open_uncontended,
              bench_bar_raise_lower
}
criterion_group! {
    name = benches_safe;
    config = bench_config();
    targets = bench_safe_read_1k,
              bench_safe_write_1k,
              bench_safe_iter_10k,
              bench_contended_shared_4x1000,
              bench_contended_mixed_4x500
}
criterion_main!(benches_gate, benches_safe);
