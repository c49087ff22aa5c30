use core::{convert::Infallible, hint::black_box, time::Duration};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::runtime::Builder;
use uidpool::{FnSource, MemoryStore, Pool, PoolConfig, TokioYield};

fn counter_source(batch: i64) -> FnSource<impl Fn() -> Result<Vec<i64>, Infallible>> {
    let next = AtomicI64::new(0);
    FnSource::new(move || {
        let start = next.fetch_add(batch, Ordering::Relaxed);
        Ok((start..start + batch).collect())
    })
}

fn bench_consume(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let mut group = c.benchmark_group("consume");
    group.throughput(Throughput::Elements(1));

    for batch in [64_i64, 1024, 16_384] {
        let config = PoolConfig::builder(format!("bench:{batch}"))
            .threshold(batch as u64 / 4)
            .retry_times(16)
            .retry_sleep(Duration::from_micros(10))
            .build()
            .unwrap();
        let pool = Pool::new(config, MemoryStore::new(), counter_source(batch));

        group.bench_function(format!("memory/batch_{batch}"), |b| {
            b.to_async(&rt)
                .iter(|| async { black_box(pool.consume_with::<TokioYield>().await.unwrap()) });
        });
    }

    group.finish();
}

fn bench_maintain_skip(c: &mut Criterion) {
    let rt = Builder::new_current_thread().enable_all().build().unwrap();
    let config = PoolConfig::builder("bench:skip").threshold(0).build().unwrap();
    let pool = Pool::new(config, MemoryStore::new(), counter_source(1_000_000));
    rt.block_on(pool.maintainer().maintain()).unwrap();

    c.bench_function("maintain/above_threshold", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(pool.maintainer().maintain().await.unwrap()) });
    });
}

criterion_group!(benches, bench_consume, bench_maintain_skip);
criterion_main!(benches);
