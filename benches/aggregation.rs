use criterion::{black_box, criterion_group, criterion_main, Criterion};
use statsview::{AggregationKind, Bounds};
use std::time::Instant;

fn benchmark_count(c: &mut Criterion) {
    c.bench_function("count_add_sample", |b| {
        let mut data = AggregationKind::Count.new_data();
        b.iter(|| data.add_sample(black_box(1.0)));
    });
}

fn benchmark_distribution(c: &mut Criterion) {
    let bounds = Bounds::new(vec![1.0, 5.0, 10.0, 50.0, 100.0]).expect("valid bounds");
    c.bench_function("distribution_add_sample", |b| {
        let mut data = AggregationKind::Distribution(bounds.clone()).new_data();
        let mut v = 0.0;
        b.iter(|| {
            v = (v + 1.0) % 120.0;
            data.add_sample(black_box(v));
        });
    });
}

fn benchmark_sliding_window(c: &mut Criterion) {
    use statsview::WindowAggregator;
    c.bench_function("sliding_window_add_and_collect", |b| {
        let now = Instant::now();
        let mut window =
            WindowAggregator::sliding_time(&AggregationKind::Count, std::time::Duration::from_secs(60), 6, now);
        b.iter(|| {
            window.add_sample(black_box(1.0), now);
            black_box(window.collect(now));
        });
    });
}

criterion_group!(benches, benchmark_count, benchmark_distribution, benchmark_sliding_window);
criterion_main!(benches);
