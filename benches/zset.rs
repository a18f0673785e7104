use criterion::black_box;
use criterion::Bencher;
use criterion::Criterion;

use rand::seq::SliceRandom;

use zskip::ZSet;

fn shuffled(n: i64) -> Vec<i64> {
    let mut keys: Vec<i64> = (0..n).collect();
    keys.shuffle(&mut rand::thread_rng());
    keys
}

fn bench_add(b: &mut Bencher, size: i64) {
    let keys = shuffled(size);

    b.iter(|| {
        let mut set: ZSet<i64, i64> = ZSet::new();
        for &v in &keys {
            set.add(v, v);
        }
        black_box(set.card());
    });
}

fn bench_rank(b: &mut Bencher, size: i64) {
    let keys = shuffled(size);
    let mut set: ZSet<i64, i64> = ZSet::new();
    for &v in &keys {
        set.add(v, v);
    }

    b.iter(|| {
        for v in 0..size {
            black_box(set.rank(&v));
        }
    });
}

fn bench_range_by_score(b: &mut Bencher, size: i64) {
    let keys = shuffled(size);
    let mut set: ZSet<i64, i64> = ZSet::new();
    for &v in &keys {
        set.add(v, v);
    }

    b.iter(|| {
        black_box(set.range_by_score(&(size / 4), &(size / 2)));
    });
}

pub fn benchmark(c: &mut Criterion) {
    c.bench_function("zset_add_10000", |b| {
        bench_add(b, 10_000);
    });
    c.bench_function("zset_rank_10000", |b| {
        bench_rank(b, 10_000);
    });
    c.bench_function("zset_range_by_score_10000", |b| {
        bench_range_by_score(b, 10_000);
    });
}
