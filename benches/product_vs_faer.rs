use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lazla::config::EvalOptions;
use lazla::core::classify::Layout;
use lazla::eval::Engine;
use lazla::matrix::{DenseMatrix, DenseVector, SparseMatrix};
use lazla::parallel::Workers;

fn bench_dense_product(c: &mut Criterion) {
    let n = 200;
    let a = DenseMatrix::from_fn(n, n, Layout::RowMajor, |i, j| ((i * n + j) as f64).sin());
    let b = DenseMatrix::from_fn(n, n, Layout::ColumnMajor, |i, j| ((i + 2 * j) as f64).cos());
    let mut out = DenseMatrix::zeros(n, n);

    c.bench_function("lazla dense A*B", |ben| {
        let engine = Engine::serial();
        ben.iter(|| {
            engine.assign(black_box(&mut out), a.expr().mul(black_box(&b)).unwrap()).unwrap();
        })
    });

    let workers = Workers::new().unwrap();
    let options = EvalOptions { parallel_threshold: 4096, max_blocks: 0 };
    c.bench_function("lazla dense A*B pooled", |ben| {
        let engine = Engine::with_pool(&workers, options);
        ben.iter(|| {
            engine.assign(black_box(&mut out), a.expr().mul(black_box(&b)).unwrap()).unwrap();
        })
    });

    let (fa, fb) = (a.to_faer(), b.to_faer());
    c.bench_function("faer dense A*B", |ben| {
        ben.iter(|| {
            let _ = black_box(&fa) * black_box(&fb);
        })
    });
}

fn bench_sparse_matvec(c: &mut Criterion) {
    let n = 20_000;
    let mut triplets = Vec::with_capacity(3 * n);
    for i in 0..n {
        triplets.push((i, i, 2.0));
        if i > 0 {
            triplets.push((i, i - 1, -1.0));
        }
        if i + 1 < n {
            triplets.push((i, i + 1, -1.0));
        }
    }
    let a = SparseMatrix::from_triplets(n, n, Layout::RowMajor, &triplets).unwrap();
    let x = DenseVector::from_fn(n, |i| (i as f64).sin());
    let b = DenseVector::from_fn(n, |i| (i as f64).cos());
    let mut r = DenseVector::zeros(n);

    c.bench_function("lazla sparse r = b - A x", |ben| {
        let engine = Engine::serial();
        ben.iter(|| {
            engine
                .assign(black_box(&mut r), b.expr().sub(a.expr().mul(black_box(&x)).unwrap()).unwrap())
                .unwrap();
        })
    });
}

criterion_group!(benches, bench_dense_product, bench_sparse_matvec);
criterion_main!(benches);
