//! Projected solvers on random systems, checked against faer's direct LU for
//! unconstrained problems and against the complementarity conditions for
//! bounded ones.

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use faer::linalg::solvers::SolveCore;
use lazla::config::{EvalOptions, SolverOptions};
use lazla::context::{SolverContext, SolverKind};
use lazla::core::classify::Layout;
use lazla::error::LaError;
use lazla::eval::Engine;
use lazla::matrix::{DenseMatrix, DenseVector, SparseMatrix};
use lazla::parallel::SerialPool;
use lazla::solver::{Bounds, CpgSolver, LinearSolver, PgsSolver, SweepFlags};
use lazla::utils::StopReason;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `A = Mᵀ M + n I` with random `M`, and a random right-hand side.
fn random_spd(seed: u64, n: usize) -> (DenseMatrix<f64>, DenseVector<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let m: Vec<f64> = (0..n * n).map(|_| rng.r#gen::<f64>() - 0.5).collect();
    let a = DenseMatrix::from_fn(n, n, Layout::RowMajor, |i, j| {
        let mtm: f64 = (0..n).map(|k| m[k * n + i] * m[k * n + j]).sum();
        if i == j { mtm + n as f64 } else { mtm }
    });
    let b = DenseVector::from_fn(n, |_| rng.r#gen::<f64>() * 2.0 - 1.0);
    (a, b)
}

/// 1D Laplacian `tridiag(-1, 2, -1)` in compressed row storage.
fn laplacian(n: usize) -> SparseMatrix<f64> {
    let mut triplets = Vec::new();
    for i in 0..n {
        triplets.push((i, i, 2.0));
        if i > 0 {
            triplets.push((i, i - 1, -1.0));
        }
        if i + 1 < n {
            triplets.push((i, i + 1, -1.0));
        }
    }
    SparseMatrix::from_triplets(n, n, Layout::RowMajor, &triplets).unwrap()
}

fn direct_solve(a: &DenseMatrix<f64>, b: &DenseVector<f64>) -> Vec<f64> {
    let n = b.len();
    let fa = a.to_faer();
    let mut x = b.as_slice().to_vec();
    let lu = faer::linalg::solvers::FullPivLu::new(fa.as_ref());
    let x_mat = faer::MatMut::from_column_major_slice_mut(&mut x, n, 1);
    lu.solve_in_place_with_conj(faer::Conj::No, x_mat);
    x
}

/// `w = A x - b`; checks `x >= 0`, `w >= 0` and `x_i w_i = 0` up to `eps`.
fn assert_complementary(a: &DenseMatrix<f64>, b: &DenseVector<f64>, x: &DenseVector<f64>, eps: f64) {
    for i in 0..x.len() {
        let w: f64 = (0..x.len()).map(|j| a[(i, j)] * x[j]).sum::<f64>() - b[i];
        assert!(x[i] >= 0.0, "x[{i}] = {} is negative", x[i]);
        assert!(w >= -eps, "w[{i}] = {w} is negative");
        assert!((x[i] * w).abs() <= eps, "x[{i}] w[{i}] = {}", x[i] * w);
    }
}

#[test]
fn pgs_matches_direct_lu_without_bounds() {
    let (a, b) = random_spd(41, 8);
    let want = direct_solve(&a, &b);
    let mut x = DenseVector::zeros(8);
    let mut solver = PgsSolver::new(1e-12, 2000);
    let stats = solver.solve(&a, &b, &mut x).unwrap();
    assert!(stats.converged);
    assert_eq!(stats.reason, StopReason::Converged);
    for i in 0..8 {
        assert_abs_diff_eq!(x[i], want[i], epsilon = 1e-9);
    }
}

#[test]
fn cpg_matches_direct_lu_without_bounds() {
    let (a, b) = random_spd(42, 10);
    let want = direct_solve(&a, &b);
    let mut x = DenseVector::zeros(10);
    let mut solver = CpgSolver::new(1e-12, 100);
    let stats = solver.solve(&a, &b, &mut x).unwrap();
    assert!(stats.converged);
    assert!(stats.iterations <= 20, "took {} iterations", stats.iterations);
    for i in 0..10 {
        assert_abs_diff_eq!(x[i], want[i], epsilon = 1e-9);
    }
}

#[test]
fn both_solvers_solve_the_same_complementarity_problem() {
    let (a, b) = random_spd(43, 12);
    let mut x_pgs = DenseVector::zeros(12);
    let mut x_cpg = DenseVector::zeros(12);
    let mut pgs = PgsSolver::new(1e-13, 5000)
        .with_bounds(Bounds::nonnegative(12))
        .with_sweep(SweepFlags::SYMMETRIC);
    let mut cpg = CpgSolver::new(1e-13, 500).with_bounds(Bounds::nonnegative(12));
    assert!(pgs.solve(&a, &b, &mut x_pgs).unwrap().converged);
    assert!(cpg.solve(&a, &b, &mut x_cpg).unwrap().converged);
    assert_complementary(&a, &b, &x_pgs, 1e-9);
    assert_complementary(&a, &b, &x_cpg, 1e-9);
    for i in 0..12 {
        assert_abs_diff_eq!(x_pgs[i], x_cpg[i], epsilon = 1e-8);
    }
}

#[test]
fn obstacle_problem_on_a_sparse_laplacian() {
    // -u'' = f with u <= 0.05 acting as a ceiling
    let n = 30;
    let a = laplacian(n);
    let b = DenseVector::from_vec(vec![0.01; n]);
    let bounds = Bounds::uniform(n, f64::NEG_INFINITY, 0.05).unwrap();
    let pool = SerialPool;
    let engine = Engine::with_pool(&pool, EvalOptions { parallel_threshold: 8, max_blocks: 3 });
    let mut x = DenseVector::zeros(n);
    let mut solver = CpgSolver::new(1e-12, 1000).with_bounds(bounds.clone()).with_engine(engine);
    let stats = solver.solve(&a, &b, &mut x).unwrap();
    assert!(stats.converged);
    let touching = (0..n).filter(|&i| x[i] == 0.05).count();
    assert!(touching > 0 && touching < n);
    for i in 0..n {
        assert!(x[i] <= 0.05);
        // free components satisfy the equation
        if x[i] < 0.05 {
            let ax = 2.0 * x[i] - if i > 0 { x[i - 1] } else { 0.0 } - if i + 1 < n { x[i + 1] } else { 0.0 };
            assert_abs_diff_eq!(ax, 0.01, epsilon = 1e-9);
        }
    }

    let mut y = DenseVector::zeros(n);
    let mut pgs = PgsSolver::new(1e-12, 20_000).with_bounds(bounds).with_omega(1.8);
    assert!(pgs.solve(&a, &b, &mut y).unwrap().converged);
    for i in 0..n {
        assert_abs_diff_eq!(x[i], y[i], epsilon = 1e-7);
    }
}

#[test]
fn monitor_sees_every_residual() {
    let (a, b) = random_spd(44, 6);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut solver = PgsSolver::new(1e-10, 500).with_monitor(move |it, res| sink.borrow_mut().push((it, res)));
    let mut x = DenseVector::zeros(6);
    let stats = solver.solve(&a, &b, &mut x).unwrap();
    let seen = seen.borrow();
    assert_eq!(seen.len(), stats.iterations + 1);
    assert_eq!(seen.len(), solver.residual_history.len());
    assert_eq!(seen.last().map(|&(it, _)| it), Some(stats.iterations));
    solver.clear_history();
    assert!(solver.residual_history.is_empty());
}

#[test]
fn context_built_from_arguments() {
    let (a, b) = random_spd(45, 9);
    let sparse = SparseMatrix::from_dense(&a, Layout::ColumnMajor);
    let bounds = Bounds::uniform(9, -0.05, 0.05).unwrap();
    let mut results = Vec::new();
    for args in [
        ["-solver_type", "pgs", "-sweep", "symmetric", "-omega", "1.2", "-tol", "1e-13"],
        ["-solver_type", "cpg", "-max_it", "400", "-tol", "1e-13", "-omega", "1.0"],
    ] {
        let opts = SolverOptions::from_args(args).unwrap();
        let ctx = SolverContext::new(opts).with_bounds(bounds.clone());
        let mut x = DenseVector::zeros(9);
        let stats = ctx.solve_context(&sparse, &b, &mut x).unwrap();
        assert!(stats.converged, "{:?} did not converge", ctx.kind());
        results.push(x);
    }
    assert_eq!(SolverOptions::from_args(["-solver_type", "cpg"]).unwrap().kind, SolverKind::Cpg);
    for i in 0..9 {
        assert!(results[0][i].abs() <= 0.05);
        assert_abs_diff_eq!(results[0][i], results[1][i], epsilon = 1e-8);
    }
}

#[test]
fn rejects_inconsistent_inputs() {
    let (a, b) = random_spd(46, 4);
    let mut x = DenseVector::zeros(3);
    let err = PgsSolver::new(1e-8, 10).solve(&a, &b, &mut x).unwrap_err();
    assert!(matches!(err, LaError::ShapeMismatch { op: "pgs", .. }));

    let rect = DenseMatrix::<f64>::zeros(4, 3);
    let mut x = DenseVector::zeros(4);
    let err = CpgSolver::new(1e-8, 10).solve(&rect, &b, &mut x).unwrap_err();
    assert!(matches!(err, LaError::CapabilityMismatch(_)));

    let mut solver = CpgSolver::new(1e-8, 10).with_bounds(Bounds::nonnegative(5));
    let err = solver.solve(&a, &b, &mut x).unwrap_err();
    assert!(matches!(err, LaError::InvalidBounds(_)));

    assert!(matches!(
        SolverOptions::from_args(["-omega", "2.5"]),
        Err(LaError::InvalidOption(_))
    ));
}
