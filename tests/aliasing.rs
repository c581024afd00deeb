//! Assignments whose destination also appears on the right-hand side.

use approx::assert_abs_diff_eq;
use lazla::core::classify::Layout;
use lazla::error::LaError;
use lazla::eval::{Engine, Strategy};
use lazla::expr::{IntoExpr, MatExpr, VecExpr};
use lazla::matrix::{DenseMatrix, DenseVector, SparseMatrix};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_system(seed: u64, n: usize) -> (DenseMatrix<f64>, DenseVector<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let a = DenseMatrix::from_fn(n, n, Layout::RowMajor, |_, _| rng.r#gen::<f64>() - 0.5);
    let x = DenseVector::from_fn(n, |_| rng.r#gen::<f64>() - 0.5);
    (a, x)
}

#[test]
fn product_into_its_own_operand_matches_two_step() {
    let (a, mut x) = random_system(31, 6);
    let mut y = DenseVector::zeros(6);
    Engine::serial().assign(&mut y, a.expr().mul(&x).unwrap()).unwrap();

    let e = a.expr().mul(x.alias()).unwrap();
    assert_eq!(Engine::serial().assign(&mut x, e).unwrap(), Strategy::Buffered);
    for i in 0..6 {
        assert_abs_diff_eq!(x[i], y[i], epsilon = 1e-15);
    }
}

#[test]
fn alias_both_in_place_and_under_product() {
    let (a, mut x) = random_system(32, 5);
    let before = x.clone();
    let e = a.expr().mul(x.alias()).unwrap().add(x.alias()).unwrap();
    assert_eq!(Engine::serial().assign(&mut x, e).unwrap(), Strategy::Buffered);
    for i in 0..5 {
        let ax: f64 = (0..5).map(|j| a[(i, j)] * before[j]).sum();
        assert_abs_diff_eq!(x[i], ax + before[i], epsilon = 1e-12);
    }
}

#[test]
fn in_place_scaling_stays_direct() {
    let (_, mut x) = random_system(33, 4);
    let before = x.clone();
    let d = DenseVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    let e = x.alias().scale(3.0).add(&d).unwrap();
    assert_eq!(Engine::serial().assign(&mut x, e).unwrap(), Strategy::Direct);
    for i in 0..4 {
        assert_abs_diff_eq!(x[i], 3.0 * before[i] + d[i], epsilon = 1e-15);
    }
}

#[test]
fn transposing_a_matrix_into_itself() {
    let mut a = DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    let e: MatExpr<'_, f64> = a.alias().into_expr();
    let e = e.transpose();
    assert_eq!(Engine::serial().assign(&mut a, e).unwrap(), Strategy::Buffered);
    assert_eq!(a, DenseMatrix::from_rows(&[vec![1.0, 3.0], vec![2.0, 4.0]]).unwrap());
}

#[test]
fn sparse_destination_reading_itself() {
    let mut s = SparseMatrix::from_triplets(3, 3, Layout::ColumnMajor, &[(0, 0, 1.0), (2, 1, -2.0)]).unwrap();
    let d = SparseMatrix::<f64>::identity(3);
    let e = s.alias().scale(2.0).add(&d).unwrap();
    assert_eq!(Engine::serial().assign(&mut s, e).unwrap(), Strategy::Buffered);
    assert_eq!(s.layout(), Layout::ColumnMajor);
    assert_eq!(s.nnz(), 4);
    assert_eq!(s.get(0, 0), 3.0);
    assert_eq!(s.get(1, 1), 1.0);
    assert_eq!(s.get(2, 1), -4.0);
    assert_eq!(s.get(2, 2), 1.0);
}

#[test]
fn row_vector_times_matrix_into_itself() {
    let a = DenseMatrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 1.0]]).unwrap();
    let mut x = DenseVector::row(vec![2.0, 5.0]);
    let e: VecExpr<'_, f64> = x.alias().into_expr();
    let e = e.mul(&a).unwrap();
    assert_eq!(Engine::serial().assign(&mut x, e).unwrap(), Strategy::Buffered);
    assert_eq!(x.layout(), Layout::ROW_VECTOR);
    assert_eq!(x.as_slice(), &[5.0, 7.0]);
}

#[test]
fn shape_mismatch_leaves_destination_untouched() {
    let a = DenseMatrix::<f64>::identity(4);
    let v = DenseVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    let mut x = DenseVector::from_vec(vec![7.0, 8.0, 9.0]);
    let err = Engine::serial().assign(&mut x, a.expr().mul(&v).unwrap()).unwrap_err();
    assert!(matches!(err, LaError::ShapeMismatch { op: "assign", .. }));
    assert_eq!(x.as_slice(), &[7.0, 8.0, 9.0]);
}

#[test]
fn foreign_alias_is_rejected() {
    let a = DenseMatrix::<f64>::identity(2);
    let y = DenseVector::from_vec(vec![1.0, 1.0]);
    let mut x = DenseVector::from_vec(vec![5.0, 6.0]);
    let e = a.expr().mul(y.alias()).unwrap();
    assert_eq!(Engine::serial().assign(&mut x, e).unwrap_err(), LaError::AliasMismatch);
    assert_eq!(x.as_slice(), &[5.0, 6.0]);
}

#[test]
fn alias_cannot_be_materialized_on_its_own() {
    let x = DenseVector::from_vec(vec![1.0, 2.0]);
    let e: VecExpr<'_, f64> = x.alias().into_expr();
    assert_eq!(e.eval().unwrap_err(), LaError::AliasMismatch);
}

#[test]
fn buffered_assignment_keeps_destination_padding() {
    let mut a = DenseMatrix::padded(3, 3, Layout::RowMajor, 4);
    for i in 0..3 {
        for j in 0..3 {
            a[(i, j)] = (3 * i + j) as f64;
        }
    }
    let e: MatExpr<'_, f64> = a.alias().into_expr();
    let e = e.transpose();
    assert_eq!(Engine::serial().assign(&mut a, e).unwrap(), Strategy::Buffered);
    assert_eq!(a.leading_dim(), 4);
    assert_eq!(a.alignment(), 4);
    assert_eq!(a[(0, 2)], 6.0);
    assert_eq!(a[(2, 0)], 2.0);
}
