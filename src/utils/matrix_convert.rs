//! Matrix conversion utilities between ndarray and nalgebra.
//!
//! Data flows through the crate as ndarray arrays; the dense linear algebra
//! (normal-equation solves, matrix exponentials) runs on nalgebra.

use crate::error::{KinOptError, Result};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Convert an ndarray matrix view to a nalgebra DMatrix.
pub fn ndarray_to_nalgebra(arr: ArrayView2<'_, f64>) -> DMatrix<f64> {
    // ndarray is row-major by default, nalgebra is column-major
    DMatrix::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert an ndarray vector view to a nalgebra DVector.
pub fn ndarray_vec_to_nalgebra(arr: ArrayView1<'_, f64>) -> DVector<f64> {
    DVector::from_iterator(arr.len(), arr.iter().copied())
}

/// Convert a nalgebra DVector to an ndarray Array1.
pub fn nalgebra_vec_to_ndarray(vec: &DVector<f64>) -> Array1<f64> {
    vec.iter().copied().collect()
}

/// Solve the symmetric positive definite system `a x = b`.
///
/// Tries a Cholesky factorization first and falls back to LU when the
/// matrix is not numerically positive definite.
pub fn solve_spd(a: ArrayView2<'_, f64>, b: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
    if a.nrows() != a.ncols() || a.nrows() != b.len() {
        return Err(KinOptError::DimensionMismatch(format!(
            "Cannot solve a {}x{} system with a right-hand side of length {}",
            a.nrows(),
            a.ncols(),
            b.len()
        )));
    }

    let a_na = ndarray_to_nalgebra(a);
    let b_na = ndarray_vec_to_nalgebra(b);

    if let Some(chol) = a_na.clone().cholesky() {
        return Ok(nalgebra_vec_to_ndarray(&chol.solve(&b_na)));
    }

    a_na.lu()
        .solve(&b_na)
        .map(|x| nalgebra_vec_to_ndarray(&x))
        .ok_or_else(|| KinOptError::OptimizationFailure("Singular linear system".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_ndarray_nalgebra_roundtrip() {
        let arr = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];

        let mat = ndarray_to_nalgebra(arr.view());
        assert_eq!(mat.nrows(), 2);
        assert_eq!(mat.ncols(), 3);
        assert_eq!(mat[(1, 0)], 4.0);
        assert_eq!(mat[(0, 2)], 3.0);

        let v = array![1.0, -2.0];
        let v_na = ndarray_vec_to_nalgebra(v.view());
        assert_eq!(nalgebra_vec_to_ndarray(&v_na), v);
    }

    #[test]
    fn test_solve_spd() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let b = array![1.0, 2.0];
        let x = solve_spd(a.view(), b.view()).unwrap();

        let check = a.dot(&x);
        assert_relative_eq!(check[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(check[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_indefinite_falls_back() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let b = array![2.0, 3.0];
        let x = solve_spd(a.view(), b.view()).unwrap();
        assert_relative_eq!(x[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_dimension_mismatch() {
        let a = array![[1.0, 0.0], [0.0, 1.0]];
        let b = array![1.0, 2.0, 3.0];
        assert!(solve_spd(a.view(), b.view()).is_err());
    }
}
