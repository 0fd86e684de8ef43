//! Least squares solvers used by the IRLS loop.
//!
//! Every IRLS step is a weighted least squares problem:
//!
//! ```text
//! minimize Σ w_i (z_i - x_i^T β)^2  (+ λ Σ_{j ∈ P} β_j^2)
//! ```
//!
//! - Rows are scaled by `sqrt(w_i)` and the problem is solved as ordinary
//!   least squares through an SVD, which copes with tall design matrices.
//! - The ridge term is folded in by appending one row `sqrt(λ) e_j` (with a
//!   zero target) per penalised coefficient.

use nalgebra::{DMatrix, DVector};

/// Solve `min ||x β - y||²` using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Loosen the singular-value cutoff step by step before giving up.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Weighted (and optionally ridge-penalised) least squares.
///
/// `penalized` lists the column indices that carry the `ridge` penalty.
pub fn solve_weighted_least_squares(
    x: &DMatrix<f64>,
    z: &DVector<f64>,
    w: &DVector<f64>,
    ridge: f64,
    penalized: &[usize],
) -> Option<DVector<f64>> {
    let n = x.nrows();
    let p = x.ncols();
    let extra = if ridge > 0.0 { penalized.len() } else { 0 };

    let mut xs = DMatrix::<f64>::zeros(n + extra, p);
    let mut zs = DVector::<f64>::zeros(n + extra);
    for i in 0..n {
        let sw = w[i].max(0.0).sqrt();
        for j in 0..p {
            xs[(i, j)] = x[(i, j)] * sw;
        }
        zs[i] = z[i] * sw;
    }
    if extra > 0 {
        let s = ridge.sqrt();
        for (k, &j) in penalized.iter().enumerate() {
            xs[(n + k, j)] = s;
        }
    }

    solve_least_squares(&xs, &zs)
}

/// `XᵀWX (+ λ on the penalised diagonal)`, the curvature of the objective.
pub fn weighted_gram(x: &DMatrix<f64>, w: &DVector<f64>, ridge: f64, penalized: &[usize]) -> DMatrix<f64> {
    let p = x.ncols();
    let mut gram = DMatrix::<f64>::zeros(p, p);
    for i in 0..x.nrows() {
        for a in 0..p {
            let xa = x[(i, a)] * w[i];
            if xa == 0.0 {
                continue;
            }
            for b in 0..p {
                gram[(a, b)] += xa * x[(i, b)];
            }
        }
    }
    if ridge > 0.0 {
        for &j in penalized {
            gram[(j, j)] += ridge;
        }
    }
    gram
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn zero_weight_rows_are_ignored() {
        // The third row is an outlier with zero weight.
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let z = DVector::from_row_slice(&[1.0, 3.0, 100.0]);
        let w = DVector::from_row_slice(&[1.0, 1.0, 0.0]);

        let beta = solve_weighted_least_squares(&x, &z, &w, 0.0, &[]).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-9);
        assert!((beta[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ridge_shrinks_penalised_coefficient() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let z = DVector::from_row_slice(&[0.0, 2.0, 4.0, 6.0]);
        let w = DVector::from_element(4, 1.0);

        let plain = solve_weighted_least_squares(&x, &z, &w, 0.0, &[1]).unwrap();
        let ridge = solve_weighted_least_squares(&x, &z, &w, 5.0, &[1]).unwrap();
        assert!((plain[1] - 2.0).abs() < 1e-9);
        assert!(ridge[1] < plain[1]);
        assert!(ridge[1] > 0.0);
    }

    #[test]
    fn gram_matches_manual_product() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 1.0, 3.0]);
        let w = DVector::from_row_slice(&[0.5, 2.0]);
        let g = weighted_gram(&x, &w, 1.0, &[1]);
        assert!((g[(0, 0)] - 2.5).abs() < 1e-12);
        assert!((g[(0, 1)] - 7.0).abs() < 1e-12);
        assert!((g[(1, 1)] - (2.0 + 18.0 + 1.0)).abs() < 1e-12);
    }
}
