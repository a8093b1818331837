//! Linear algebra utilities.
//!
//! Power-iteration spectral bound for the projected-gradient step size.

use ndarray::{Array1, Array2};

const POWER_MAX_ITER: usize = 100;
const POWER_REL_TOL: f64 = 1e-10;

/// Largest eigenvalue of `AᵀA` (the squared spectral norm of `A`),
/// estimated by power iteration on the composed operator `v ↦ Aᵀ(A v)`.
///
/// The iteration starts from a deterministic all-ones vector so repeated
/// calls on the same matrix return bit-identical values. Stops after a
/// fixed budget or when the Rayleigh quotient stabilizes.
pub fn ata_spectral_bound(a: &Array2<f64>) -> f64 {
    let (nrows, ncols) = a.dim();
    if nrows == 0 || ncols == 0 {
        return 0.0;
    }

    let mut v = Array1::from_elem(ncols, 1.0 / (ncols as f64).sqrt());
    let mut lambda = 0.0_f64;

    for _ in 0..POWER_MAX_ITER {
        let av = a.dot(&v);
        let atav = a.t().dot(&av);
        let norm = atav.dot(&atav).sqrt();
        if norm == 0.0 {
            return 0.0;
        }
        let next = atav.dot(&v); // Rayleigh quotient; v has unit norm
        v = atav / norm;
        if lambda > 0.0 && ((next - lambda) / lambda).abs() < POWER_REL_TOL {
            return next;
        }
        lambda = next;
    }
    lambda
}
