// ─────────────────────────────────────────────────────────────────────
// SCPN Magnet Core — Dipole Grid
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Objective model for dipole placement: the influence operator `A`
//! (field response per unit moment component), the target vector `b`,
//! and the per-site magnitude bounds. Read-only for the lifetime of a
//! solver run; moments are always carried as an explicit `(N, 3)` array,
//! one row per site, never as a flattened `3N` vector.

use ndarray::{Array1, Array2, Array3};
use rayon::prelude::*;

use crate::error::{MagnetError, MagnetResult};

/// Basis in which each site's moment components are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateSystem {
    #[default]
    Cartesian,
    Cylindrical,
    Toroidal,
}

/// Immutable dipole-placement problem: residual is `A·m - b`, with
/// per-site moment bound `|m_j| <= m_max[j]`.
#[derive(Debug, Clone)]
pub struct DipoleGrid {
    /// `A`, shape (F, 3N). Column `3j + c` is the field response of unit
    /// moment component `c` at site `j`.
    influence: Array2<f64>,
    /// `b`, length F.
    target: Array1<f64>,
    /// Per-site moment bound, length N, all positive.
    m_max: Array1<f64>,
    /// Surface-normal magnitudes per field sample, length F, all positive.
    /// Convert residual entries back into normal-field units.
    normal_norms: Array1<f64>,
    /// Site coordinates (N, 3), needed by adjacency-aware GPMO variants.
    positions: Option<Array2<f64>>,
    /// Admissible unit polarization directions (N, P, 3), needed by the
    /// arbitrary-vector GPMO variants.
    pol_vectors: Option<Array3<f64>>,
    coords: CoordinateSystem,
}

impl DipoleGrid {
    pub fn new(
        influence: Array2<f64>,
        target: Array1<f64>,
        m_max: Array1<f64>,
        normal_norms: Array1<f64>,
        coords: CoordinateSystem,
    ) -> MagnetResult<Self> {
        let (nf, ncols) = influence.dim();
        if ncols == 0 || ncols % 3 != 0 {
            return Err(MagnetError::ShapeMismatch {
                context: "influence matrix columns",
                expected: "a positive multiple of 3".to_string(),
                actual: format!("{ncols}"),
            });
        }
        if target.len() != nf {
            return Err(MagnetError::ShapeMismatch {
                context: "target vector",
                expected: format!("{nf}"),
                actual: format!("{}", target.len()),
            });
        }
        if normal_norms.len() != nf {
            return Err(MagnetError::ShapeMismatch {
                context: "normal_norms vector",
                expected: format!("{nf}"),
                actual: format!("{}", normal_norms.len()),
            });
        }
        if m_max.len() != ncols / 3 {
            return Err(MagnetError::ShapeMismatch {
                context: "m_max vector",
                expected: format!("{}", ncols / 3),
                actual: format!("{}", m_max.len()),
            });
        }
        for (j, &b) in m_max.iter().enumerate() {
            if !b.is_finite() || b <= 0.0 {
                return Err(MagnetError::ConfigError(format!(
                    "m_max must be finite and > 0 at every site: m_max[{j}] = {b}"
                )));
            }
        }
        for (i, &n) in normal_norms.iter().enumerate() {
            if !n.is_finite() || n <= 0.0 {
                return Err(MagnetError::ConfigError(format!(
                    "normal_norms must be finite and > 0 everywhere: normal_norms[{i}] = {n}"
                )));
            }
        }

        Ok(DipoleGrid {
            influence,
            target,
            m_max,
            normal_norms,
            positions: None,
            pol_vectors: None,
            coords,
        })
    }

    /// Attach site coordinates, required by the multi and backtracking
    /// GPMO variants.
    pub fn with_positions(mut self, positions: Array2<f64>) -> MagnetResult<Self> {
        let n = self.ndipoles();
        if positions.dim() != (n, 3) {
            return Err(MagnetError::ShapeMismatch {
                context: "site positions",
                expected: format!("({n}, 3)"),
                actual: format!("{:?}", positions.dim()),
            });
        }
        self.positions = Some(positions);
        Ok(self)
    }

    /// Attach per-site admissible polarization directions, required by the
    /// ArbVec GPMO variants. Every vector must have unit norm.
    pub fn with_pol_vectors(mut self, pol_vectors: Array3<f64>) -> MagnetResult<Self> {
        let n = self.ndipoles();
        let (np, p, three) = pol_vectors.dim();
        if np != n || three != 3 || p == 0 {
            return Err(MagnetError::ShapeMismatch {
                context: "polarization vectors",
                expected: format!("({n}, P >= 1, 3)"),
                actual: format!("{:?}", pol_vectors.dim()),
            });
        }
        for j in 0..n {
            for l in 0..p {
                let v = pol_vectors.slice(ndarray::s![j, l, ..]);
                let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
                if !norm.is_finite() || (norm - 1.0).abs() > 1e-6 {
                    return Err(MagnetError::ConfigError(format!(
                        "polarization vectors must be unit norm: |pol[{j}][{l}]| = {norm}"
                    )));
                }
            }
        }
        self.pol_vectors = Some(pol_vectors);
        Ok(self)
    }

    pub fn ndipoles(&self) -> usize {
        self.m_max.len()
    }

    pub fn nfield(&self) -> usize {
        self.target.len()
    }

    pub fn influence(&self) -> &Array2<f64> {
        &self.influence
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    pub fn m_max(&self) -> &Array1<f64> {
        &self.m_max
    }

    pub fn normal_norms(&self) -> &Array1<f64> {
        &self.normal_norms
    }

    pub fn positions(&self) -> Option<&Array2<f64>> {
        self.positions.as_ref()
    }

    pub fn pol_vectors(&self) -> Option<&Array3<f64>> {
        self.pol_vectors.as_ref()
    }

    pub fn coords(&self) -> CoordinateSystem {
        self.coords
    }

    /// `A·m` for a moment array of shape (N, 3).
    pub fn a_dot_m(&self, m: &Array2<f64>) -> Array1<f64> {
        debug_assert_eq!(m.dim(), (self.ndipoles(), 3));
        let flat = Array1::from_iter(m.iter().copied());
        let mut out = vec![0.0; self.nfield()];
        out.par_iter_mut().enumerate().for_each(|(i, o)| {
            *o = self.influence.row(i).dot(&flat);
        });
        Array1::from_vec(out)
    }

    /// `A·m - b`.
    pub fn residual(&self, m: &Array2<f64>) -> Array1<f64> {
        self.a_dot_m(m) - &self.target
    }

    /// `Aᵀ·r`, reshaped to one 3-vector per site.
    pub fn at_dot_r(&self, r: &Array1<f64>) -> Array2<f64> {
        debug_assert_eq!(r.len(), self.nfield());
        let n = self.ndipoles();
        let rows: Vec<[f64; 3]> = (0..n)
            .into_par_iter()
            .map(|j| {
                let mut e = [0.0; 3];
                for (c, ec) in e.iter_mut().enumerate() {
                    *ec = self.influence.column(3 * j + c).dot(r);
                }
                e
            })
            .collect();
        let mut out = Array2::zeros((n, 3));
        for (j, e) in rows.iter().enumerate() {
            for c in 0..3 {
                out[[j, c]] = e[c];
            }
        }
        out
    }

    /// Mean |B·n| over the field samples for residual `r`, de-weighting
    /// each least-squares entry by its surface-normal magnitude.
    pub fn mean_field_error(&self, r: &Array1<f64>) -> f64 {
        debug_assert_eq!(r.len(), self.nfield());
        let total: f64 = r
            .iter()
            .zip(self.normal_norms.iter())
            .map(|(ri, ni)| ri.abs() / ni)
            .sum();
        total / self.nfield() as f64
    }
}
