// ─────────────────────────────────────────────────────────────────────
// SCPN Magnet Core — Solver State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Result and history containers returned by the solvers. All moment
//! arrays are (N, 3), one dipole 3-vector per row.

use ndarray::Array2;

/// Outcome of one MwPGP bound-constrained convex solve.
#[derive(Debug, Clone)]
pub struct MwpgpResult {
    /// Final feasible iterate.
    pub m: Array2<f64>,
    /// Objective value per iteration.
    pub objective_history: Vec<f64>,
    /// Most recent iterate checkpoints, oldest first.
    pub m_history: Vec<Array2<f64>>,
    /// Whether the projected-gradient tolerance was met in budget.
    pub converged: bool,
    pub iterations: usize,
}

/// How a relax-and-split run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsTermination {
    /// ||m - m_proxy|| fell below epsilon_rs before the iteration budget.
    Converged,
    /// Outer iteration budget exhausted. Not an error; best iterates kept.
    MaxIterReached,
    /// No nonconvex term configured, so the problem collapsed to a single
    /// convex solve with m == m_proxy.
    SingleConvexSolve,
}

/// Outcome of a relax-and-split run.
#[derive(Debug, Clone)]
pub struct RelaxSplitResult {
    /// Final relaxed iterate (feasible).
    pub m: Array2<f64>,
    /// Final split (sparsified) iterate. Equals `m` when unregularized.
    pub m_proxy: Array2<f64>,
    /// Convex-step final objective per outer iteration.
    pub error_history: Vec<f64>,
    /// Relaxed iterate after each outer iteration.
    pub m_history: Vec<Array2<f64>>,
    /// Split iterate after each outer iteration.
    pub m_proxy_history: Vec<Array2<f64>>,
    pub termination: RsTermination,
    /// Outer iterations performed (1 for the unregularized collapse).
    pub iterations: usize,
}

/// Outcome of a GPMO greedy placement run.
#[derive(Debug, Clone)]
pub struct GpmoResult {
    /// Final binary moment assignment, pre-scaled by the per-site bound:
    /// each row is either zero or `m_max[j]` times a unit polarization.
    pub m: Array2<f64>,
    /// Squared-residual error at each checkpoint.
    pub r2_history: Vec<f64>,
    /// Mean |B·n| at each checkpoint.
    pub bn_history: Vec<f64>,
    /// Moment snapshot (pre-scaled) at each checkpoint.
    pub m_history: Vec<Array2<f64>>,
    /// Committed dipole count at each checkpoint. Dips below the running
    /// commit count when backtracking reverses placements.
    pub num_nonzeros_history: Vec<usize>,
    /// Total commit operations performed (clamped placement budget).
    pub placed: usize,
}
