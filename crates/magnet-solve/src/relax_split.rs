// ─────────────────────────────────────────────────────────────────────
// SCPN Magnet Core — Relax-and-Split Orchestrator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Relax-and-split solver for sparsity-regularized dipole optimization.
//!
//! Alternates the MwPGP convex step (feasibility) with a proximal step on
//! a split copy of the variable (sparsity). The relaxed iterate `m` and
//! the split iterate `m_proxy` are two owned arrays with an explicit
//! conversion (the prox) between them. Without a nonconvex term the
//! problem is fully convex and collapses to a single MwPGP solve.

use magnet_math::linalg::ata_spectral_bound;
use magnet_math::prox::{project_l2_balls, prox_l0, prox_l1};
use magnet_types::config::{RelaxSplitConfig, REG_ZERO_ATOL};
use magnet_types::error::{MagnetError, MagnetResult};
use magnet_types::grid::DipoleGrid;
use magnet_types::state::{RelaxSplitResult, RsTermination};
use ndarray::{Array1, Array2};
use tracing::{debug, info};

/// numpy.allclose tolerances, used for the initial-guess feasibility check.
const ALLCLOSE_RTOL: f64 = 1e-5;
const ALLCLOSE_ATOL: f64 = 1e-8;

#[derive(Debug, Clone, Copy)]
enum Regularizer {
    L0(f64),
    L1(f64),
}

impl Regularizer {
    fn select(cfg: &RelaxSplitConfig) -> Option<Regularizer> {
        if cfg.reg_l0.abs() > REG_ZERO_ATOL {
            Some(Regularizer::L0(cfg.reg_l0))
        } else if cfg.reg_l1.abs() > REG_ZERO_ATOL {
            Some(Regularizer::L1(cfg.reg_l1))
        } else {
            None
        }
    }

    fn apply(&self, m: &Array2<f64>, m_max: &Array1<f64>, nu: f64) -> Array2<f64> {
        match *self {
            Regularizer::L0(reg) => prox_l0(m, m_max, reg, nu),
            Regularizer::L1(reg) => prox_l1(m, m_max, reg, nu),
        }
    }
}

/// Validate (or default) the initial guess.
///
/// A supplied guess must already lie inside every site's L2 ball: it is
/// projected, and any site the projection moved beyond numerical
/// tolerance is reported as infeasible. No guess defaults to all zeros.
pub fn setup_initial_condition(
    grid: &DipoleGrid,
    m0: Option<&Array2<f64>>,
) -> MagnetResult<Array2<f64>> {
    let n = grid.ndipoles();
    let m0 = match m0 {
        None => return Ok(Array2::zeros((n, 3))),
        Some(m0) => m0,
    };
    if m0.dim() != (n, 3) {
        return Err(MagnetError::ShapeMismatch {
            context: "initial guess",
            expected: format!("({n}, 3)"),
            actual: format!("{:?}", m0.dim()),
        });
    }

    let repaired = project_l2_balls(m0, grid.m_max());
    for j in 0..n {
        for c in 0..3 {
            let a = m0[[j, c]];
            let b = repaired[[j, c]];
            if (a - b).abs() > ALLCLOSE_ATOL + ALLCLOSE_RTOL * b.abs() {
                let norm = (0..3).map(|k| m0[[j, k]] * m0[[j, k]]).sum::<f64>().sqrt();
                return Err(MagnetError::InvalidInitialGuess {
                    site: j,
                    norm,
                    bound: grid.m_max()[j],
                });
            }
        }
    }
    Ok(m0.clone())
}

/// Run relax-and-split on the grid.
///
/// With `reg_l0` or `reg_l1` active, alternates MwPGP (warm-started at
/// the current `m`, pulled toward `m_proxy`) with the matching proximal
/// operator, stopping early once `||m - m_proxy|| < epsilon_rs`. With
/// neither active, performs exactly one convex solve and returns
/// `m == m_proxy`.
pub fn relax_and_split(
    grid: &DipoleGrid,
    m0: Option<&Array2<f64>>,
    cfg: &RelaxSplitConfig,
) -> MagnetResult<RelaxSplitResult> {
    cfg.validate()?;
    let m0 = setup_initial_condition(grid, m0)?;
    let ata_scale = ata_spectral_bound(grid.influence());
    if ata_scale <= 0.0 {
        return Err(MagnetError::ConfigError(
            "influence operator has zero spectral norm".to_string(),
        ));
    }

    let reg = match Regularizer::select(cfg) {
        None => {
            let res = crate::mwpgp::solve_mwpgp(grid, &m0, &m0, cfg, ata_scale)?;
            return Ok(RelaxSplitResult {
                m_proxy: res.m.clone(),
                m: res.m,
                error_history: res.objective_history,
                m_history: res.m_history,
                m_proxy_history: Vec::new(),
                termination: RsTermination::SingleConvexSolve,
                iterations: 1,
            });
        }
        Some(reg) => reg,
    };

    let m_max = grid.m_max();
    let mut m = m0.clone();
    let mut m_proxy = reg.apply(&m0, m_max, cfg.nu);

    let mut error_history = Vec::with_capacity(cfg.max_iter_rs);
    let mut m_history = Vec::with_capacity(cfg.max_iter_rs);
    let mut m_proxy_history = Vec::with_capacity(cfg.max_iter_rs);
    let mut termination = RsTermination::MaxIterReached;
    let mut iterations = 0usize;

    for outer in 0..cfg.max_iter_rs {
        iterations = outer + 1;

        let res = crate::mwpgp::solve_mwpgp(grid, &m, &m_proxy, cfg, ata_scale)?;
        m = res.m;
        if let Some(&err) = res.objective_history.last() {
            error_history.push(err);
        }
        m_history.push(m.clone());

        m_proxy = reg.apply(&m, m_max, cfg.nu);
        m_proxy_history.push(m_proxy.clone());

        let split_gap = m
            .iter()
            .zip(m_proxy.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        debug!(outer, split_gap, "relax-and-split outer iteration");

        if split_gap < cfg.epsilon_rs {
            info!(outer, "relax-and-split finished early");
            termination = RsTermination::Converged;
            break;
        }
    }

    Ok(RelaxSplitResult {
        m,
        m_proxy,
        error_history,
        m_history,
        m_proxy_history,
        termination,
        iterations,
    })
}
