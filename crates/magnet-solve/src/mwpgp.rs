// ─────────────────────────────────────────────────────────────────────
// SCPN Magnet Core — MwPGP Convex Solver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Bound-constrained convex quadratic solver: projected gradient with an
//! active/free site partition and exact line search, capped by the
//! Lipschitz stability limit `2/‖AᵀA‖·(1 − ε)`.
//!
//! Minimizes `0.5||A m - b||² + reg_l2 ||m||² + (1/2ν)||m - m_proxy||²`
//! subject to `|m_j| <= m_max[j]` per site. The proxy term is the pull
//! toward the sparsified split variable during relax-and-split; with the
//! default `ν = 1e100` it vanishes numerically and the solver reduces to
//! plain bound-constrained least squares.

use std::collections::VecDeque;

use magnet_math::prox::project_l2_balls;
use magnet_types::config::RelaxSplitConfig;
use magnet_types::error::{MagnetError, MagnetResult};
use magnet_types::grid::DipoleGrid;
use magnet_types::state::MwpgpResult;
use ndarray::Array2;
use tracing::debug;

/// Safety margin below the exact `2/L` stability limit.
const ALPHA_MARGIN: f64 = 1e-5;

/// Relative slack for the at-bound test of the active-set partition.
const BOUND_SLACK: f64 = 1e-12;

fn check_moment_shape(
    m: &Array2<f64>,
    n: usize,
    context: &'static str,
) -> MagnetResult<()> {
    if m.dim() != (n, 3) {
        return Err(MagnetError::ShapeMismatch {
            context,
            expected: format!("({n}, 3)"),
            actual: format!("{:?}", m.dim()),
        });
    }
    Ok(())
}

/// One MwPGP solve. `ata_scale` is the largest eigenvalue of `AᵀA`
/// (see [`magnet_math::linalg::ata_spectral_bound`]); callers running
/// several solves on the same grid compute it once and pass it in.
///
/// Non-convergence within `max_iter_convex` is not an error: the best
/// iterate found is returned with `converged = false`.
pub fn solve_mwpgp(
    grid: &DipoleGrid,
    m0: &Array2<f64>,
    m_proxy: &Array2<f64>,
    cfg: &RelaxSplitConfig,
    ata_scale: f64,
) -> MagnetResult<MwpgpResult> {
    cfg.validate()?;
    let n = grid.ndipoles();
    check_moment_shape(m0, n, "warm-start moments")?;
    check_moment_shape(m_proxy, n, "proxy moments")?;
    if !ata_scale.is_finite() || ata_scale <= 0.0 {
        return Err(MagnetError::ConfigError(format!(
            "ata_scale must be finite and > 0, got {ata_scale}"
        )));
    }

    let m_max = grid.m_max();
    let lipschitz = ata_scale + 2.0 * cfg.reg_l2 + 1.0 / cfg.nu;
    let alpha = 2.0 / lipschitz * (1.0 - ALPHA_MARGIN);

    let mut m = project_l2_balls(m0, m_max);
    let mut r = grid.residual(&m);
    let mut objective_history = Vec::with_capacity(cfg.max_iter_convex + 1);
    let mut m_history: VecDeque<Array2<f64>> = VecDeque::new();
    let stride = (cfg.max_iter_convex / cfg.nhistory).max(1);
    let mut converged = false;
    let mut iterations = 0usize;

    for it in 0..cfg.max_iter_convex {
        iterations = it + 1;

        let mut g = grid.at_dot_r(&r);
        for j in 0..n {
            for c in 0..3 {
                g[[j, c]] +=
                    2.0 * cfg.reg_l2 * m[[j, c]] + (m[[j, c]] - m_proxy[[j, c]]) / cfg.nu;
            }
        }

        let obj = objective(grid, &m, m_proxy, cfg, &r);
        objective_history.push(obj);
        if cfg.verbose {
            debug!(iteration = it, objective = obj, "MwPGP iteration");
        }

        // Active/free partition: a site pinned at its bound whose descent
        // direction points outward has the radial gradient component
        // frozen; only the tangential part remains free.
        let mut pg = g;
        let mut pg_norm_sq = 0.0;
        for j in 0..n {
            let norm =
                (m[[j, 0]] * m[[j, 0]] + m[[j, 1]] * m[[j, 1]] + m[[j, 2]] * m[[j, 2]]).sqrt();
            if norm >= m_max[j] * (1.0 - BOUND_SLACK) {
                let radial = (pg[[j, 0]] * m[[j, 0]]
                    + pg[[j, 1]] * m[[j, 1]]
                    + pg[[j, 2]] * m[[j, 2]])
                    / norm;
                if radial < 0.0 {
                    for c in 0..3 {
                        pg[[j, c]] -= radial * m[[j, c]] / norm;
                    }
                }
            }
            for c in 0..3 {
                pg_norm_sq += pg[[j, c]] * pg[[j, c]];
            }
        }

        if pg_norm_sq.sqrt() < cfg.epsilon {
            converged = true;
            break;
        }

        // Exact line search along the projected gradient, capped by the
        // Lipschitz step. The curvature needs only ||A·pg||², not AᵀA.
        let a_pg = grid.a_dot_m(&pg);
        let curvature =
            a_pg.dot(&a_pg) + (2.0 * cfg.reg_l2 + 1.0 / cfg.nu) * pg_norm_sq;
        let step = if curvature > 0.0 {
            (pg_norm_sq / curvature).min(alpha)
        } else {
            alpha
        };

        let mut stepped = m.clone();
        for j in 0..n {
            for c in 0..3 {
                stepped[[j, c]] -= step * pg[[j, c]];
            }
        }
        let mut m_next = project_l2_balls(&stepped, m_max);
        let mut r_next = grid.residual(&m_next);

        // Projection after an overlong line-search step can undo the
        // descent; the 1/L step is monotone under projection.
        if objective(grid, &m_next, m_proxy, cfg, &r_next) > obj {
            let safe = 1.0 / lipschitz;
            let mut fallback = m.clone();
            for j in 0..n {
                for c in 0..3 {
                    fallback[[j, c]] -= safe * pg[[j, c]];
                }
            }
            m_next = project_l2_balls(&fallback, m_max);
            r_next = grid.residual(&m_next);
        }

        m = m_next;
        r = r_next;

        if iterations % stride == 0 {
            m_history.push_back(m.clone());
            if m_history.len() > cfg.nhistory {
                m_history.pop_front();
            }
        }
    }

    objective_history.push(objective(grid, &m, m_proxy, cfg, &r));
    m_history.push_back(m.clone());
    if m_history.len() > cfg.nhistory {
        m_history.pop_front();
    }

    debug!(iterations, converged, "MwPGP solve finished");

    Ok(MwpgpResult {
        m,
        objective_history,
        m_history: m_history.into_iter().collect(),
        converged,
        iterations,
    })
}

fn objective(
    grid: &DipoleGrid,
    m: &Array2<f64>,
    m_proxy: &Array2<f64>,
    cfg: &RelaxSplitConfig,
    r: &ndarray::Array1<f64>,
) -> f64 {
    let n = grid.ndipoles();
    let mut m_sq = 0.0;
    let mut proxy_sq = 0.0;
    for j in 0..n {
        for c in 0..3 {
            m_sq += m[[j, c]] * m[[j, c]];
            let d = m[[j, c]] - m_proxy[[j, c]];
            proxy_sq += d * d;
        }
    }
    0.5 * r.dot(r) + cfg.reg_l2 * m_sq + 0.5 / cfg.nu * proxy_sq
}
