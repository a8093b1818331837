// ─────────────────────────────────────────────────────────────────────
// SCPN Magnet Core — Property-Based Tests (proptest) for magnet-solve
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for magnet-solve using proptest.
//!
//! Covers: MwPGP feasibility under arbitrary budgets, relax-and-split
//! degenerate collapse, GPMO determinism and greedy monotonicity.

use magnet_math::linalg::ata_spectral_bound;
use magnet_solve::gpmo::{gpmo, GpmoAlgorithm};
use magnet_solve::mwpgp::solve_mwpgp;
use magnet_solve::relax_split::relax_and_split;
use magnet_types::config::{GpmoConfig, RelaxSplitConfig};
use magnet_types::grid::{CoordinateSystem, DipoleGrid};
use magnet_types::state::RsTermination;
use ndarray::{Array1, Array2};
use proptest::prelude::*;

/// Deterministic dense problem from integer seeds.
fn synthetic_grid(nfield: usize, n: usize, seed: u64, bound: f64) -> DipoleGrid {
    let a = Array2::from_shape_fn((nfield, 3 * n), |(i, j)| {
        ((i * 13 + j * 7) as f64 + seed as f64 * 0.77).sin()
    });
    let b = Array1::from_shape_fn(nfield, |i| ((i * 5 + 3) as f64 + seed as f64 * 0.31).cos());
    let m_max = Array1::from_shape_fn(n, |j| bound * (1.0 + 0.5 * (j as f64 * 0.9).sin().abs()));
    let norms = Array1::from_shape_fn(nfield, |i| 1.0 + 0.1 * (i as f64 * 0.4).cos().abs());
    DipoleGrid::new(a, b, m_max, norms, CoordinateSystem::Cartesian).unwrap()
}

fn site_norm(m: &Array2<f64>, j: usize) -> f64 {
    (m[[j, 0]] * m[[j, 0]] + m[[j, 1]] * m[[j, 1]] + m[[j, 2]] * m[[j, 2]]).sqrt()
}

// ── MwPGP Properties ─────────────────────────────────────────────────

proptest! {
    /// Whatever the iteration budget, the returned iterate is feasible.
    #[test]
    fn mwpgp_always_feasible(
        n in 1usize..8,
        nfield in 3usize..16,
        seed in 0u64..50,
        max_iter in 1usize..60,
    ) {
        let grid = synthetic_grid(nfield, n, seed, 0.8);
        let cfg = RelaxSplitConfig {
            max_iter_convex: max_iter,
            ..Default::default()
        };
        let m0 = Array2::zeros((n, 3));
        let scale = ata_spectral_bound(grid.influence());
        let res = solve_mwpgp(&grid, &m0, &m0, &cfg, scale).unwrap();

        for j in 0..n {
            prop_assert!(site_norm(&res.m, j) <= grid.m_max()[j] + 1e-9,
                "site {} infeasible: {} > {}", j, site_norm(&res.m, j), grid.m_max()[j]);
        }
        for snapshot in &res.m_history {
            for j in 0..n {
                prop_assert!(site_norm(snapshot, j) <= grid.m_max()[j] + 1e-9);
            }
        }
    }

    /// Exact line search never lets the objective rise between iterations.
    #[test]
    fn mwpgp_objective_never_rises(
        n in 1usize..6,
        nfield in 3usize..12,
        seed in 0u64..50,
    ) {
        let grid = synthetic_grid(nfield, n, seed, 0.5);
        let cfg = RelaxSplitConfig {
            max_iter_convex: 40,
            ..Default::default()
        };
        let m0 = Array2::zeros((n, 3));
        let scale = ata_spectral_bound(grid.influence());
        let res = solve_mwpgp(&grid, &m0, &m0, &cfg, scale).unwrap();

        for w in res.objective_history.windows(2) {
            prop_assert!(w[1] <= w[0] + 1e-9 * w[0].abs().max(1.0),
                "objective rose: {} -> {}", w[0], w[1]);
        }
    }
}

// ── Relax-and-Split Properties ───────────────────────────────────────

proptest! {
    /// With no nonconvex term the run degenerates to one convex solve and
    /// the split variable equals the relaxed one exactly.
    #[test]
    fn relax_split_degenerate_equality(
        n in 1usize..6,
        nfield in 3usize..12,
        seed in 0u64..50,
    ) {
        let grid = synthetic_grid(nfield, n, seed, 1.0);
        let cfg = RelaxSplitConfig {
            max_iter_convex: 30,
            ..Default::default()
        };
        let res = relax_and_split(&grid, None, &cfg).unwrap();

        prop_assert_eq!(res.termination, RsTermination::SingleConvexSolve);
        prop_assert_eq!(res.iterations, 1);
        for (a, b) in res.m.iter().zip(res.m_proxy.iter()) {
            prop_assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    /// Regularized runs keep every iterate feasible.
    #[test]
    fn relax_split_l1_feasible(
        n in 1usize..6,
        nfield in 3usize..12,
        seed in 0u64..30,
        reg in 0.001f64..0.2,
    ) {
        let grid = synthetic_grid(nfield, n, seed, 0.6);
        let cfg = RelaxSplitConfig {
            reg_l1: reg,
            nu: 10.0,
            max_iter_rs: 4,
            max_iter_convex: 30,
            ..Default::default()
        };
        let res = relax_and_split(&grid, None, &cfg).unwrap();
        for j in 0..n {
            prop_assert!(site_norm(&res.m, j) <= grid.m_max()[j] + 1e-9);
        }
        prop_assert!(res.iterations >= 1);
        prop_assert_eq!(res.m_history.len(), res.m_proxy_history.len());
    }
}

// ── GPMO Properties ──────────────────────────────────────────────────

proptest! {
    /// Two identical baseline runs produce bit-identical assignments.
    #[test]
    fn gpmo_baseline_deterministic(
        n in 2usize..10,
        nfield in 4usize..16,
        seed in 0u64..50,
    ) {
        let grid = synthetic_grid(nfield, n, seed, 0.05);
        let k = (n / 2).max(1);
        let cfg = GpmoConfig {
            k,
            nhistory: 1,
            ..Default::default()
        };
        let r1 = gpmo(&grid, GpmoAlgorithm::Baseline, &cfg).unwrap();
        let r2 = gpmo(&grid, GpmoAlgorithm::Baseline, &cfg).unwrap();

        for (a, b) in r1.m.iter().zip(r2.m.iter()) {
            prop_assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    /// With bounds small against the target, every greedy step reduces
    /// the squared residual: the checkpoint history is non-increasing.
    #[test]
    fn gpmo_baseline_r2_monotone(
        n in 2usize..10,
        nfield in 4usize..16,
        seed in 0u64..50,
    ) {
        // Bounds tiny against the target, so the sign-optimal linear term
        // dominates the quadratic cost of every commit.
        let grid = synthetic_grid(nfield, n, seed, 1e-8);
        let cfg = GpmoConfig {
            k: n,
            nhistory: n,
            ..Default::default()
        };
        let res = gpmo(&grid, GpmoAlgorithm::Baseline, &cfg).unwrap();

        for w in res.r2_history.windows(2) {
            prop_assert!(w[1] <= w[0] + 1e-12,
                "r2 increased: {} -> {}", w[0], w[1]);
        }
    }

    /// Every committed site is at exactly full strength or empty.
    #[test]
    fn gpmo_moments_binary(
        n in 2usize..10,
        nfield in 4usize..16,
        seed in 0u64..50,
    ) {
        let grid = synthetic_grid(nfield, n, seed, 0.3);
        let cfg = GpmoConfig {
            k: n,
            nhistory: 1,
            ..Default::default()
        };
        let res = gpmo(&grid, GpmoAlgorithm::Baseline, &cfg).unwrap();

        for j in 0..n {
            let norm = site_norm(&res.m, j);
            let bound = grid.m_max()[j];
            let empty = norm == 0.0;
            let full = (norm - bound).abs() < 1e-12 * bound;
            prop_assert!(empty || full,
                "site {} neither empty nor full: |m| = {}, bound = {}", j, norm, bound);
        }
    }
}
