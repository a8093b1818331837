// ─────────────────────────────────────────────────────────────────────
// SCPN Magnet Core — Property-Based Tests (proptest) for magnet-types
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for magnet-types using proptest.
//!
//! Covers: dipole grid construction invariants, operator product
//! consistency, configuration serialization roundtrip.

use magnet_types::config::{GpmoConfig, RelaxSplitConfig};
use magnet_types::grid::{CoordinateSystem, DipoleGrid};
use ndarray::{Array1, Array2};
use proptest::prelude::*;

fn make_grid(nfield: usize, n: usize, seed: u64) -> DipoleGrid {
    let a = Array2::from_shape_fn((nfield, 3 * n), |(i, j)| {
        ((i * 11 + j * 3) as f64 + seed as f64 * 0.17).sin()
    });
    let b = Array1::from_shape_fn(nfield, |i| ((i * 7 + 1) as f64).cos());
    let m_max = Array1::from_shape_fn(n, |j| 1.0 + (j as f64 * 0.61).sin().abs());
    let norms = Array1::from_elem(nfield, 1.0);
    DipoleGrid::new(a, b, m_max, norms, CoordinateSystem::Cartesian).unwrap()
}

// ── Grid Construction Invariants ─────────────────────────────────────

proptest! {
    /// Dimensions reported by the grid match the construction inputs.
    #[test]
    fn grid_dimensions_match(
        nfield in 1usize..32,
        n in 1usize..32,
    ) {
        let grid = make_grid(nfield, n, 0);
        prop_assert_eq!(grid.ndipoles(), n);
        prop_assert_eq!(grid.nfield(), nfield);
        prop_assert_eq!(grid.influence().dim(), (nfield, 3 * n));
    }

    /// A·m computed through the grid equals the naive double loop.
    #[test]
    fn grid_product_matches_naive(
        nfield in 1usize..16,
        n in 1usize..12,
        seed in 0u64..50,
    ) {
        let grid = make_grid(nfield, n, seed);
        let m = Array2::from_shape_fn((n, 3), |(j, c)| {
            ((j * 5 + c * 2) as f64 + seed as f64).cos()
        });

        let fast = grid.a_dot_m(&m);
        for i in 0..nfield {
            let mut acc = 0.0;
            for j in 0..n {
                for c in 0..3 {
                    acc += grid.influence()[[i, 3 * j + c]] * m[[j, c]];
                }
            }
            prop_assert!((fast[i] - acc).abs() < 1e-10 * acc.abs().max(1.0),
                "row {}: {} vs {}", i, fast[i], acc);
        }
    }

    /// Aᵀr through the grid equals the naive double loop.
    #[test]
    fn grid_transpose_product_matches_naive(
        nfield in 1usize..16,
        n in 1usize..12,
        seed in 0u64..50,
    ) {
        let grid = make_grid(nfield, n, seed);
        let r = Array1::from_shape_fn(nfield, |i| ((i * 3 + 2) as f64 + seed as f64).sin());

        let fast = grid.at_dot_r(&r);
        for j in 0..n {
            for c in 0..3 {
                let mut acc = 0.0;
                for i in 0..nfield {
                    acc += grid.influence()[[i, 3 * j + c]] * r[i];
                }
                prop_assert!((fast[[j, c]] - acc).abs() < 1e-10 * acc.abs().max(1.0));
            }
        }
    }

    /// residual(0) is exactly -b.
    #[test]
    fn grid_residual_at_zero_is_minus_target(
        nfield in 1usize..16,
        n in 1usize..12,
        seed in 0u64..50,
    ) {
        let grid = make_grid(nfield, n, seed);
        let r = grid.residual(&Array2::zeros((n, 3)));
        for i in 0..nfield {
            prop_assert!((r[i] + grid.target()[i]).abs() < 1e-14);
        }
    }
}

// ── Configuration Roundtrips ─────────────────────────────────────────

proptest! {
    /// GPMO config survives a JSON roundtrip.
    #[test]
    fn gpmo_config_roundtrip(
        k in 1usize..100_000,
        nhistory in 1usize..1000,
        reg_l2 in 0.0f64..10.0,
    ) {
        let cfg = GpmoConfig { k, nhistory, reg_l2, ..Default::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: GpmoConfig = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.k, k);
        prop_assert_eq!(back.nhistory, nhistory);
        prop_assert!((back.reg_l2 - reg_l2).abs() < 1e-12);
    }

    /// Relax-and-split config survives a JSON roundtrip.
    #[test]
    fn relax_split_config_roundtrip(
        reg in 0.0f64..1.0,
        nu in 0.001f64..1000.0,
    ) {
        let cfg = RelaxSplitConfig { reg_l1: reg, nu, ..Default::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: RelaxSplitConfig = serde_json::from_str(&json).unwrap();
        prop_assert!((back.reg_l1 - reg).abs() < 1e-12);
        prop_assert!((back.nu - nu).abs() < 1e-9 * nu);
    }

    /// Validation accepts exactly one nonconvex term.
    #[test]
    fn validation_single_nonconvex_term(reg in 1e-6f64..1.0) {
        let l0_only = RelaxSplitConfig { reg_l0: reg, ..Default::default() };
        let l1_only = RelaxSplitConfig { reg_l1: reg, ..Default::default() };
        let both = RelaxSplitConfig { reg_l0: reg, reg_l1: reg, ..Default::default() };
        prop_assert!(l0_only.validate().is_ok());
        prop_assert!(l1_only.validate().is_ok());
        prop_assert!(both.validate().is_err());
    }
}
