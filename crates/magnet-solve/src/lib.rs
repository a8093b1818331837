// ─────────────────────────────────────────────────────────────────────
// SCPN Magnet Core — Dipole Placement Solvers
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Permanent-magnet dipole placement and optimization.
//!
//! Two independent entry points over the same [`magnet_types::grid::DipoleGrid`]:
//! the relax-and-split continuous solver (convex MwPGP step alternated
//! with a proximal sparsity step) and the GPMO greedy combinatorial
//! placement engine with its policy variants.

pub mod gpmo;
pub mod mwpgp;
pub mod relax_split;
