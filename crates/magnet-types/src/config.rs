// ─────────────────────────────────────────────────────────────────────
// SCPN Magnet Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::error::{MagnetError, MagnetResult};

/// A nonconvex regularization strength below this magnitude counts as off.
pub const REG_ZERO_ATOL: f64 = 1e-16;

/// Options for the relax-and-split solver and its inner MwPGP convex step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaxSplitConfig {
    /// Outer relax-and-split iterations (one convex solve + one prox each).
    #[serde(default = "default_max_iter_rs")]
    pub max_iter_rs: usize,
    /// Iteration budget for each MwPGP convex solve.
    #[serde(default = "default_max_iter_convex")]
    pub max_iter_convex: usize,
    /// Outer stopping tolerance on ||m - m_proxy||.
    #[serde(default = "default_epsilon_rs")]
    pub epsilon_rs: f64,
    /// Projected-gradient tolerance of the convex step.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// L0 regularization strength. Mutually exclusive with reg_l1.
    #[serde(default)]
    pub reg_l0: f64,
    /// L1 regularization strength. Mutually exclusive with reg_l0.
    #[serde(default)]
    pub reg_l1: f64,
    /// Convex L2 regularization, folded into the quadratic operator.
    #[serde(default)]
    pub reg_l2: f64,
    /// Relaxation weight. Large nu makes the nonconvex term negligible.
    #[serde(default = "default_nu")]
    pub nu: f64,
    /// Number of iterate checkpoints kept by the convex solver.
    #[serde(default = "default_nhistory_rs")]
    pub nhistory: usize,
    #[serde(default)]
    pub verbose: bool,
}

fn default_max_iter_rs() -> usize {
    20
}
fn default_max_iter_convex() -> usize {
    100
}
fn default_epsilon_rs() -> f64 {
    1e-3
}
fn default_epsilon() -> f64 {
    1e-4
}
fn default_nu() -> f64 {
    1e100
}
fn default_nhistory_rs() -> usize {
    10
}

impl Default for RelaxSplitConfig {
    fn default() -> Self {
        RelaxSplitConfig {
            max_iter_rs: default_max_iter_rs(),
            max_iter_convex: default_max_iter_convex(),
            epsilon_rs: default_epsilon_rs(),
            epsilon: default_epsilon(),
            reg_l0: 0.0,
            reg_l1: 0.0,
            reg_l2: 0.0,
            nu: default_nu(),
            nhistory: default_nhistory_rs(),
            verbose: false,
        }
    }
}

impl RelaxSplitConfig {
    pub fn from_file(path: &str) -> MagnetResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> MagnetResult<()> {
        if self.max_iter_rs == 0 {
            return Err(MagnetError::ConfigError(
                "max_iter_rs must be >= 1".to_string(),
            ));
        }
        if self.max_iter_convex == 0 {
            return Err(MagnetError::ConfigError(
                "max_iter_convex must be >= 1".to_string(),
            ));
        }
        if self.nhistory == 0 {
            return Err(MagnetError::ConfigError(
                "nhistory must be >= 1".to_string(),
            ));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(MagnetError::ConfigError(
                "epsilon must be finite and > 0".to_string(),
            ));
        }
        if !self.epsilon_rs.is_finite() || self.epsilon_rs <= 0.0 {
            return Err(MagnetError::ConfigError(
                "epsilon_rs must be finite and > 0".to_string(),
            ));
        }
        if !self.nu.is_finite() || self.nu <= 0.0 {
            return Err(MagnetError::ConfigError(
                "nu must be finite and > 0".to_string(),
            ));
        }
        for (name, value) in [
            ("reg_l0", self.reg_l0),
            ("reg_l1", self.reg_l1),
            ("reg_l2", self.reg_l2),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MagnetError::ConfigError(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        if self.reg_l0.abs() > REG_ZERO_ATOL && self.reg_l1.abs() > REG_ZERO_ATOL {
            return Err(MagnetError::ConfigError(
                "L0 and L1 loss terms cannot be used concurrently".to_string(),
            ));
        }
        Ok(())
    }
}

/// Options for the GPMO greedy placement engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpmoConfig {
    /// Total placement budget (number of commit operations).
    #[serde(default = "default_k")]
    pub k: usize,
    /// Number of error/moment checkpoints across the run. Must not exceed k.
    #[serde(default = "default_nhistory_gpmo")]
    pub nhistory: usize,
    /// Convex L2 penalty applied per committed dipole.
    #[serde(default)]
    pub reg_l2: f64,
    /// Iterations between backtracking sweeps (backtracking variants only).
    #[serde(default = "default_backtracking")]
    pub backtracking: usize,
    /// Neighbor count for the isolated-magnet check during backtracking.
    #[serde(default = "default_n_adjacent")]
    pub n_adjacent: usize,
    /// A committed dipole is reversed when removing it raises ||r||^2 by
    /// no more than this.
    #[serde(default = "default_backtracking_tol")]
    pub backtracking_tol: f64,
    /// Maximum commits per iteration for the multi variant.
    #[serde(default = "default_max_per_iter")]
    pub max_per_iter: usize,
    #[serde(default)]
    pub verbose: bool,
}

fn default_k() -> usize {
    1000
}
fn default_nhistory_gpmo() -> usize {
    100
}
fn default_backtracking() -> usize {
    100
}
fn default_n_adjacent() -> usize {
    1
}
fn default_backtracking_tol() -> f64 {
    1e-10
}
fn default_max_per_iter() -> usize {
    4
}

impl Default for GpmoConfig {
    fn default() -> Self {
        GpmoConfig {
            k: default_k(),
            nhistory: default_nhistory_gpmo(),
            reg_l2: 0.0,
            backtracking: default_backtracking(),
            n_adjacent: default_n_adjacent(),
            backtracking_tol: default_backtracking_tol(),
            max_per_iter: default_max_per_iter(),
            verbose: false,
        }
    }
}

impl GpmoConfig {
    pub fn from_file(path: &str) -> MagnetResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> MagnetResult<()> {
        if self.k == 0 {
            return Err(MagnetError::ConfigError("k must be >= 1".to_string()));
        }
        if self.nhistory == 0 {
            return Err(MagnetError::ConfigError(
                "nhistory must be >= 1".to_string(),
            ));
        }
        if self.nhistory > self.k {
            return Err(MagnetError::ConfigError(format!(
                "nhistory must not exceed k: nhistory={}, k={}",
                self.nhistory, self.k
            )));
        }
        if !self.reg_l2.is_finite() || self.reg_l2 < 0.0 {
            return Err(MagnetError::ConfigError(
                "reg_l2 must be finite and >= 0".to_string(),
            ));
        }
        if !self.backtracking_tol.is_finite() || self.backtracking_tol < 0.0 {
            return Err(MagnetError::ConfigError(
                "backtracking_tol must be finite and >= 0".to_string(),
            ));
        }
        if self.max_per_iter == 0 {
            return Err(MagnetError::ConfigError(
                "max_per_iter must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
