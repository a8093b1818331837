// ─────────────────────────────────────────────────────────────────────
// SCPN Magnet Core — GPMO Greedy Placement Engine
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Greedy placement for magnet optimization (GPMO).
//!
//! Commits full-strength dipoles one (or a few) at a time, always the
//! candidate that most reduces the squared field residual. The residual
//! is updated incrementally after each commitment; the per-step candidate
//! scan over all unassigned sites runs data-parallel. Variants differ
//! only in selection policy and bookkeeping: batched commits (`multi`),
//! periodic reversal of recent commitments (`backtracking`), and finite
//! per-site polarization sets (`ArbVec`).

use std::cmp::Ordering;
use std::collections::VecDeque;

use magnet_types::config::GpmoConfig;
use magnet_types::error::{MagnetError, MagnetResult};
use magnet_types::grid::{CoordinateSystem, DipoleGrid};
use magnet_types::state::GpmoResult;
use ndarray::{Array1, Array2, Array3};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Greedy algorithm variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpmoAlgorithm {
    Baseline,
    Multi,
    Backtracking,
    ArbVec,
    ArbVecBacktracking,
}

/// One scored placement option: site index plus orientation index into
/// the variant's orientation set.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    site: usize,
    orient: usize,
}

/// Total order on candidates: score first, then site, then orientation.
/// The tie-break makes the parallel reduction schedule-independent.
fn cmp_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.score
        .partial_cmp(&b.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.site.cmp(&b.site))
        .then_with(|| a.orient.cmp(&b.orient))
}

/// Admissible orientations per site: the six signed coordinate axes for
/// fixed-axis grids, or the enumerated polarization rows for ArbVec.
enum OrientationMode<'a> {
    Axes,
    Pol(&'a Array3<f64>),
}

impl OrientationMode<'_> {
    fn count(&self, _site: usize) -> usize {
        match self {
            OrientationMode::Axes => 6,
            OrientationMode::Pol(p) => p.dim().1,
        }
    }

    fn unit(&self, site: usize, orient: usize) -> [f64; 3] {
        match self {
            OrientationMode::Axes => {
                let mut v = [0.0; 3];
                v[orient / 2] = if orient % 2 == 0 { 1.0 } else { -1.0 };
                v
            }
            OrientationMode::Pol(p) => {
                [p[[site, orient, 0]], p[[site, orient, 1]], p[[site, orient, 2]]]
            }
        }
    }
}

/// Mutable run state. The grid itself stays untouched; the bound and L2
/// folding act on this owned scaled copy of the influence columns.
struct PlacementState {
    /// Influence with column `3j + c` pre-multiplied by `m_max[j]`, so
    /// committed moments are unit orientation vectors.
    scaled: Array2<f64>,
    /// Per-site symmetric 3x3 Gram of the scaled columns, packed as
    /// (xx, xy, xz, yy, yz, zz).
    gram: Vec<[f64; 6]>,
    /// Per-commit L2 penalty: `reg_l2 * m_max[j]²`.
    l2pen: Vec<f64>,
    /// Current residual `A·m - b` in scaled units.
    r: Array1<f64>,
    assigned: Vec<bool>,
    /// Committed unit orientation per site; zero rows for empty sites.
    m_unit: Array2<f64>,
    committed: usize,
}

fn quad_form(g: &[f64; 6], v: &[f64; 3]) -> f64 {
    v[0] * v[0] * g[0]
        + v[1] * v[1] * g[3]
        + v[2] * v[2] * g[5]
        + 2.0 * (v[0] * v[1] * g[1] + v[0] * v[2] * g[2] + v[1] * v[2] * g[4])
}

fn build_state(grid: &DipoleGrid, reg_l2: f64) -> PlacementState {
    let n = grid.ndipoles();
    let m_max = grid.m_max();

    let mut scaled = grid.influence().clone();
    for (jc, mut col) in scaled.columns_mut().into_iter().enumerate() {
        let bound = m_max[jc / 3];
        col.mapv_inplace(|v| v * bound);
    }

    let gram: Vec<[f64; 6]> = (0..n)
        .into_par_iter()
        .map(|j| {
            let a = scaled.column(3 * j);
            let b = scaled.column(3 * j + 1);
            let c = scaled.column(3 * j + 2);
            [
                a.dot(&a),
                a.dot(&b),
                a.dot(&c),
                b.dot(&b),
                b.dot(&c),
                c.dot(&c),
            ]
        })
        .collect();

    let l2pen = m_max.iter().map(|&b| reg_l2 * b * b).collect();

    PlacementState {
        scaled,
        gram,
        l2pen,
        r: -grid.target().clone(),
        assigned: vec![false; n],
        m_unit: Array2::zeros((n, 3)),
        committed: 0,
    }
}

impl PlacementState {
    /// Residual dotted with the site's three scaled columns.
    fn site_dots(&self, j: usize) -> [f64; 3] {
        [
            self.scaled.column(3 * j).dot(&self.r),
            self.scaled.column(3 * j + 1).dot(&self.r),
            self.scaled.column(3 * j + 2).dot(&self.r),
        ]
    }

    /// Best orientation for one site: change in `||r||² + reg_l2·||m||²`
    /// if this site were committed now.
    fn best_for_site(&self, mode: &OrientationMode, j: usize) -> Candidate {
        let d = self.site_dots(j);
        let g = &self.gram[j];
        let pen = self.l2pen[j];
        let mut best = Candidate {
            score: f64::INFINITY,
            site: j,
            orient: 0,
        };
        for o in 0..mode.count(j) {
            let v = mode.unit(j, o);
            let lin = v[0] * d[0] + v[1] * d[1] + v[2] * d[2];
            let score = 2.0 * lin + quad_form(g, &v) + pen;
            if score < best.score {
                best = Candidate {
                    score,
                    site: j,
                    orient: o,
                };
            }
        }
        best
    }

    fn scan_best(&self, mode: &OrientationMode) -> Option<Candidate> {
        let n = self.assigned.len();
        (0..n)
            .into_par_iter()
            .filter(|&j| !self.assigned[j])
            .map(|j| self.best_for_site(mode, j))
            .min_by(cmp_candidates)
    }

    /// Every unassigned site's best candidate, best first.
    fn scan_sorted(&self, mode: &OrientationMode) -> Vec<Candidate> {
        let n = self.assigned.len();
        let mut all: Vec<Candidate> = (0..n)
            .into_par_iter()
            .filter(|&j| !self.assigned[j])
            .map(|j| self.best_for_site(mode, j))
            .collect();
        all.sort_unstable_by(cmp_candidates);
        all
    }

    fn commit(&mut self, j: usize, v: [f64; 3]) {
        for i in 0..self.r.len() {
            self.r[i] += v[0] * self.scaled[[i, 3 * j]]
                + v[1] * self.scaled[[i, 3 * j + 1]]
                + v[2] * self.scaled[[i, 3 * j + 2]];
        }
        for c in 0..3 {
            self.m_unit[[j, c]] = v[c];
        }
        self.assigned[j] = true;
        self.committed += 1;
    }

    fn uncommit(&mut self, j: usize) {
        let v = [self.m_unit[[j, 0]], self.m_unit[[j, 1]], self.m_unit[[j, 2]]];
        for i in 0..self.r.len() {
            self.r[i] -= v[0] * self.scaled[[i, 3 * j]]
                + v[1] * self.scaled[[i, 3 * j + 1]]
                + v[2] * self.scaled[[i, 3 * j + 2]];
        }
        for c in 0..3 {
            self.m_unit[[j, c]] = 0.0;
        }
        self.assigned[j] = false;
        self.committed -= 1;
    }

    /// Committed moments rescaled to physical units.
    fn scaled_moments(&self, grid: &DipoleGrid) -> Array2<f64> {
        let mut m = self.m_unit.clone();
        for (j, mut row) in m.rows_mut().into_iter().enumerate() {
            let bound = grid.m_max()[j];
            row.mapv_inplace(|v| v * bound);
        }
        m
    }
}

/// Bounded rolling log of recent site commitments, oldest first.
/// Index-based so reversals never chase stale references.
struct DecisionLog {
    cap: usize,
    buf: VecDeque<usize>,
}

impl DecisionLog {
    fn new(cap: usize) -> Self {
        DecisionLog {
            cap,
            buf: VecDeque::with_capacity(cap),
        }
    }

    fn push(&mut self, site: usize) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(site);
    }

    fn remove(&mut self, site: usize) {
        self.buf.retain(|&s| s != site);
    }

    fn sites(&self) -> Vec<usize> {
        self.buf.iter().copied().collect()
    }
}

fn dist2(p: &Array2<f64>, a: usize, b: usize) -> f64 {
    let dx = p[[a, 0]] - p[[b, 0]];
    let dy = p[[a, 1]] - p[[b, 1]];
    let dz = p[[a, 2]] - p[[b, 2]];
    dx * dx + dy * dy + dz * dz
}

/// Smallest pairwise distance on the grid.
fn min_site_spacing(p: &Array2<f64>) -> f64 {
    let n = p.nrows();
    (0..n)
        .into_par_iter()
        .map(|j| {
            let mut best = f64::INFINITY;
            for i in 0..n {
                if i != j {
                    let d = dist2(p, i, j);
                    if d < best {
                        best = d;
                    }
                }
            }
            best
        })
        .reduce(|| f64::INFINITY, f64::min)
        .sqrt()
}

/// Indices of the `count` nearest sites to `j`, nearest first.
fn nearest_neighbors(p: &Array2<f64>, j: usize, count: usize) -> Vec<usize> {
    let n = p.nrows();
    let mut idx: Vec<usize> = (0..n).filter(|&i| i != j).collect();
    idx.sort_by(|&a, &b| {
        dist2(p, j, a)
            .partial_cmp(&dist2(p, j, b))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });
    idx.truncate(count);
    idx
}

/// Reverse recent commitments whose removal does not raise `||r||²`
/// beyond the tolerance. Committed sites with no committed neighbor among
/// their nearest grid neighbors are examined first. Returns the number of
/// reversals.
fn backtrack_sweep(
    state: &mut PlacementState,
    log: &mut DecisionLog,
    positions: &Array2<f64>,
    cfg: &GpmoConfig,
) -> usize {
    let logged: Vec<usize> = log
        .sites()
        .into_iter()
        .filter(|&j| state.assigned[j])
        .collect();
    let (isolated, connected): (Vec<usize>, Vec<usize>) = logged.into_iter().partition(|&j| {
        !nearest_neighbors(positions, j, cfg.n_adjacent)
            .iter()
            .any(|&i| state.assigned[i])
    });

    let mut removed = 0usize;
    for j in isolated.into_iter().chain(connected) {
        let d = state.site_dots(j);
        let v = [
            state.m_unit[[j, 0]],
            state.m_unit[[j, 1]],
            state.m_unit[[j, 2]],
        ];
        let lin = v[0] * d[0] + v[1] * d[1] + v[2] * d[2];
        let delta = -2.0 * lin + quad_form(&state.gram[j], &v);
        if delta <= cfg.backtracking_tol {
            state.uncommit(j);
            log.remove(j);
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(removed, committed = state.committed, "backtracking sweep");
    }
    removed
}

/// Commit up to `budget` top-ranked sites in one pass, skipping any site
/// within the grid's minimum spacing of a site already committed in this
/// batch. Scores are all evaluated against the pre-batch residual.
fn commit_batch(
    state: &mut PlacementState,
    mode: &OrientationMode,
    budget: usize,
    positions: &Array2<f64>,
    spacing: f64,
    log: &mut DecisionLog,
) -> usize {
    let candidates = state.scan_sorted(mode);
    let threshold = spacing * (1.0 + 1e-9);
    let mut batch: Vec<usize> = Vec::with_capacity(budget);
    for c in candidates {
        if batch.len() == budget {
            break;
        }
        if batch
            .iter()
            .any(|&i| dist2(positions, i, c.site).sqrt() <= threshold)
        {
            continue;
        }
        let v = mode.unit(c.site, c.orient);
        state.commit(c.site, v);
        log.push(c.site);
        batch.push(c.site);
    }
    batch.len()
}

/// Run a GPMO variant on the grid. Returns per-checkpoint error and mean
/// normal-field-error histories, moment snapshots, and the final binary
/// moment assignment pre-scaled by the per-site bound.
pub fn gpmo(
    grid: &DipoleGrid,
    algorithm: GpmoAlgorithm,
    cfg: &GpmoConfig,
) -> MagnetResult<GpmoResult> {
    cfg.validate()?;
    let n = grid.ndipoles();

    let needs_positions = matches!(
        algorithm,
        GpmoAlgorithm::Multi | GpmoAlgorithm::Backtracking | GpmoAlgorithm::ArbVecBacktracking
    );
    let needs_pol = matches!(
        algorithm,
        GpmoAlgorithm::ArbVec | GpmoAlgorithm::ArbVecBacktracking
    );
    let backtrack = matches!(
        algorithm,
        GpmoAlgorithm::Backtracking | GpmoAlgorithm::ArbVecBacktracking
    );

    if needs_positions && grid.positions().is_none() {
        return Err(MagnetError::ConfigError(format!(
            "{algorithm:?} requires site positions on the dipole grid"
        )));
    }
    if needs_pol {
        if grid.coords() != CoordinateSystem::Cartesian {
            return Err(MagnetError::ConfigError(format!(
                "{algorithm:?} supports only Cartesian moment bases, got {:?}",
                grid.coords()
            )));
        }
        if grid.pol_vectors().is_none() {
            return Err(MagnetError::ConfigError(format!(
                "{algorithm:?} requires per-site polarization vectors"
            )));
        }
    }
    if backtrack && cfg.backtracking == 0 {
        return Err(MagnetError::ConfigError(
            "backtracking frequency must be >= 1".to_string(),
        ));
    }

    let mut k = cfg.k;
    if k > n {
        warn!(
            requested = k,
            ndipoles = n,
            "placement budget exceeds available sites; clamping"
        );
        k = n;
    }
    if cfg.nhistory > k {
        return Err(MagnetError::ConfigError(format!(
            "nhistory must not exceed the placement budget: nhistory={}, k={k}",
            cfg.nhistory
        )));
    }

    let mode = match needs_pol {
        true => OrientationMode::Pol(grid.pol_vectors().ok_or_else(|| {
            MagnetError::ConfigError("polarization vectors missing".to_string())
        })?),
        false => OrientationMode::Axes,
    };
    let batch = match algorithm {
        GpmoAlgorithm::Multi => cfg.max_per_iter,
        _ => 1,
    };
    let spacing = match algorithm {
        GpmoAlgorithm::Multi => grid.positions().map(min_site_spacing),
        _ => None,
    };

    let mut state = build_state(grid, cfg.reg_l2);
    let mut log = DecisionLog::new(cfg.backtracking.max(1));

    let stride = (k / cfg.nhistory).max(1);
    let mut r2_history = Vec::with_capacity(cfg.nhistory + 1);
    let mut bn_history = Vec::with_capacity(cfg.nhistory + 1);
    let mut m_history = Vec::with_capacity(cfg.nhistory + 1);
    let mut num_nonzeros_history = Vec::with_capacity(cfg.nhistory + 1);

    debug!(k, ndipoles = n, ?algorithm, "starting GPMO");

    let mut ops = 0usize;
    let mut since_sweep = 0usize;
    let mut next_mark = stride;
    let mut recorded_at = usize::MAX;

    while ops < k {
        let placed_now = match (batch, spacing, grid.positions()) {
            (b, Some(spacing), Some(positions)) if b > 1 => {
                let budget = b.min(k - ops);
                commit_batch(&mut state, &mode, budget, positions, spacing, &mut log)
            }
            _ => match state.scan_best(&mode) {
                None => 0,
                Some(c) => {
                    let v = mode.unit(c.site, c.orient);
                    state.commit(c.site, v);
                    log.push(c.site);
                    1
                }
            },
        };
        if placed_now == 0 {
            break; // no unassigned site left to commit
        }
        ops += placed_now;
        since_sweep += placed_now;

        if backtrack && since_sweep >= cfg.backtracking {
            if let Some(positions) = grid.positions() {
                backtrack_sweep(&mut state, &mut log, positions, cfg);
            }
            since_sweep = 0;
        }

        while ops >= next_mark {
            let r2 = state.r.dot(&state.r);
            if cfg.verbose {
                debug!(ops, r2, committed = state.committed, "GPMO checkpoint");
            }
            r2_history.push(r2);
            bn_history.push(grid.mean_field_error(&state.r));
            m_history.push(state.scaled_moments(grid));
            num_nonzeros_history.push(state.committed);
            recorded_at = ops;
            next_mark += stride;
        }
    }

    if recorded_at != ops {
        r2_history.push(state.r.dot(&state.r));
        bn_history.push(grid.mean_field_error(&state.r));
        m_history.push(state.scaled_moments(grid));
        num_nonzeros_history.push(state.committed);
    }

    debug!(
        placed = ops,
        committed = state.committed,
        "GPMO finished"
    );

    Ok(GpmoResult {
        m: state.scaled_moments(grid),
        r2_history,
        bn_history,
        m_history,
        num_nonzeros_history,
        placed: ops,
    })
}
