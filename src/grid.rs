//! One level of the zoom tree: a uniform grid over a sub-interval.
//!
//! A node with grid size `K` tracks `K + 1` arms at `min + k * (max - min) / K`. Arms `0`
//! and `K` are sentinels, pre-classified as confidently below/above the target and never
//! sampled; every decision brackets the crossing between two adjacent arms.

use std::collections::BTreeMap;

use crate::stats::{classify_confidence, classify_kl, Criterion, Relation};
use crate::{Error, OpenBracket, Result};

/// Observation counts and derived relations for one arm.
///
/// Both relation fields are written together on every update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmStats {
    /// Positive observations.
    pub successes: u64,
    /// Total observations.
    pub pulls: u64,
    /// Relation under the confidence-bound rule.
    pub ci: Relation,
    /// Relation under the KL rule.
    pub kl: Relation,
}

impl ArmStats {
    fn sentinel(relation: Relation) -> Self {
        Self {
            successes: 0,
            pulls: 0,
            ci: relation,
            kl: relation,
        }
    }

    /// Empirical mean, `None` before the first observation.
    pub fn mean(&self) -> Option<f64> {
        if self.pulls == 0 {
            None
        } else {
            Some(self.successes as f64 / self.pulls as f64)
        }
    }

    /// The relation read by `criterion`.
    pub fn relation(&self, criterion: Criterion) -> Relation {
        match criterion {
            Criterion::ConfidenceBound => self.ci,
            Criterion::Kl => self.kl,
        }
    }
}

/// What a node asks the caller to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Step {
    /// Sample this node at grid index `.0`.
    Sample(usize),
    /// Refine into the cell `[.0, .0 + 1]`.
    Zoom(usize),
}

impl Step {
    pub fn index(self) -> usize {
        match self {
            Step::Sample(i) | Step::Zoom(i) => i,
        }
    }

    pub fn is_sample(self) -> bool {
        matches!(self, Step::Sample(_))
    }
}

/// Parameters shared by every node of one tree.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeParams {
    pub mu_star: f64,
    pub budget: u64,
    pub grid_size: usize,
    pub coef_ci: f64,
    pub open_bracket: OpenBracket,
}

/// A grid over `[min_interval, max_interval]` with lazily created children.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridNode {
    pub(crate) params: NodeParams,
    min_interval: f64,
    max_interval: f64,
    arms: Vec<ArmStats>,
    last_index: usize,
    pub(crate) children: BTreeMap<usize, GridNode>,
}

impl GridNode {
    /// Create a node with untouched arms and the active arm in the middle of the grid.
    ///
    /// `params` must come from a validated [`ZoomConfig`](crate::ZoomConfig).
    pub(crate) fn new(params: NodeParams, min_interval: f64, max_interval: f64) -> Self {
        let k = params.grid_size;
        debug_assert!(k >= 4 && k % 2 == 0, "grid_size={k}");
        let mut arms = vec![ArmStats::default(); k + 1];
        arms[0] = ArmStats::sentinel(Relation::ConfidentlyBelow);
        arms[k] = ArmStats::sentinel(Relation::ConfidentlyAbove);
        Self {
            params,
            min_interval,
            max_interval,
            arms,
            last_index: k / 2,
            children: BTreeMap::new(),
        }
    }

    pub fn params(&self) -> NodeParams {
        self.params
    }

    pub fn grid_size(&self) -> usize {
        self.params.grid_size
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min_interval, self.max_interval)
    }

    pub fn arms(&self) -> &[ArmStats] {
        &self.arms
    }

    pub fn arm(&self, index: usize) -> Option<&ArmStats> {
        self.arms.get(index)
    }

    /// The active arm: the one the next [`update_arm`](Self::update_arm) writes to.
    pub fn last_index(&self) -> usize {
        self.last_index
    }

    pub fn is_sentinel(&self, index: usize) -> bool {
        index == 0 || index == self.params.grid_size
    }

    /// Map a (possibly fractional) grid index to an input value.
    pub fn reverse_converter(&self, k: f64) -> f64 {
        let width = self.max_interval - self.min_interval;
        self.min_interval + k * width / self.params.grid_size as f64
    }

    /// Bounds of cell `index`, i.e. `[index, index + 1]` in grid coordinates.
    pub fn cell_bounds(&self, index: usize) -> (f64, f64) {
        let size = (self.max_interval - self.min_interval) / self.params.grid_size as f64;
        let lo = self.min_interval + index as f64 * size;
        (lo, lo + size)
    }

    /// Recompute `(ci, kl)` relations for arm `k` from its counts.
    ///
    /// Errors for a sentinel or an arm with no observations.
    pub fn compute_point_relation(&self, k: usize) -> Result<(Relation, Relation)> {
        let arm = self.arms.get(k).copied().unwrap_or_default();
        self.relations(k, &arm)
    }

    fn relations(&self, k: usize, arm: &ArmStats) -> Result<(Relation, Relation)> {
        let estimator = match arm.mean() {
            Some(m) if !self.is_sentinel(k) => m,
            _ => {
                return Err(Error::Precondition {
                    index: k,
                    pulls: arm.pulls,
                    grid_size: self.params.grid_size,
                })
            }
        };
        let p = &self.params;
        let ci = classify_confidence(estimator, arm.pulls, p.mu_star, p.budget, p.coef_ci);
        let kl = classify_kl(estimator, arm.pulls, p.mu_star, p.budget)?;
        Ok((ci, kl))
    }

    /// Decide the next step without moving the active arm.
    pub fn peek(&self, optimistic: bool) -> Step {
        let last = self.last_index;
        let t0 = self.arms[last].pulls;
        let mean0 = match self.arms[last].mean() {
            Some(m) => m,
            None => return Step::Sample(last),
        };

        let high = if mean0 > self.params.mu_star {
            last
        } else {
            last + 1
        };
        let low = high - 1;

        let criterion = Criterion::from_optimistic(optimistic);
        let r0 = self.arms[low].relation(criterion);
        let r1 = self.arms[high].relation(criterion);
        let t1 = self.arms[high].pulls;

        if r1.is_confidently_above() {
            if r0.is_confidently_below() || self.params.open_bracket == OpenBracket::Zoom {
                return Step::Zoom(low);
            }
            return Step::Sample(low);
        }
        if r0.is_confidently_below() || t1 == 0 {
            return Step::Sample(high);
        }
        if t0 < t1 {
            Step::Sample(low)
        } else {
            Step::Sample(high)
        }
    }

    /// Decide the next step; a `Sample` moves the active arm to the returned index.
    pub fn what_to_do(&mut self, optimistic: bool) -> Step {
        let step = self.peek(optimistic);
        if let Step::Sample(i) = step {
            self.last_index = i;
        }
        step
    }

    /// A fresh node covering cell `interval_index`, with the same parameters.
    ///
    /// Does not register the node as a child.
    pub fn zoom(&self, interval_index: usize) -> GridNode {
        let (lo, hi) = self.cell_bounds(interval_index);
        GridNode::new(self.params, lo, hi)
    }

    /// Record one observation at the active arm.
    ///
    /// Counts and relations are written together; on error the arm is left as it was.
    pub fn update_arm(&mut self, success: bool) -> Result<()> {
        let index = self.last_index;
        let mut arm = self.arms[index];
        arm.pulls += 1;
        arm.successes += u64::from(success);
        let (ci, kl) = self.relations(index, &arm)?;
        arm.ci = ci;
        arm.kl = kl;
        self.arms[index] = arm;
        tracing::trace!(
            index,
            success,
            successes = arm.successes,
            pulls = arm.pulls,
            ci = ci.as_i8(),
            kl = kl.as_i8(),
            "arm updated"
        );
        Ok(())
    }

    /// `(input value, pulls)` of the most pulled arm; the lowest index wins ties.
    ///
    /// A node without observations reports the active arm with 0 pulls.
    pub fn most_pulled_arm(&self) -> (f64, u64) {
        let mut best = self.last_index;
        let mut max_pulls = 0u64;
        for (i, arm) in self.arms.iter().enumerate() {
            if arm.pulls > max_pulls {
                max_pulls = arm.pulls;
                best = i;
            }
        }
        let value = self.reverse_converter(best as f64);
        tracing::debug!(index = best, pulls = max_pulls, value, "most pulled arm");
        (value, max_pulls)
    }

    /// Total observations recorded by this node (children excluded).
    pub fn total_pulls(&self) -> u64 {
        self.arms.iter().map(|a| a.pulls).sum()
    }
}
