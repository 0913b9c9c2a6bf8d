//! The zooming controller: query-point selection, observation routing, final estimate.
//!
//! Usage is a strict loop of [`Controller::choose_arm`], one external observation, and
//! [`Controller::update_arm`], repeated up to the budget, then [`Controller::return_arm`].
//!
//! ```rust
//! use zoomer::{Controller, ZoomConfig};
//!
//! let mut z = Controller::new(ZoomConfig::new(0.5, 200)).unwrap();
//! for _ in 0..200 {
//!     let x = z.choose_arm();
//!     z.update_arm(x > 0.3).unwrap();
//! }
//! let estimate = z.return_arm();
//! assert!((0.0..=1.0).contains(&estimate));
//! ```

use crate::config::promising_pull_bar;
use crate::{Criterion, Error, GridNode, NodeParams, Result, Step, ZoomConfig};

/// One query point plus where it came from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Choice {
    /// Input value to query.
    pub value: f64,
    /// Grid index sampled in the producing node.
    pub index: usize,
    /// Cell indices leading from the root to the producing node.
    pub path: Vec<usize>,
    /// Bounds of the producing node.
    pub bounds: (f64, f64),
    /// Criterion that drove the descent.
    pub criterion: Criterion,
    /// The arm had no observations before this choice.
    pub bootstrap: bool,
}

impl Choice {
    /// Zoom depth of the producing node (root = 0).
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Handle to the node that produced the outstanding choice.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    path: Vec<usize>,
    index: usize,
}

/// Adaptive threshold search over a zoom tree of [`GridNode`]s.
#[derive(Debug, Clone)]
pub struct Controller {
    cfg: ZoomConfig,
    root: GridNode,
    pending: Option<Pending>,
    optimistic: bool,
    rounds: u64,
}

impl Controller {
    /// Build a controller; the grid size is resolved from `cfg` (see [`ZoomConfig::grid_size`]).
    pub fn new(cfg: ZoomConfig) -> Result<Self> {
        cfg.validate()?;
        let grid_size = cfg.resolved_grid_size();
        tracing::debug!(
            mu_star = cfg.mu_star,
            budget = cfg.budget,
            grid_size,
            min = cfg.min_interval,
            max = cfg.max_interval,
            "zoom controller"
        );
        let params = NodeParams {
            mu_star: cfg.mu_star,
            budget: cfg.budget,
            grid_size,
            coef_ci: cfg.coef_ci,
            open_bracket: cfg.open_bracket,
        };
        Ok(Self {
            cfg,
            root: GridNode::new(params, cfg.min_interval, cfg.max_interval),
            pending: None,
            optimistic: false,
            rounds: 0,
        })
    }

    /// Search `[0, 1]` for `mu_star` with an automatic grid size.
    pub fn with_target(mu_star: f64, budget: u64) -> Result<Self> {
        Self::new(ZoomConfig::new(mu_star, budget))
    }

    pub fn config(&self) -> &ZoomConfig {
        &self.cfg
    }

    pub fn grid_size(&self) -> usize {
        self.root.grid_size()
    }

    pub fn root(&self) -> &GridNode {
        &self.root
    }

    /// Observations recorded so far.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Whether the next descent uses the KL (optimistic) rule.
    pub fn is_optimistic(&self) -> bool {
        self.optimistic
    }

    /// Whether a choice is waiting for its observation.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Next input value to query.
    pub fn choose_arm(&mut self) -> f64 {
        self.choose_arm_explain().value
    }

    /// Like [`choose_arm`](Self::choose_arm), with the path and criterion behind the choice.
    ///
    /// Replaces any outstanding choice that was never updated.
    pub fn choose_arm_explain(&mut self) -> Choice {
        let optimistic = self.optimistic;
        let mut path = Vec::new();
        let mut node = &mut self.root;
        let index = loop {
            match node.what_to_do(optimistic) {
                Step::Sample(i) => break i,
                Step::Zoom(i) => {
                    path.push(i);
                    node = node.child_or_zoom(i);
                }
            }
        };
        let choice = Choice {
            value: node.reverse_converter(index as f64),
            index,
            bounds: node.bounds(),
            criterion: Criterion::from_optimistic(optimistic),
            bootstrap: node.arms()[index].pulls == 0,
            path,
        };
        self.pending = Some(Pending {
            path: choice.path.clone(),
            index,
        });
        choice
    }

    /// Record the observation for the outstanding choice and flip the criterion.
    ///
    /// Errors with [`Error::NoPendingChoice`] unless exactly one `choose_arm` precedes it.
    /// On any error the tree, the criterion and the round count are left untouched.
    pub fn update_arm(&mut self, observation: bool) -> Result<()> {
        let pending = self.pending.take().ok_or(Error::NoPendingChoice)?;
        // Nodes are never removed and only `choose_arm` writes the handle, so a miss here
        // means the handle was not produced by this tree.
        let node = match self.root.descendant_mut(&pending.path) {
            Some(n) if n.last_index() == pending.index => n,
            _ => return Err(Error::StaleHandle { path: pending.path }),
        };
        if let Err(e) = node.update_arm(observation) {
            self.pending = Some(pending);
            return Err(e);
        }
        self.optimistic = !self.optimistic;
        self.rounds += 1;
        Ok(())
    }

    /// Final estimate: most pulled arm of the node reached by optimistic descent.
    ///
    /// Follows zooms only into existing children and never mutates the tree.
    pub fn return_arm(&self) -> f64 {
        let node = self.final_node(|_| {});
        let (value, pulls) = node.most_pulled_arm();
        tracing::debug!(value, pulls, rounds = self.rounds, "return arm");
        value
    }

    /// Final estimate preferring well-sampled arms along the optimistic path.
    ///
    /// Among the nodes visited by [`return_arm`](Self::return_arm), returns the most pulled
    /// arm with more than `N* = T / (ln T * ln ln T)` pulls; falls back to `return_arm`
    /// when no node reaches that bar.
    pub fn return_arm_promising(&self) -> f64 {
        let bar = promising_pull_bar(self.cfg.budget);
        let mut best: Option<(f64, u64)> = None;
        let last = self.final_node(|node| {
            let (value, pulls) = node.most_pulled_arm();
            if pulls as f64 > bar && best.map_or(true, |(_, p)| pulls > p) {
                best = Some((value, pulls));
            }
        });
        let value = match best {
            Some((v, _)) => v,
            None => last.most_pulled_arm().0,
        };
        tracing::debug!(value, bar, "return promising arm");
        value
    }

    /// Optimistic read-only descent; `visit` sees every node on the way, last included.
    fn final_node<F: FnMut(&GridNode)>(&self, mut visit: F) -> &GridNode {
        let mut node = &self.root;
        loop {
            visit(node);
            match node.peek(true) {
                Step::Sample(_) => return node,
                Step::Zoom(i) => match node.child(i) {
                    Some(c) => node = c,
                    None => return node,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(k: usize, budget: u64) -> Controller {
        Controller::new(ZoomConfig::new(0.5, budget).with_grid_size(k)).unwrap()
    }

    #[test]
    fn first_choice_is_the_root_midpoint() {
        let mut z = controller(8, 100);
        let c = z.choose_arm_explain();
        assert_eq!(c.value, 0.5);
        assert_eq!(c.index, 4);
        assert!(c.path.is_empty());
        assert!(c.bootstrap);
        assert_eq!(c.criterion, Criterion::ConfidenceBound);
        assert!(z.has_pending());
    }

    #[test]
    fn update_without_choice_is_an_error() {
        let mut z = controller(8, 100);
        assert!(matches!(z.update_arm(true), Err(Error::NoPendingChoice)));
        assert_eq!(z.rounds(), 0);
        assert!(!z.is_optimistic());
        assert_eq!(z.root().total_pulls(), 0);
    }

    #[test]
    fn double_update_is_an_error() {
        let mut z = controller(8, 100);
        z.choose_arm();
        z.update_arm(true).unwrap();
        assert!(matches!(z.update_arm(true), Err(Error::NoPendingChoice)));
        assert_eq!(z.rounds(), 1);
        assert_eq!(z.root().total_pulls(), 1);
    }

    #[test]
    fn criterion_alternates_per_round() {
        let mut z = controller(8, 100);
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(z.choose_arm_explain().criterion);
            z.update_arm(false).unwrap();
        }
        assert_eq!(
            seen,
            vec![
                Criterion::ConfidenceBound,
                Criterion::Kl,
                Criterion::ConfidenceBound,
                Criterion::Kl
            ]
        );
    }

    #[test]
    fn zoom_descends_into_a_single_child_per_cell() {
        // K=4, T=20: five failures at arm 2 and five successes at arm 3 resolve the
        // bracket (2, 3) under the KL rule.
        let mut z = controller(4, 20);
        let mut zoomed = None;
        for round in 0..40 {
            let c = z.choose_arm_explain();
            if !c.path.is_empty() {
                zoomed = Some((round, c));
                break;
            }
            z.update_arm(c.value > 0.6).unwrap();
        }
        let (_, c) = zoomed.expect("controller never zoomed");
        assert_eq!(c.path, vec![2]);
        assert_eq!(c.bounds, (0.5, 0.75));
        assert!(c.bootstrap);
        z.update_arm(true).unwrap();

        let before = z.node_count();
        z.choose_arm();
        z.update_arm(false).unwrap();
        assert!(z.node_count() >= before);
        assert!(z.root().child(2).is_some());
        assert!(z.root().children().all(|(i, _)| i < 4));
    }

    #[test]
    fn return_arm_does_not_mutate() {
        let mut z = controller(8, 50);
        for i in 0..30 {
            let x = z.choose_arm();
            z.update_arm(x > 0.4 || i % 5 == 0).unwrap();
        }
        let before = format!("{:?}", z.root());
        let a = z.return_arm();
        let b = z.return_arm();
        let _ = z.return_arm_promising();
        assert_eq!(a, b);
        assert_eq!(format!("{:?}", z.root()), before);
    }

    #[test]
    fn fresh_controller_returns_midpoint() {
        let z = controller(8, 100);
        assert_eq!(z.return_arm(), 0.5);
        assert_eq!(z.return_arm_promising(), 0.5);
    }

    #[test]
    fn abandoned_choice_is_replaced() {
        let mut z = controller(8, 100);
        z.choose_arm();
        z.update_arm(false).unwrap();
        let first = z.choose_arm_explain();
        let second = z.choose_arm_explain();
        assert_eq!(first, second);
        z.update_arm(true).unwrap();
        assert_eq!(z.root().arms()[second.index].pulls, 1);
        assert_eq!(z.rounds(), 2);
    }

    /// K=4, T=20 against a noise-free step at 0.6.
    fn step_run(rounds: usize) -> Controller {
        let mut z = controller(4, 20);
        for _ in 0..rounds {
            let x = z.choose_arm();
            z.update_arm(x > 0.6).unwrap();
        }
        z
    }

    #[test]
    fn return_arm_stops_at_a_zoom_without_child() {
        let z = step_run(4);
        assert_eq!(z.root().peek(true), Step::Zoom(2));
        assert!(z.root().child(2).is_none());
        // Root arm 3 (0.75) holds three of the four pulls.
        assert_eq!(z.root().most_pulled_arm(), (0.75, 3));
        assert_eq!(z.return_arm(), 0.75);
        // Three pulls stay below N* ~= 6.08, so the promising rule falls back.
        assert_eq!(z.return_arm_promising(), 0.75);
    }

    #[test]
    fn return_arm_follows_an_existing_child() {
        let z = step_run(6);
        assert_eq!(z.root().peek(true), Step::Zoom(2));
        let child = z.root().child(2).expect("child over [0.5, 0.75]");
        assert_eq!(child.most_pulled_arm(), (0.625, 1));
        assert_eq!(z.root().most_pulled_arm(), (0.75, 4));
        assert_eq!(z.return_arm(), 0.625);
        assert_eq!(z.return_arm_promising(), 0.625);
    }

    #[test]
    fn return_arm_promising_prefers_a_node_above_the_bar() {
        let z = step_run(11);
        assert!(promising_pull_bar(20) > 6.0 && promising_pull_bar(20) < 7.0);
        // Root arm 3 has seven pulls, the child's best has three.
        assert_eq!(z.root().most_pulled_arm(), (0.75, 7));
        assert_eq!(z.root().child(2).map(|c| c.most_pulled_arm()), Some((0.625, 3)));
        assert_eq!(z.return_arm(), 0.625);
        assert_eq!(z.return_arm_promising(), 0.75);
    }

    #[test]
    fn failed_update_keeps_the_pending_choice() {
        let mut z = controller(8, 100);
        // A degenerate target makes the KL evaluation fail at the root.
        z.root.params.mu_star = 1.0;
        let c = z.choose_arm_explain();
        assert!(matches!(z.update_arm(true), Err(Error::Divergence(_))));
        assert!(z.has_pending());
        assert_eq!(z.rounds(), 0);
        assert!(!z.is_optimistic());
        assert_eq!(z.root().arms()[c.index].pulls, 0);
    }

    #[test]
    fn foreign_handle_is_reported_as_stale() {
        let mut z = controller(8, 100);
        z.pending = Some(Pending {
            path: vec![3],
            index: 4,
        });
        match z.update_arm(true) {
            Err(Error::StaleHandle { path }) => assert_eq!(path, vec![3]),
            other => panic!("expected stale handle, got {other:?}"),
        }
        assert!(!z.has_pending());
        assert_eq!(z.rounds(), 0);
        assert_eq!(z.root().subtree_pulls(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Controller::new(ZoomConfig::new(0.5, 100).with_grid_size(7)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(Controller::with_target(1.5, 100).is_err());
    }
}
