//! `zoomer`: budgeted threshold estimation for noisy binary responses.
//!
//! Designed for "where does the response cross `mu_star`?" problems: an unknown,
//! monotone-in-probability response function on an interval, a fixed sampling budget
//! `T`, and queries that each return one stochastic yes/no observation (a detection
//! threshold, a dose level, a stimulus intensity). You pick the interval and the
//! target probability; `zoomer` picks where to query next.
//!
//! The search is a tree of uniform grids:
//!
//! - A [`GridNode`] holds `K + 1` arms over its interval. Arms `0` and `K` are sentinels,
//!   pre-resolved below/above the target; the active arm and its neighbour form a
//!   *bracket* around the crossing.
//! - Each interior arm is classified against `mu_star` under two rules
//!   (see [`stats`]): a confidence bound (pessimistic) and a Bernoulli-KL test
//!   (optimistic). The [`Controller`] alternates the two, one per round.
//! - Once the high side of the bracket is resolved above the target, the node *zooms*:
//!   the controller descends into a child grid covering the low cell, created on first
//!   use. Zooming is free; only samples consume budget.
//! - The final estimate is the most pulled arm of the deepest node reachable by
//!   optimistic-only zooming ([`Controller::return_arm`]), or the best well-sampled arm
//!   along that path ([`Controller::return_arm_promising`]).
//!
//! **Goals:**
//! - **Deterministic**: same observations → same queries. No internal randomness.
//! - **Explicit protocol**: `choose_arm` / observation / `update_arm`; a mismatched
//!   update is an [`Error::NoPendingChoice`], never silent corruption.
//! - **Small state**: one tree per search, grown monotonically, bounded by the budget.
//!
//! **Non-goals:**
//! - Not a general bandit library: one response surface, one scalar target.
//! - No I/O, no driver loop; the caller owns the experiment. Logging goes through
//!   `tracing` (no subscriber is installed here).
//!
//! ```rust
//! use zoomer::{Controller, ZoomConfig};
//!
//! let cfg = ZoomConfig::new(0.5, 20).with_grid_size(32);
//! let mut z = Controller::new(cfg).unwrap();
//! for round in 0..20 {
//!     let x = z.choose_arm();
//!     let mut observed = x > 0.3;
//!     if round % 7 == 0 {
//!         observed = !observed;
//!     }
//!     z.update_arm(observed).unwrap();
//! }
//! let estimate = z.return_arm();
//! assert!((0.0..=1.0).contains(&estimate));
//! ```

#![forbid(unsafe_code)]

mod error;
pub use error::{Error, Result};

mod config;
pub use config::*;

pub mod stats;
pub use stats::{bernoulli_kl, Criterion, Relation};

mod grid;
pub use grid::*;

mod tree;

mod controller;
pub use controller::*;
