//! Controller configuration.

use crate::{Error, Result};

/// Smallest grid size accepted; smaller grids produce degenerate brackets.
pub const MIN_GRID_SIZE: usize = 4;

/// Default confidence coefficient in `b = sqrt(coef_ci * ln(T) / n)`.
pub const DEFAULT_COEF_CI: f64 = 1.5;

/// What a node does when the high side of its bracket is resolved above the target but
/// the low side is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpenBracket {
    /// Refine into the low cell right away.
    #[default]
    Zoom,
    /// Keep sampling the low arm until it resolves too.
    SampleLow,
}

/// Configuration for a [`Controller`][crate::Controller].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ZoomConfig {
    /// Target response probability, in `(0, 1)`.
    pub mu_star: f64,
    /// Total sampling budget `T`. Enters the statistical bounds; it is not a countdown.
    pub budget: u64,
    /// Cells per grid node (`K`). `None` derives it from the budget, see [`auto_grid_size`].
    ///
    /// An explicit value must be even and at least [`MIN_GRID_SIZE`].
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub grid_size: Option<usize>,
    /// Lower end of the searched input interval.
    pub min_interval: f64,
    /// Upper end of the searched input interval.
    pub max_interval: f64,
    /// Confidence coefficient for the pessimistic rule.
    pub coef_ci: f64,
    /// Open-bracket policy.
    #[cfg_attr(feature = "serde", serde(default))]
    pub open_bracket: OpenBracket,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            mu_star: 0.5,
            budget: 1000,
            grid_size: None,
            min_interval: 0.0,
            max_interval: 1.0,
            coef_ci: DEFAULT_COEF_CI,
            open_bracket: OpenBracket::Zoom,
        }
    }
}

impl ZoomConfig {
    /// Search `[0, 1]` for `mu_star` with budget `budget` and an automatic grid size.
    pub fn new(mu_star: f64, budget: u64) -> Self {
        Self {
            mu_star,
            budget,
            ..Self::default()
        }
    }

    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = Some(grid_size);
        self
    }

    pub fn with_interval(mut self, min_interval: f64, max_interval: f64) -> Self {
        self.min_interval = min_interval;
        self.max_interval = max_interval;
        self
    }

    pub fn with_coef_ci(mut self, coef_ci: f64) -> Self {
        self.coef_ci = coef_ci;
        self
    }

    pub fn with_open_bracket(mut self, open_bracket: OpenBracket) -> Self {
        self.open_bracket = open_bracket;
        self
    }

    /// Check every field; returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        if !(self.mu_star.is_finite() && self.mu_star > 0.0 && self.mu_star < 1.0) {
            return Err(Error::InvalidConfig("mu_star must lie in (0, 1)"));
        }
        if self.budget < 2 {
            return Err(Error::InvalidConfig("budget must be at least 2"));
        }
        if !(self.min_interval.is_finite() && self.max_interval.is_finite()) {
            return Err(Error::InvalidConfig("interval bounds must be finite"));
        }
        if self.min_interval >= self.max_interval {
            return Err(Error::InvalidConfig(
                "min_interval must be strictly below max_interval",
            ));
        }
        if let Some(k) = self.grid_size {
            if k < MIN_GRID_SIZE || k % 2 != 0 {
                return Err(Error::InvalidConfig(
                    "grid_size must be even and at least 4",
                ));
            }
        }
        if !(self.coef_ci.is_finite() && self.coef_ci > 0.0) {
            return Err(Error::InvalidConfig("coef_ci must be finite and positive"));
        }
        Ok(())
    }

    /// The grid size a controller built from this config uses.
    pub fn resolved_grid_size(&self) -> usize {
        self.grid_size.unwrap_or_else(|| auto_grid_size(self.budget))
    }
}

/// Grid size heuristic `K = floor(sqrt(T / (ln T * ln ln T)))`, made even and floored at 4.
///
/// For very small budgets the formula is undefined (`ln ln T <= 0`) and the floor applies.
///
/// ```rust
/// let k = zoomer::auto_grid_size(20);
/// assert!(k >= 4 && k % 2 == 0);
/// ```
pub fn auto_grid_size(budget: u64) -> usize {
    let t = budget as f64;
    let raw = (t / (t.ln() * t.ln().ln())).sqrt();
    let mut k = if raw.is_finite() && raw > 0.0 {
        raw.floor() as usize
    } else {
        0
    };
    if k % 2 == 1 {
        k -= 1;
    }
    k.max(MIN_GRID_SIZE)
}

/// Pull-count bar `N* = T / (ln T * ln ln T)` used by the promising-arm estimate.
///
/// Returns `0.0` where the formula is undefined or non-positive.
pub fn promising_pull_bar(budget: u64) -> f64 {
    let t = budget as f64;
    let n = t / (t.ln() * t.ln().ln());
    if n.is_finite() && n > 0.0 {
        n
    } else {
        0.0
    }
}
