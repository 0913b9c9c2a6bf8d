//! Statistical primitives behind the branching decisions.
//!
//! Each interior arm of a [`GridNode`][crate::GridNode] is classified relative to the target
//! probability `mu_star` under two independent rules:
//!
//! - **Confidence bound** (pessimistic): an Azuma–Hoeffding style radius
//!   `b = sqrt(coef_ci * ln(T) / n)` around the empirical mean.
//! - **KL** (optimistic): the Bernoulli KL divergence between the empirical mean and
//!   `mu_star`, compared against the MOSS-style threshold `ln(T / n) / n`.
//!
//! Both rules use the *static* budget `T`, not the remaining budget.

/// Tolerance passed to `logp` when validating the two-point simplices.
const KL_TOL: f64 = 1e-9;

/// Where an arm's empirical mean sits relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Relation {
    /// Resolved below the target (`-2`).
    ConfidentlyBelow,
    /// Below (or equal to) the target, not yet resolved (`-1`).
    Below,
    /// No observation yet (`0`).
    #[default]
    Unknown,
    /// Above the target, not yet resolved (`1`).
    Above,
    /// Resolved above the target (`2`).
    ConfidentlyAbove,
}

impl Relation {
    /// Integer code: `-2, -1, 0, 1, 2`.
    pub fn as_i8(self) -> i8 {
        match self {
            Relation::ConfidentlyBelow => -2,
            Relation::Below => -1,
            Relation::Unknown => 0,
            Relation::Above => 1,
            Relation::ConfidentlyAbove => 2,
        }
    }

    pub fn is_confidently_below(self) -> bool {
        self == Relation::ConfidentlyBelow
    }

    pub fn is_confidently_above(self) -> bool {
        self == Relation::ConfidentlyAbove
    }

    fn from_side(above: bool, resolved: bool) -> Self {
        match (above, resolved) {
            (true, true) => Relation::ConfidentlyAbove,
            (true, false) => Relation::Above,
            (false, true) => Relation::ConfidentlyBelow,
            (false, false) => Relation::Below,
        }
    }
}

/// Which relation field governs a branching decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Criterion {
    /// Confidence-bound relation (pessimistic rounds).
    ConfidenceBound,
    /// KL relation (optimistic rounds).
    Kl,
}

impl Criterion {
    pub fn from_optimistic(optimistic: bool) -> Self {
        if optimistic {
            Criterion::Kl
        } else {
            Criterion::ConfidenceBound
        }
    }

    pub fn is_optimistic(self) -> bool {
        self == Criterion::Kl
    }
}

/// Bernoulli KL divergence `KL(Ber(hmu) || Ber(mu))`, in nats.
///
/// `mu` must lie strictly inside `(0, 1)`. When `hmu` sits on the boundary the
/// closed forms `-ln(1 - mu)` (for `hmu == 0`) and `-ln(mu)` (for `hmu == 1`) are used.
///
/// ```rust
/// let d = zoomer::bernoulli_kl(0.0, 0.5).unwrap();
/// assert!((d - std::f64::consts::LN_2).abs() < 1e-12);
/// ```
pub fn bernoulli_kl(hmu: f64, mu: f64) -> Result<f64, logp::Error> {
    if hmu == mu {
        return Ok(0.0);
    }
    if !(mu > 0.0 && mu < 1.0) {
        return Err(logp::Error::Domain("bernoulli_kl: mu must lie in (0, 1)"));
    }
    if hmu <= 0.0 {
        return Ok(-(1.0 - mu).ln());
    }
    if hmu >= 1.0 {
        return Ok(-mu.ln());
    }
    logp::kl_divergence(&[hmu, 1.0 - hmu], &[mu, 1.0 - mu], KL_TOL)
}

/// Confidence radius `sqrt(coef_ci * ln(T) / n)`.
///
/// Infinite for `n == 0`.
pub fn confidence_radius(coef_ci: f64, budget: u64, n: u64) -> f64 {
    if n == 0 {
        return f64::INFINITY;
    }
    (coef_ci * (budget as f64).ln() / n as f64).sqrt()
}

/// KL resolution threshold `ln(T / n) / n`.
///
/// Non-positive once `n >= T`: every arm then counts as resolved under the KL rule.
pub fn kl_threshold(budget: u64, n: u64) -> f64 {
    if n == 0 {
        return f64::INFINITY;
    }
    let n = n as f64;
    (budget as f64 / n).ln() / n
}

/// Classify `estimator` (the mean of `n` observations) with the confidence-bound rule.
pub fn classify_confidence(
    estimator: f64,
    n: u64,
    mu_star: f64,
    budget: u64,
    coef_ci: f64,
) -> Relation {
    let b = confidence_radius(coef_ci, budget, n);
    if estimator + b < mu_star {
        Relation::ConfidentlyBelow
    } else if estimator - b > mu_star {
        Relation::ConfidentlyAbove
    } else {
        Relation::from_side(estimator > mu_star, false)
    }
}

/// Classify `estimator` (the mean of `n` observations) with the KL rule.
pub fn classify_kl(
    estimator: f64,
    n: u64,
    mu_star: f64,
    budget: u64,
) -> Result<Relation, logp::Error> {
    let d = bernoulli_kl(estimator, mu_star)?;
    let resolved = d >= kl_threshold(budget, n);
    Ok(Relation::from_side(estimator > mu_star, resolved))
}
