//! Synthetic response functions shared by the integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::Rng;

/// Psychometric-style response: `mu_star ± min(|s - s_star|, delta)^alpha`, clipped to
/// `[0.01, 0.99]`.
#[derive(Debug, Clone, Copy)]
pub struct Psychometric {
    pub mu_star: f64,
    pub s_star: f64,
    pub delta: f64,
    pub alpha: f64,
}

impl Psychometric {
    pub fn prob(&self, s: f64) -> f64 {
        let d = (s - self.s_star).abs().min(self.delta).powf(self.alpha);
        let p = if s > self.s_star {
            self.mu_star + d
        } else {
            self.mu_star - d
        };
        p.clamp(0.01, 0.99)
    }

    pub fn sample(&self, rng: &mut StdRng, s: f64) -> bool {
        rng.random::<f64>() < self.prob(s)
    }
}
