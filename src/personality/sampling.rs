use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::config::Gaussian;

/// One draw from `N(mean, std²)`.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, std: f64) -> f64 {
    let z: f64 = StandardNormal.sample(rng);
    mean + std * z
}

/// Clamp `value` to whichever bounds are present.
pub fn clip(value: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let value = match min {
        Some(lo) if value < lo => lo,
        _ => value,
    };
    match max {
        Some(hi) if value > hi => hi,
        _ => value,
    }
}

impl Gaussian {
    /// `clip(normal(mean, std), min, max)`, with a missing `min` read as `0`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let raw = gaussian(rng, self.mean, self.std);
        clip(raw, Some(self.min.unwrap_or(0.0)), self.max)
    }
}
