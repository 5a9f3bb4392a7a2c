use std::fmt;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EmphasisConfig;
use crate::error::{Result, SoundscapeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmphasisLevel {
    Strong,
    Moderate,
    Reduced,
}

impl fmt::Display for EmphasisLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EmphasisLevel::Strong => "strong",
            EmphasisLevel::Moderate => "moderate",
            EmphasisLevel::Reduced => "reduced",
        })
    }
}

/// Decides per word whether to emphasise it, and how strongly.
#[derive(Debug, Clone)]
pub struct EmphasisSampler {
    probability: f64,
    levels: Vec<EmphasisLevel>,
    index: WeightedIndex<f64>,
}

impl EmphasisSampler {
    pub fn new(config: &EmphasisConfig) -> Result<Self> {
        let probability = config.probability;
        if !(0.0..=1.0).contains(&probability) {
            return Err(SoundscapeError::config(
                "emphasis.probability",
                format!("probability {probability} outside [0, 1]"),
            ));
        }
        let index = WeightedIndex::new(config.levels.iter().map(|l| l.weight))
            .map_err(|e| SoundscapeError::config("emphasis.levels", e.to_string()))?;
        Ok(Self {
            probability,
            levels: config.levels.iter().map(|l| l.level).collect(),
            index,
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<EmphasisLevel> {
        if rng.gen_bool(self.probability) {
            Some(self.levels[self.index.sample(rng)])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightedLevel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zero_probability_never_emphasises() {
        let config = EmphasisConfig {
            probability: 0.0,
            ..Default::default()
        };
        let sampler = EmphasisSampler::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!((0..1_000).all(|_| sampler.sample(&mut rng).is_none()));
    }

    #[test]
    fn zero_weight_levels_are_never_chosen() {
        let config = EmphasisConfig {
            probability: 1.0,
            levels: vec![
                WeightedLevel {
                    level: EmphasisLevel::Strong,
                    weight: 0.0,
                },
                WeightedLevel {
                    level: EmphasisLevel::Reduced,
                    weight: 2.0,
                },
            ],
        };
        let sampler = EmphasisSampler::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..500 {
            assert_eq!(sampler.sample(&mut rng), Some(EmphasisLevel::Reduced));
        }
    }

    #[test]
    fn default_rate_is_roughly_configured_probability() {
        let sampler = EmphasisSampler::new(&EmphasisConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let hits = (0..10_000)
            .filter(|_| sampler.sample(&mut rng).is_some())
            .count();
        assert!((hits as f64 / 10_000.0 - 0.3).abs() < 0.02);
    }

    #[test]
    fn non_finite_or_out_of_range_probability_is_a_config_error() {
        for probability in [f64::NAN, f64::INFINITY, -0.1, 1.5] {
            let config = EmphasisConfig {
                probability,
                ..Default::default()
            };
            match EmphasisSampler::new(&config).unwrap_err() {
                SoundscapeError::Config { key, .. } => assert_eq!(key, "emphasis.probability"),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn empty_levels_are_a_config_error() {
        let config = EmphasisConfig {
            probability: 0.5,
            levels: vec![],
        };
        assert!(EmphasisSampler::new(&config).unwrap_err().is_config());
    }
}
