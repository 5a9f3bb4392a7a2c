use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::sampling::{clip, gaussian};
use super::traits::PersonalityRecord;
use crate::config::{PauseDistribution, PauseDistributions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseKind {
    /// Short break between words.
    Micro,
    Comma,
    /// Hesitation before a thinking sound.
    Thinking,
    /// Gap between two speakers' turns.
    InterTurn,
}

impl PauseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PauseKind::Micro => "micro",
            PauseKind::Comma => "comma",
            PauseKind::Thinking => "thinking",
            PauseKind::InterTurn => "inter_turn",
        }
    }
}

impl fmt::Display for PauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pause durations scaled by the speaker's pause tendency.
pub struct PauseSampler<'a> {
    pauses: &'a PauseDistributions,
}

impl<'a> PauseSampler<'a> {
    pub fn new(pauses: &'a PauseDistributions) -> Self {
        Self { pauses }
    }

    pub fn distribution(&self, kind: PauseKind) -> &PauseDistribution {
        match kind {
            PauseKind::Micro => &self.pauses.micro,
            PauseKind::Comma => &self.pauses.comma,
            PauseKind::Thinking => &self.pauses.thinking,
            PauseKind::InterTurn => &self.pauses.inter_turn,
        }
    }

    /// Duration in seconds.
    ///
    /// The raw draw is floored at `min`, multiplied by the speaker's
    /// `pause_tendency`, then capped at `max`. The floor is not re-applied
    /// after scaling: a speaker with tendency below 1 can pause for less than
    /// `min`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        kind: PauseKind,
        speaker: &PersonalityRecord,
        rng: &mut R,
    ) -> f64 {
        let dist = self.distribution(kind);
        let floored = clip(gaussian(rng, dist.mean, dist.std), Some(dist.min), None);
        clip(floored * speaker.traits().pause_tendency, None, dist.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personality::traits::{Baseline, Traits};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn speaker(pause_tendency: f64) -> PersonalityRecord {
        PersonalityRecord::new(
            "ava",
            Traits {
                laughter_frequency: 0.1,
                agreement_frequency: 0.2,
                verbosity: 1.0,
                pause_tendency,
            },
            Baseline {
                rate: 0.85,
                pitch: 0.0,
            },
        )
    }

    #[test]
    fn low_tendency_can_go_below_category_min() {
        let pauses = PauseDistributions {
            comma: PauseDistribution {
                mean: 0.6,
                std: 0.2,
                min: 0.5,
                max: None,
            },
            ..Default::default()
        };
        let sampler = PauseSampler::new(&pauses);
        let record = speaker(0.5);
        let mut rng = StdRng::seed_from_u64(12);

        let draws: Vec<f64> = (0..500)
            .map(|_| sampler.sample(PauseKind::Comma, &record, &mut rng))
            .collect();
        assert!(draws.iter().any(|&d| d < 0.5));
        assert!(draws.iter().all(|&d| d >= 0.25), "floor is min * tendency");
    }

    #[test]
    fn high_tendency_is_capped_at_max() {
        let sampler_config = PauseDistributions::default();
        let sampler = PauseSampler::new(&sampler_config);
        let record = speaker(1.3);
        let mut rng = StdRng::seed_from_u64(99);
        let max = sampler_config.inter_turn.max.unwrap();

        for _ in 0..2_000 {
            let d = sampler.sample(PauseKind::InterTurn, &record, &mut rng);
            assert!(d <= max, "{d} above {max}");
        }
    }

    #[test]
    fn uncapped_category_scales_with_tendency() {
        let pauses = PauseDistributions {
            thinking: PauseDistribution {
                mean: 1.0,
                std: 0.0,
                min: 0.1,
                max: None,
            },
            ..Default::default()
        };
        let sampler = PauseSampler::new(&pauses);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(sampler.sample(PauseKind::Thinking, &speaker(1.25), &mut rng), 1.25);
    }

    #[test]
    fn pauses_stay_within_scaled_bounds() {
        let pauses = PauseDistributions::default();
        let sampler = PauseSampler::new(&pauses);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            for tendency in [0.7, 1.0, 1.3] {
                let record = speaker(tendency);
                for kind in [
                    PauseKind::Micro,
                    PauseKind::Comma,
                    PauseKind::Thinking,
                    PauseKind::InterTurn,
                ] {
                    let dist = sampler.distribution(kind);
                    let d = sampler.sample(kind, &record, &mut rng);
                    assert!(d >= dist.min * tendency - 1e-12);
                    if let Some(max) = dist.max {
                        assert!(d <= max);
                    }
                }
            }
        }
    }
}
