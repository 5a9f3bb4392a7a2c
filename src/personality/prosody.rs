use std::fmt;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::sampling::{clip, gaussian};
use super::traits::PersonalityRecord;
use crate::config::{ProsodyDistributions, TypeModifiers, TypeProbabilities};
use crate::error::{Result, SoundscapeError};

/// The closed set of utterance categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtteranceType {
    Thinking,
    Agreement,
    Laughter,
    Question,
    Normal,
}

impl UtteranceType {
    /// Selection order; `Normal` is last and takes the remainder.
    pub const ALL: [UtteranceType; 5] = [
        UtteranceType::Thinking,
        UtteranceType::Agreement,
        UtteranceType::Laughter,
        UtteranceType::Question,
        UtteranceType::Normal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UtteranceType::Thinking => "thinking",
            UtteranceType::Agreement => "agreement",
            UtteranceType::Laughter => "laughter",
            UtteranceType::Question => "question",
            UtteranceType::Normal => "normal",
        }
    }
}

impl fmt::Display for UtteranceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markup volume level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Volume {
    XSoft,
    Soft,
    Medium,
    Loud,
    XLoud,
}

impl Volume {
    pub fn as_str(&self) -> &'static str {
        match self {
            Volume::XSoft => "x-soft",
            Volume::Soft => "soft",
            Volume::Medium => "medium",
            Volume::Loud => "loud",
            Volume::XLoud => "x-loud",
        }
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete prosody for one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prosody {
    /// Speech-rate multiplier.
    pub rate: f64,
    /// Pitch offset in percent.
    pub pitch: f64,
    pub volume: Volume,
}

/// What the markup collaborator receives for each utterance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtteranceSpec {
    #[serde(rename = "type")]
    pub kind: UtteranceType,
    pub prosody: Prosody,
}

/// Weighted categorical draw over [`UtteranceType::ALL`].
///
/// `Normal` is weighted with `1 - (thinking + agreement + laughter + question)`.
/// Configurations whose leading probabilities exceed 1 are rejected here as
/// well as at load time.
#[derive(Debug, Clone)]
pub struct UtteranceTypeSelector {
    index: WeightedIndex<f64>,
}

impl UtteranceTypeSelector {
    pub fn new(probabilities: &TypeProbabilities) -> Result<Self> {
        let leading = [
            probabilities.thinking,
            probabilities.agreement,
            probabilities.laughter,
            probabilities.question,
        ];
        if leading.iter().sum::<f64>() > 1.0 + 1e-9 {
            return Err(SoundscapeError::config(
                "utterance_types.probabilities",
                "leading probabilities sum above 1",
            ));
        }

        let weights = [
            leading[0],
            leading[1],
            leading[2],
            leading[3],
            probabilities.remainder(),
        ];
        let index = WeightedIndex::new(weights).map_err(|e| {
            SoundscapeError::config("utterance_types.probabilities", e.to_string())
        })?;
        Ok(Self { index })
    }

    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> UtteranceType {
        UtteranceType::ALL[self.index.sample(rng)]
    }
}

/// Derives per-utterance prosody from a speaker's baseline.
pub struct ProsodySampler<'a> {
    prosody: &'a ProsodyDistributions,
    modifiers: &'a TypeModifiers,
}

impl<'a> ProsodySampler<'a> {
    pub fn new(prosody: &'a ProsodyDistributions, modifiers: &'a TypeModifiers) -> Self {
        Self { prosody, modifiers }
    }

    /// Type modifiers are applied before the final clip, so a modifier that
    /// pushes past the global bound is truncated to it.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        speaker: &PersonalityRecord,
        kind: UtteranceType,
        rng: &mut R,
    ) -> Prosody {
        let modifier = self.modifiers.get(kind);
        let baseline = speaker.baseline();
        let rate_dist = &self.prosody.rate;
        let pitch_dist = &self.prosody.pitch;

        let rate =
            gaussian(rng, baseline.rate, rate_dist.per_utterance_std) * modifier.rate_factor();
        let pitch =
            gaussian(rng, baseline.pitch, pitch_dist.per_utterance_std) + modifier.pitch_boost();

        let volume = match modifier.volume {
            Some(volume) => volume,
            None if rng.gen_bool(0.5) => Volume::Soft,
            None => Volume::Medium,
        };

        Prosody {
            rate: clip(rate, Some(rate_dist.min), Some(rate_dist.max)),
            pitch: clip(pitch, Some(pitch_dist.min), Some(pitch_dist.max)),
            volume,
        }
    }

    /// Pick a type with `selector` and derive its prosody.
    pub fn utterance<R: Rng + ?Sized>(
        &self,
        speaker: &PersonalityRecord,
        selector: &UtteranceTypeSelector,
        rng: &mut R,
    ) -> UtteranceSpec {
        let kind = selector.select(rng);
        let prosody = self.sample(speaker, kind, rng);
        log::debug!(
            "{} ({kind}): rate={:.3} pitch={:+.1}% volume={}",
            speaker.speaker(),
            prosody.rate,
            prosody.pitch,
            prosody.volume
        );
        UtteranceSpec { kind, prosody }
    }
}
