use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::sampling::{clip, gaussian};
use crate::config::{
    ProsodyDistribution, ProsodyDistributions, SoundscapeConfig, TraitDistributions,
};
use crate::error::{Result, SoundscapeError};

/// Session-long behavioural traits of one speaker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    /// Chance per turn of laughing.
    pub laughter_frequency: f64,
    /// Chance per turn of an agreement sound.
    pub agreement_frequency: f64,
    /// Phrase-length multiplier.
    pub verbosity: f64,
    /// Pause-length multiplier.
    pub pause_tendency: f64,
}

/// A speaker's long-run prosody centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Speech-rate multiplier.
    pub rate: f64,
    /// Pitch offset in percent.
    pub pitch: f64,
}

/// Everything sampled once for a speaker at session start.
///
/// There are no mutating methods: a record is fixed for the lifetime of the
/// session and can be shared freely between readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalityRecord {
    speaker: String,
    traits: Traits,
    baseline: Baseline,
}

impl PersonalityRecord {
    pub fn new(speaker: impl Into<String>, traits: Traits, baseline: Baseline) -> Self {
        Self {
            speaker: speaker.into(),
            traits,
            baseline,
        }
    }

    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    pub fn traits(&self) -> &Traits {
        &self.traits
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Phrase-length multiplier for the text generator.
    pub fn verbosity(&self) -> f64 {
        self.traits.verbosity
    }

    pub fn should_laugh<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(as_probability(self.traits.laughter_frequency))
    }

    pub fn should_agree<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(as_probability(self.traits.agreement_frequency))
    }
}

/// Frequency as a Bernoulli parameter. NaN counts as never.
fn as_probability(frequency: f64) -> f64 {
    if frequency.is_nan() {
        0.0
    } else {
        frequency.clamp(0.0, 1.0)
    }
}

/// Draws the four personality traits.
pub struct TraitSampler<'a> {
    distributions: &'a TraitDistributions,
}

impl<'a> TraitSampler<'a> {
    pub fn new(distributions: &'a TraitDistributions) -> Self {
        Self { distributions }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Traits {
        let d = self.distributions;
        Traits {
            laughter_frequency: d.laughter_frequency.sample(rng),
            agreement_frequency: d.agreement_frequency.sample(rng),
            verbosity: d.verbosity.sample(rng),
            pause_tendency: d.pause_tendency.sample(rng),
        }
    }
}

/// Draws a speaker's baseline rate and pitch.
pub struct ProsodyBaselineSampler<'a> {
    prosody: &'a ProsodyDistributions,
}

impl<'a> ProsodyBaselineSampler<'a> {
    pub fn new(prosody: &'a ProsodyDistributions) -> Self {
        Self { prosody }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Baseline {
        Baseline {
            rate: sample_baseline(&self.prosody.rate, rng),
            pitch: sample_baseline(&self.prosody.pitch, rng),
        }
    }
}

fn sample_baseline<R: Rng + ?Sized>(dist: &ProsodyDistribution, rng: &mut R) -> f64 {
    clip(
        gaussian(rng, dist.base_mean, dist.per_speaker_std),
        Some(dist.min),
        Some(dist.max),
    )
}

/// Personalities for every speaker of one session, keyed by speaker id.
///
/// Built in one pass at session start; afterwards it only hands out shared
/// references.
#[derive(Debug, Clone, Default)]
pub struct PersonalityRegistry {
    records: BTreeMap<String, PersonalityRecord>,
}

impl PersonalityRegistry {
    /// Sample one record per configured voice, in `config.voices` order.
    ///
    /// A voice listed twice keeps its first record.
    pub fn sample<R: Rng + ?Sized>(config: &SoundscapeConfig, rng: &mut R) -> Self {
        let traits = TraitSampler::new(&config.traits);
        let baselines = ProsodyBaselineSampler::new(&config.prosody);

        let mut records = BTreeMap::new();
        for voice in &config.voices {
            if records.contains_key(voice) {
                log::debug!("Voice '{voice}' listed more than once, keeping first personality");
                continue;
            }
            let record =
                PersonalityRecord::new(voice.clone(), traits.sample(rng), baselines.sample(rng));
            log::info!(
                "Personality for '{}': laughter={:.2} agreement={:.2} verbosity={:.2} \
                 pause={:.2} rate={:.2} pitch={:+.1}%",
                voice,
                record.traits.laughter_frequency,
                record.traits.agreement_frequency,
                record.traits.verbosity,
                record.traits.pause_tendency,
                record.baseline.rate,
                record.baseline.pitch,
            );
            records.insert(voice.clone(), record);
        }

        Self { records }
    }

    /// Build a registry from records sampled elsewhere.
    pub fn from_records<I: IntoIterator<Item = PersonalityRecord>>(records: I) -> Self {
        let mut map = BTreeMap::new();
        for record in records {
            map.entry(record.speaker.clone()).or_insert(record);
        }
        Self { records: map }
    }

    pub fn get(&self, speaker: &str) -> Result<&PersonalityRecord> {
        self.records
            .get(speaker)
            .ok_or_else(|| SoundscapeError::UnknownSpeaker(speaker.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PersonalityRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
