//! Typed configuration for a soundscape session.
//!
//! Every distribution the samplers consult is declared here once and checked by
//! [`SoundscapeConfig::validate`] before any sampling begins. Sections that are
//! omitted from the file fall back to the defaults below; only `voices` is
//! required.
//!
//! ```yaml
//! voices: [ava, ben, cleo]
//! utterance_types:
//!   probabilities: { thinking: 0.1, agreement: 0.15, laughter: 0.05, question: 0.15 }
//! spatialization:
//!   num_layers: 2
//!   stereo_positions: [-0.5, 0.5]
//!   volume_adjustments: [0.7, 0.7]
//!   time_offsets: [0.0, 7.5]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoundscapeError};
use crate::personality::{EmphasisLevel, UtteranceType, Volume};
use crate::spatial::MixLayout;

/// Floating-point slack when checking that probabilities fit in `[0, 1]`.
const PROBABILITY_EPSILON: f64 = 1e-9;

/// A Gaussian with optional clip bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gaussian {
    pub mean: f64,
    pub std: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Gaussian {
    pub const fn unbounded(mean: f64, std: f64) -> Self {
        Self {
            mean,
            std,
            min: None,
            max: None,
        }
    }

    pub const fn bounded(mean: f64, std: f64, min: f64, max: f64) -> Self {
        Self {
            mean,
            std,
            min: Some(min),
            max: Some(max),
        }
    }

    fn validate(&self, key: &str) -> Result<()> {
        check_finite(key, "mean", self.mean)?;
        check_std(key, self.std)?;
        check_bounds(key, self.min, self.max)?;
        match (self.min, self.max) {
            (None, Some(hi)) if hi < 0.0 => Err(SoundscapeError::config(
                format!("{key}.max"),
                format!("max {hi} is below the implicit floor of 0"),
            )),
            _ => Ok(()),
        }
    }

    /// Rejects a declared `min` below `floor`, or equal to it when `strict`.
    fn validate_floor(&self, key: &str, floor: f64, strict: bool) -> Result<()> {
        match self.min {
            Some(lo) if lo < floor || (strict && lo == floor) => Err(SoundscapeError::config(
                format!("{key}.min"),
                format!(
                    "min {lo} must be {} {floor}",
                    if strict { "greater than" } else { "at least" }
                ),
            )),
            _ => Ok(()),
        }
    }
}

/// Session-long speaker traits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitDistributions {
    pub laughter_frequency: Gaussian,
    pub agreement_frequency: Gaussian,
    pub verbosity: Gaussian,
    pub pause_tendency: Gaussian,
}

impl TraitDistributions {
    fn validate(&self) -> Result<()> {
        let non_negative = [
            ("traits.laughter_frequency", &self.laughter_frequency),
            ("traits.agreement_frequency", &self.agreement_frequency),
            ("traits.verbosity", &self.verbosity),
        ];
        for (key, dist) in non_negative {
            dist.validate(key)?;
            dist.validate_floor(key, 0.0, false)?;
        }
        self.pause_tendency.validate("traits.pause_tendency")?;
        self.pause_tendency
            .validate_floor("traits.pause_tendency", 0.0, true)
    }
}

impl Default for TraitDistributions {
    fn default() -> Self {
        Self {
            laughter_frequency: Gaussian::unbounded(0.15, 0.08),
            agreement_frequency: Gaussian::unbounded(0.25, 0.10),
            verbosity: Gaussian::bounded(1.0, 0.2, 0.7, 1.4),
            pause_tendency: Gaussian::bounded(1.0, 0.15, 0.7, 1.3),
        }
    }
}

/// A prosodic parameter with a per-speaker centre and per-utterance jitter.
///
/// `min`/`max` bound both the speaker baseline and every utterance value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProsodyDistribution {
    /// Population mean of the speaker baselines.
    pub base_mean: f64,
    /// Spread of baselines across speakers.
    pub per_speaker_std: f64,
    /// Spread of single utterances around the speaker's baseline.
    pub per_utterance_std: f64,
    pub min: f64,
    pub max: f64,
}

impl ProsodyDistribution {
    fn validate(&self, key: &str) -> Result<()> {
        check_finite(key, "base_mean", self.base_mean)?;
        check_std(&format!("{key}.per_speaker_std"), self.per_speaker_std)?;
        check_std(&format!("{key}.per_utterance_std"), self.per_utterance_std)?;
        check_finite(key, "min", self.min)?;
        check_finite(key, "max", self.max)?;
        check_bounds(key, Some(self.min), Some(self.max))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProsodyDistributions {
    /// Speech-rate multiplier.
    pub rate: ProsodyDistribution,
    /// Pitch offset in percent.
    pub pitch: ProsodyDistribution,
}

impl Default for ProsodyDistributions {
    fn default() -> Self {
        Self {
            rate: ProsodyDistribution {
                base_mean: 0.85,
                per_speaker_std: 0.10,
                per_utterance_std: 0.03,
                min: 0.70,
                max: 1.00,
            },
            pitch: ProsodyDistribution {
                base_mean: 0.0,
                per_speaker_std: 8.0,
                per_utterance_std: 3.0,
                min: -15.0,
                max: 15.0,
            },
        }
    }
}

fn default_pause_min() -> f64 {
    0.1
}

/// Duration distribution (seconds) for one pause category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PauseDistribution {
    pub mean: f64,
    pub std: f64,
    /// Floor applied to the raw draw, before the speaker's pause tendency.
    #[serde(default = "default_pause_min")]
    pub min: f64,
    /// Ceiling applied after the speaker's pause tendency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl PauseDistribution {
    fn validate(&self, key: &str) -> Result<()> {
        check_finite(key, "mean", self.mean)?;
        check_std(key, self.std)?;
        check_finite(key, "min", self.min)?;
        check_bounds(key, Some(self.min), self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PauseDistributions {
    pub micro: PauseDistribution,
    pub comma: PauseDistribution,
    pub thinking: PauseDistribution,
    pub inter_turn: PauseDistribution,
}

impl Default for PauseDistributions {
    fn default() -> Self {
        Self {
            micro: PauseDistribution {
                mean: 0.3,
                std: 0.1,
                min: 0.1,
                max: Some(0.6),
            },
            comma: PauseDistribution {
                mean: 0.4,
                std: 0.15,
                min: 0.1,
                max: None,
            },
            thinking: PauseDistribution {
                mean: 0.8,
                std: 0.3,
                min: 0.1,
                max: None,
            },
            inter_turn: PauseDistribution {
                mean: 1.2,
                std: 0.5,
                min: 0.5,
                max: Some(3.0),
            },
        }
    }
}

/// Probabilities of the leading utterance types. `normal` receives whatever
/// mass the other four leave over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeProbabilities {
    pub thinking: f64,
    pub agreement: f64,
    pub laughter: f64,
    pub question: f64,
    /// Informational only. A value that disagrees with the remainder is logged
    /// and ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal: Option<f64>,
}

impl Default for TypeProbabilities {
    fn default() -> Self {
        Self {
            thinking: 0.10,
            agreement: 0.15,
            laughter: 0.05,
            question: 0.15,
            normal: None,
        }
    }
}

impl TypeProbabilities {
    /// Mass left for `normal` utterances.
    pub fn remainder(&self) -> f64 {
        (1.0 - self.leading_sum()).max(0.0)
    }

    fn leading_sum(&self) -> f64 {
        self.thinking + self.agreement + self.laughter + self.question
    }

    fn validate(&self) -> Result<()> {
        let named = [
            ("thinking", self.thinking),
            ("agreement", self.agreement),
            ("laughter", self.laughter),
            ("question", self.question),
        ];
        for (name, p) in named {
            check_probability(&format!("utterance_types.probabilities.{name}"), p)?;
        }

        let sum = self.leading_sum();
        if sum > 1.0 + PROBABILITY_EPSILON {
            return Err(SoundscapeError::config(
                "utterance_types.probabilities",
                format!(
                    "thinking + agreement + laughter + question = {sum:.4} exceeds 1; \
                     `normal` would be unreachable"
                ),
            ));
        }

        if let Some(normal) = self.normal {
            check_probability("utterance_types.probabilities.normal", normal)?;
            if (normal - self.remainder()).abs() > 1e-6 {
                log::warn!(
                    "utterance_types.probabilities.normal = {normal} ignored; \
                     normal utterances take the remaining {:.4}",
                    self.remainder()
                );
            }
        }
        Ok(())
    }
}

/// Prosody adjustment applied to one utterance type. Absent fields are no-ops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeModifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_boost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,
}

impl TypeModifier {
    pub fn rate_factor(&self) -> f64 {
        self.rate_factor.unwrap_or(1.0)
    }

    pub fn pitch_boost(&self) -> f64 {
        self.pitch_boost.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeModifiers {
    pub thinking: TypeModifier,
    pub agreement: TypeModifier,
    pub laughter: TypeModifier,
    pub question: TypeModifier,
    pub normal: TypeModifier,
}

impl Default for TypeModifiers {
    fn default() -> Self {
        Self {
            thinking: TypeModifier {
                rate_factor: Some(0.85),
                ..Default::default()
            },
            agreement: TypeModifier {
                rate_factor: Some(0.9),
                volume: Some(Volume::Soft),
                ..Default::default()
            },
            laughter: TypeModifier::default(),
            question: TypeModifier {
                rate_factor: Some(1.05),
                pitch_boost: Some(15.0),
                ..Default::default()
            },
            normal: TypeModifier::default(),
        }
    }
}

impl TypeModifiers {
    pub fn get(&self, kind: UtteranceType) -> &TypeModifier {
        match kind {
            UtteranceType::Thinking => &self.thinking,
            UtteranceType::Agreement => &self.agreement,
            UtteranceType::Laughter => &self.laughter,
            UtteranceType::Question => &self.question,
            UtteranceType::Normal => &self.normal,
        }
    }

    fn validate(&self) -> Result<()> {
        for kind in UtteranceType::ALL {
            let modifier = self.get(kind);
            let key = format!("utterance_types.modifiers.{}", kind.as_str());
            if let Some(factor) = modifier.rate_factor {
                check_finite(&key, "rate_factor", factor)?;
                if factor <= 0.0 {
                    return Err(SoundscapeError::config(
                        format!("{key}.rate_factor"),
                        format!("must be positive, got {factor}"),
                    ));
                }
            }
            if let Some(boost) = modifier.pitch_boost {
                check_finite(&key, "pitch_boost", boost)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtteranceTypes {
    pub probabilities: TypeProbabilities,
    pub modifiers: TypeModifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedLevel {
    pub level: EmphasisLevel,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmphasisConfig {
    /// Chance that a given word is emphasised at all.
    pub probability: f64,
    pub levels: Vec<WeightedLevel>,
}

impl Default for EmphasisConfig {
    fn default() -> Self {
        Self {
            probability: 0.3,
            levels: vec![
                WeightedLevel {
                    level: EmphasisLevel::Moderate,
                    weight: 0.6,
                },
                WeightedLevel {
                    level: EmphasisLevel::Strong,
                    weight: 0.2,
                },
                WeightedLevel {
                    level: EmphasisLevel::Reduced,
                    weight: 0.2,
                },
            ],
        }
    }
}

impl EmphasisConfig {
    fn validate(&self) -> Result<()> {
        check_probability("emphasis.probability", self.probability)?;
        if self.levels.is_empty() {
            return Err(SoundscapeError::config(
                "emphasis.levels",
                "at least one level is required",
            ));
        }
        let mut total = 0.0;
        for (i, level) in self.levels.iter().enumerate() {
            let key = format!("emphasis.levels[{i}]");
            check_finite(&key, "weight", level.weight)?;
            if level.weight < 0.0 {
                return Err(SoundscapeError::config(
                    format!("{key}.weight"),
                    "must not be negative",
                ));
            }
            total += level.weight;
        }
        if total <= 0.0 {
            return Err(SoundscapeError::config(
                "emphasis.levels",
                "weights must sum to a positive value",
            ));
        }
        Ok(())
    }
}

/// Per-layer parallel arrays for the spatial mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatializationConfig {
    pub num_layers: usize,
    /// Pan per layer, `-1.0` hard left to `1.0` hard right.
    pub stereo_positions: Vec<f64>,
    /// Linear gain per layer in `[0, 1]`.
    pub volume_adjustments: Vec<f64>,
    /// Seconds of silence before each layer starts.
    pub time_offsets: Vec<f64>,
    pub layout: MixLayout,
}

impl Default for SpatializationConfig {
    fn default() -> Self {
        Self {
            num_layers: 3,
            stereo_positions: vec![-0.7, 0.0, 0.7],
            volume_adjustments: vec![0.6, 0.8, 0.6],
            time_offsets: vec![0.0, 5.0, 10.0],
            layout: MixLayout::Stereo,
        }
    }
}

impl SpatializationConfig {
    /// Check array shapes and per-layer ranges.
    pub fn validate(&self) -> Result<()> {
        if self.num_layers == 0 {
            return Err(SoundscapeError::config(
                "spatialization.num_layers",
                "at least one layer is required",
            ));
        }

        let arrays = [
            ("stereo_positions", &self.stereo_positions),
            ("volume_adjustments", &self.volume_adjustments),
            ("time_offsets", &self.time_offsets),
        ];
        for (name, values) in arrays {
            if values.len() != self.num_layers {
                return Err(SoundscapeError::config(
                    format!("spatialization.{name}"),
                    format!(
                        "has {} entries but num_layers is {}",
                        values.len(),
                        self.num_layers
                    ),
                ));
            }
        }

        for i in 0..self.num_layers {
            let pan = self.stereo_positions[i];
            if !(-1.0..=1.0).contains(&pan) {
                return Err(SoundscapeError::config(
                    format!("spatialization.stereo_positions[{i}]"),
                    format!("pan {pan} outside [-1, 1]"),
                ));
            }
            let gain = self.volume_adjustments[i];
            if !(0.0..=1.0).contains(&gain) {
                return Err(SoundscapeError::config(
                    format!("spatialization.volume_adjustments[{i}]"),
                    format!("gain {gain} outside [0, 1]"),
                ));
            }
            let offset = self.time_offsets[i];
            if !offset.is_finite() || offset < 0.0 {
                return Err(SoundscapeError::config(
                    format!("spatialization.time_offsets[{i}]"),
                    format!("offset {offset} must be a non-negative number of seconds"),
                ));
            }
        }
        Ok(())
    }
}

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundscapeConfig {
    /// Speaker ids; one personality is sampled per entry.
    pub voices: Vec<String>,
    #[serde(default)]
    pub traits: TraitDistributions,
    #[serde(default)]
    pub prosody: ProsodyDistributions,
    #[serde(default)]
    pub utterance_types: UtteranceTypes,
    #[serde(default)]
    pub pauses: PauseDistributions,
    #[serde(default)]
    pub emphasis: EmphasisConfig,
    #[serde(default)]
    pub spatialization: SpatializationConfig,
}

impl SoundscapeConfig {
    /// Config with default distributions for the given speakers.
    pub fn with_voices<I, S>(voices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            voices: voices.into_iter().map(Into::into).collect(),
            traits: TraitDistributions::default(),
            prosody: ProsodyDistributions::default(),
            utterance_types: UtteranceTypes::default(),
            pauses: PauseDistributions::default(),
            emphasis: EmphasisConfig::default(),
            spatialization: SpatializationConfig::default(),
        }
    }

    /// Load and validate a config file. `.json` is read as JSON, everything
    /// else as YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        log::info!("Loading soundscape config from {}", path.display());
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject any configuration the samplers or the mixer could not honour.
    pub fn validate(&self) -> Result<()> {
        if self.voices.is_empty() {
            return Err(SoundscapeError::config("voices", "at least one voice is required"));
        }
        if let Some(i) = self.voices.iter().position(|v| v.trim().is_empty()) {
            return Err(SoundscapeError::config(
                format!("voices[{i}]"),
                "voice id must not be empty",
            ));
        }

        self.traits.validate()?;

        self.prosody.rate.validate("prosody.rate")?;
        self.prosody.pitch.validate("prosody.pitch")?;

        self.pauses.micro.validate("pauses.micro")?;
        self.pauses.comma.validate("pauses.comma")?;
        self.pauses.thinking.validate("pauses.thinking")?;
        self.pauses.inter_turn.validate("pauses.inter_turn")?;

        self.utterance_types.probabilities.validate()?;
        self.utterance_types.modifiers.validate()?;
        self.emphasis.validate()?;
        self.spatialization.validate()
    }
}

fn check_finite(key: &str, field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SoundscapeError::config(
            format!("{key}.{field}"),
            format!("must be finite, got {value}"),
        ))
    }
}

fn check_std(key: &str, std: f64) -> Result<()> {
    if std.is_finite() && std >= 0.0 {
        Ok(())
    } else {
        Err(SoundscapeError::config(
            key,
            format!("standard deviation must be finite and non-negative, got {std}"),
        ))
    }
}

fn check_bounds(key: &str, min: Option<f64>, max: Option<f64>) -> Result<()> {
    for (field, bound) in [("min", min), ("max", max)] {
        if let Some(value) = bound {
            check_finite(key, field, value)?;
        }
    }
    match (min, max) {
        (Some(lo), Some(hi)) if lo > hi => Err(SoundscapeError::config(
            key,
            format!("min {lo} is greater than max {hi}"),
        )),
        _ => Ok(()),
    }
}

fn check_probability(key: &str, p: f64) -> Result<()> {
    if p.is_finite() && (-PROBABILITY_EPSILON..=1.0 + PROBABILITY_EPSILON).contains(&p) {
        Ok(())
    } else {
        Err(SoundscapeError::config(
            key,
            format!("probability {p} outside [0, 1]"),
        ))
    }
}
