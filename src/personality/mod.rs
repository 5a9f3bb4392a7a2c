//! Speaker personality and per-utterance prosody.
//!
//! Sampling happens at two time scales:
//!
//! - **Session**: [`PersonalityRegistry::sample`] draws [`Traits`] and a prosody
//!   [`Baseline`] for every voice once. The resulting [`PersonalityRecord`]s are
//!   never re-sampled.
//! - **Utterance**: [`UtteranceTypeSelector`], [`ProsodySampler`] and
//!   [`PauseSampler`] vary each utterance around the speaker's record.
//!
//! Every sampler takes the random source as an argument, so a seeded RNG
//! reproduces a session exactly:
//!
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//! use soundscape_rs::config::SoundscapeConfig;
//! use soundscape_rs::personality::{PersonalityRegistry, ProsodySampler, UtteranceTypeSelector};
//!
//! let config = SoundscapeConfig::with_voices(["ava", "ben"]);
//! let mut rng = StdRng::seed_from_u64(7);
//! let registry = PersonalityRegistry::sample(&config, &mut rng);
//!
//! let selector = UtteranceTypeSelector::new(&config.utterance_types.probabilities)?;
//! let prosody = ProsodySampler::new(&config.prosody, &config.utterance_types.modifiers);
//! let spec = prosody.utterance(registry.get("ava")?, &selector, &mut rng);
//! assert!(spec.prosody.rate >= config.prosody.rate.min);
//! # Ok::<(), soundscape_rs::SoundscapeError>(())
//! ```

pub mod emphasis;
pub mod pause;
pub mod prosody;
pub mod sampling;
pub mod traits;

pub use emphasis::{EmphasisLevel, EmphasisSampler};
pub use pause::{PauseKind, PauseSampler};
pub use prosody::{
    Prosody, ProsodySampler, UtteranceSpec, UtteranceType, UtteranceTypeSelector, Volume,
};
pub use traits::{
    Baseline, PersonalityRecord, PersonalityRegistry, ProsodyBaselineSampler, TraitSampler,
    Traits,
};
