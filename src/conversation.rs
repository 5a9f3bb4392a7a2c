//! Session-level planning of a conversation.
//!
//! A [`Session`] owns the validated configuration and the personalities drawn
//! for it. Planning picks a speaker for every turn and derives the per-utterance
//! parameters the text, markup and TTS collaborators need; it produces no
//! audio itself.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::config::SoundscapeConfig;
use crate::error::{Result, SoundscapeError};
use crate::personality::{
    EmphasisSampler, PauseKind, PauseSampler, PersonalityRecord, PersonalityRegistry,
    ProsodySampler, UtteranceSpec, UtteranceType, UtteranceTypeSelector,
};

/// One turn of the planned conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedUtterance {
    pub index: usize,
    pub speaker: String,
    #[serde(flatten)]
    pub spec: UtteranceSpec,
    /// Hesitation before the utterance, for thinking sounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_in: Option<f64>,
    /// Silence until the next turn. `None` for the final turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_after: Option<f64>,
}

pub struct Session {
    config: SoundscapeConfig,
    registry: PersonalityRegistry,
    selector: UtteranceTypeSelector,
    emphasis: EmphasisSampler,
}

impl Session {
    /// Validate `config` and sample every speaker's personality.
    pub fn new<R: Rng + ?Sized>(config: SoundscapeConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let selector = UtteranceTypeSelector::new(&config.utterance_types.probabilities)?;
        let emphasis = EmphasisSampler::new(&config.emphasis)?;
        let registry = PersonalityRegistry::sample(&config, rng);
        log::info!("Session started with {} speakers", registry.len());
        Ok(Self {
            config,
            registry,
            selector,
            emphasis,
        })
    }

    pub fn config(&self) -> &SoundscapeConfig {
        &self.config
    }

    pub fn personalities(&self) -> &PersonalityRegistry {
        &self.registry
    }

    pub fn personality(&self, speaker: &str) -> Result<&PersonalityRecord> {
        self.registry.get(speaker)
    }

    pub fn prosody_sampler(&self) -> ProsodySampler<'_> {
        ProsodySampler::new(
            &self.config.prosody,
            &self.config.utterance_types.modifiers,
        )
    }

    pub fn pause_sampler(&self) -> PauseSampler<'_> {
        PauseSampler::new(&self.config.pauses)
    }

    pub fn emphasis_sampler(&self) -> &EmphasisSampler {
        &self.emphasis
    }

    /// Draw a single utterance for `speaker`.
    pub fn utterance<R: Rng + ?Sized>(
        &self,
        speaker: &str,
        rng: &mut R,
    ) -> Result<UtteranceSpec> {
        let record = self.registry.get(speaker)?;
        Ok(self.prosody_sampler().utterance(record, &self.selector, rng))
    }

    /// Plan `turns` utterances with uniformly chosen speakers.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        turns: usize,
        rng: &mut R,
    ) -> Result<Vec<PlannedUtterance>> {
        let prosody = self.prosody_sampler();
        let pauses = self.pause_sampler();
        let mut plan = Vec::with_capacity(turns);

        for index in 0..turns {
            let speaker = self.config.voices.choose(rng).ok_or_else(|| {
                SoundscapeError::config("voices", "at least one voice is required")
            })?;
            let record = self.registry.get(speaker)?;
            let spec = prosody.utterance(record, &self.selector, rng);

            let lead_in = (spec.kind == UtteranceType::Thinking)
                .then(|| pauses.sample(PauseKind::Thinking, record, rng));
            let pause_after = (index + 1 < turns)
                .then(|| pauses.sample(PauseKind::InterTurn, record, rng));

            plan.push(PlannedUtterance {
                index,
                speaker: speaker.clone(),
                spec,
                lead_in,
                pause_after,
            });
        }

        log::info!("Planned {} utterances", plan.len());
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session(seed: u64) -> (Session, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = SoundscapeConfig::with_voices(["ava", "ben", "cleo"]);
        let session = Session::new(config, &mut rng).unwrap();
        (session, rng)
    }

    #[test]
    fn plan_is_reproducible_for_a_seed() {
        let (a, mut rng_a) = session(42);
        let (b, mut rng_b) = session(42);
        assert_eq!(
            a.plan(25, &mut rng_a).unwrap(),
            b.plan(25, &mut rng_b).unwrap()
        );
    }

    #[test]
    fn only_the_last_turn_has_no_pause_after() {
        let (session, mut rng) = session(1);
        let plan = session.plan(10, &mut rng).unwrap();
        assert_eq!(plan.len(), 10);
        assert!(plan[..9].iter().all(|u| u.pause_after.is_some()));
        assert!(plan[9].pause_after.is_none());
    }

    #[test]
    fn lead_in_only_for_thinking() {
        let (session, mut rng) = session(7);
        let plan = session.plan(200, &mut rng).unwrap();
        for u in &plan {
            assert_eq!(u.lead_in.is_some(), u.spec.kind == UtteranceType::Thinking);
        }
        assert!(plan.iter().any(|u| u.lead_in.is_some()));
    }

    #[test]
    fn personalities_do_not_change_across_plans() {
        let (session, mut rng) = session(3);
        let before: Vec<_> = session.personalities().iter().cloned().collect();
        session.plan(50, &mut rng).unwrap();
        session.plan(50, &mut rng).unwrap();
        let after: Vec<_> = session.personalities().iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn invalid_config_fails_before_sampling() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut config = SoundscapeConfig::with_voices(["ava"]);
        config.spatialization.num_layers = 3;
        config.spatialization.volume_adjustments = vec![0.5, 0.5];
        let err = Session::new(config, &mut rng).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn unknown_speaker_is_reported() {
        let (session, mut rng) = session(2);
        assert!(matches!(
            session.utterance("nobody", &mut rng),
            Err(SoundscapeError::UnknownSpeaker(_))
        ));
    }

    #[test]
    fn plan_serializes_flat() {
        let (session, mut rng) = session(5);
        let plan = session.plan(2, &mut rng).unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        assert!(json[0]["type"].is_string());
        assert!(json[0]["prosody"]["rate"].is_number());
        assert!(json[0]["pause_after"].is_number());
        assert!(json[1].get("pause_after").is_none());
    }
}
