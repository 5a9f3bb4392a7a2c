//! # soundscape-rs
//!
//! Personality-driven conversation planning and layered spatial mixing for
//! synthetic multi-speaker soundscapes.
//!
//! ## Features
//!
//! - **Personalities**: per-speaker traits and prosody baselines sampled once per session
//! - **Utterances**: weighted utterance types with rate, pitch and volume modifiers
//! - **Pauses**: micro, comma, thinking and inter-turn pauses scaled by each speaker
//! - **Spatial mixing**: N delayed, panned copies of one stream mixed into a crowd
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! soundscape-rs = { version = "2026.10", features = ["ffmpeg"] }
//! ```
//!
//! ```ignore
//! use std::path::Path;
//! use rand::{rngs::StdRng, SeedableRng};
//! use soundscape_rs::{config::SoundscapeConfig, spatial::{FfmpegEngine, Mixer}, Session};
//!
//! let config = SoundscapeConfig::from_path(Path::new("soundscape.yaml"))?;
//! let mut rng = StdRng::seed_from_u64(42);
//! let session = Session::new(config, &mut rng)?;
//! let plan = session.plan(40, &mut rng)?;
//!
//! // ... synthesize and concatenate `plan` into conversation.wav ...
//!
//! Mixer::new(FfmpegEngine::new()).spatialize(
//!     Path::new("conversation.wav"),
//!     &session.config().spatialization,
//!     Path::new("soundscape.mp3"),
//! )?;
//! # Ok::<(), soundscape_rs::SoundscapeError>(())
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod personality;
pub mod spatial;

use std::path::Path;

pub use config::SoundscapeConfig;
pub use conversation::{PlannedUtterance, Session};
pub use error::{Result, SoundscapeError, Stage};
pub use spatial::{MixLayout, MixOutcome, MixRequest, Mixer};

/// Common interface for audio mixing backends.
///
/// The [`Mixer`] drives the stage: it validates the layers, asks the engine
/// for the stream length, and calls [`MixingEngine::mix`] exactly once with a
/// staging output path.
pub trait MixingEngine {
    /// Length of the conversation stream at `source`, in seconds.
    fn content_length(&self, source: &Path) -> Result<f64>;

    /// Render `request` to `request.output`.
    ///
    /// On error the engine may leave a partial file behind; the mixer removes it.
    fn mix(&self, request: &MixRequest<'_>) -> Result<()>;
}
