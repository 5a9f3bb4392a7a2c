//! Layered spatial mixing of a finished conversation stream.
//!
//! The stream is read `num_layers` times. Each read is delayed, gain-scaled
//! and panned with the linear law in [`linear_pan`], then all reads are summed
//! into one file whose length is set by the latest-ending layer. The actual
//! audio work is delegated to a [`MixingEngine`](crate::MixingEngine); with the
//! `ffmpeg` feature enabled, [`FfmpegEngine`] drives the ffmpeg CLI.

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod layer;
pub mod mixer;
pub mod probe;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegEngine, FfmpegOptions, FfmpegOptionsBuilder};
pub use layer::{linear_pan, mix_duration, ChannelGains, SpatialLayer, SpatialLayerBuilder};
pub use mixer::{staging_path, MixLayout, MixOutcome, MixRequest, Mixer};
