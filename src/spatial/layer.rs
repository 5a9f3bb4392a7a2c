use std::path::Path;

use crate::config::SpatializationConfig;
use crate::error::Result;

/// Left/right channel gains of one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelGains {
    pub left: f64,
    pub right: f64,
}

/// Linear pan law: `left = (1 - pan) / 2 * gain`, `right = (1 + pan) / 2 * gain`.
///
/// This is not equal-power. A centred layer sums to the same amplitude as a
/// hard-panned one, so it is perceived roughly 3 dB quieter.
pub fn linear_pan(pan: f64, gain: f64) -> ChannelGains {
    ChannelGains {
        left: (1.0 - pan) / 2.0 * gain,
        right: (1.0 + pan) / 2.0 * gain,
    }
}

/// One delayed, panned and gain-scaled read of the shared conversation stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialLayer<'a> {
    pub index: usize,
    /// `-1.0` hard left to `1.0` hard right.
    pub pan: f64,
    pub gain: f64,
    /// Seconds of silence before this layer starts.
    pub time_offset: f64,
    /// Every layer of a mix points at the same stream.
    pub source: &'a Path,
}

impl SpatialLayer<'_> {
    pub fn channel_gains(&self) -> ChannelGains {
        linear_pan(self.pan, self.gain)
    }

    /// Offset in whole milliseconds, as the mixing filter expects it.
    pub fn delay_ms(&self) -> u64 {
        (self.time_offset * 1000.0).round() as u64
    }

    /// Time at which this layer falls silent, given the stream length.
    pub fn end(&self, content_length: f64) -> f64 {
        self.time_offset + content_length
    }
}

/// Length of a pad-to-longest mix of `(offset, content_length)` spans.
pub fn mix_duration<I>(spans: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    spans
        .into_iter()
        .map(|(offset, length)| offset + length)
        .fold(0.0, f64::max)
}

/// Turns the per-layer parallel arrays into [`SpatialLayer`]s.
pub struct SpatialLayerBuilder<'a> {
    config: &'a SpatializationConfig,
}

impl<'a> SpatialLayerBuilder<'a> {
    pub fn new(config: &'a SpatializationConfig) -> Self {
        Self { config }
    }

    /// Fails with a configuration error, without building anything, if the
    /// arrays disagree with `num_layers` or hold out-of-range values.
    pub fn build<'s>(&self, source: &'s Path) -> Result<Vec<SpatialLayer<'s>>> {
        self.config.validate()?;

        let c = self.config;
        let layers = (0..c.num_layers)
            .map(|i| SpatialLayer {
                index: i,
                pan: c.stereo_positions[i],
                gain: c.volume_adjustments[i],
                time_offset: c.time_offsets[i],
                source,
            })
            .collect();
        Ok(layers)
    }
}
