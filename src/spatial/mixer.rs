use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::layer::{mix_duration, SpatialLayer, SpatialLayerBuilder};
use crate::config::SpatializationConfig;
use crate::error::{Result, SoundscapeError, Stage};
use crate::MixingEngine;

/// Shape of the mixed output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixLayout {
    /// All layers panned and summed into two channels.
    #[default]
    Stereo,
    /// One channel per layer, delayed but unpanned and at unity gain, for mixing by hand.
    Multichannel,
}

/// Everything an engine needs for one mixing call.
#[derive(Debug, Clone)]
pub struct MixRequest<'a> {
    pub layers: &'a [SpatialLayer<'a>],
    pub layout: MixLayout,
    /// Expected output length in seconds (latest layer end).
    pub duration: f64,
    /// Where the engine must write. This is a staging path; the mixer moves it
    /// into place after the engine succeeds.
    pub output: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixOutcome {
    pub output: PathBuf,
    pub layout: MixLayout,
    pub layers: usize,
    pub content_length_secs: f64,
    pub duration_secs: f64,
}

/// Orchestrates the spatialization stage around a [`MixingEngine`].
pub struct Mixer<E> {
    engine: E,
}

impl<E: MixingEngine> Mixer<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Layer `source` per `config` and write the mix to `output`.
    ///
    /// The layer configuration is checked before the engine is touched. The
    /// engine is called once; if it fails nothing is left at `output` and
    /// `source` is untouched, so the stage can simply be run again.
    pub fn spatialize(
        &self,
        source: &Path,
        config: &SpatializationConfig,
        output: &Path,
    ) -> Result<MixOutcome> {
        let layers = SpatialLayerBuilder::new(config).build(source)?;

        if !source.is_file() {
            return Err(SoundscapeError::StageFailed {
                stage: Stage::Probe,
                reason: format!("conversation stream {} does not exist", source.display()),
            });
        }

        let content_length = self.engine.content_length(source)?;
        let duration = mix_duration(layers.iter().map(|l| (l.time_offset, content_length)));

        log::info!(
            "Spatializing {} ({:.1}s) into {} {:?} layers, {:.1}s total",
            source.display(),
            content_length,
            layers.len(),
            config.layout,
            duration
        );
        for layer in &layers {
            let gains = layer.channel_gains();
            log::info!(
                "Layer {}: pan={:+.2} gain={:.2} offset={:.2}s (L={:.3} R={:.3})",
                layer.index + 1,
                layer.pan,
                layer.gain,
                layer.time_offset,
                gains.left,
                gains.right
            );
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let staging = staging_path(output);
        remove_if_exists(&staging)?;

        let request = MixRequest {
            layers: &layers,
            layout: config.layout,
            duration,
            output: &staging,
        };
        if let Err(e) = self.engine.mix(&request) {
            log::error!("Spatialization failed: {e}");
            discard_staging(&staging);
            return Err(e);
        }

        if !staging.is_file() {
            discard_staging(&staging);
            return Err(SoundscapeError::StageFailed {
                stage: Stage::Spatialize,
                reason: "mixing engine reported success but wrote no output".to_string(),
            });
        }
        if let Err(e) = std::fs::rename(&staging, output) {
            discard_staging(&staging);
            return Err(SoundscapeError::StageFailed {
                stage: Stage::Spatialize,
                reason: format!("could not move mix into {}: {e}", output.display()),
            });
        }
        log::info!("Spatial mix written to {}", output.display());

        Ok(MixOutcome {
            output: output.to_path_buf(),
            layout: config.layout,
            layers: layers.len(),
            content_length_secs: content_length,
            duration_secs: duration,
        })
    }
}

/// Hidden sibling of `output` that keeps its extension, so engines that pick a
/// container from the file name still see the right one.
pub fn staging_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mix".to_string());
    let name = match output.extension() {
        Some(ext) => format!(".{stem}.partial.{}", ext.to_string_lossy()),
        None => format!(".{stem}.partial"),
    };
    output.with_file_name(name)
}

/// Best-effort removal on a failure path; the original error is what matters.
fn discard_staging(staging: &Path) {
    if let Err(e) = remove_if_exists(staging) {
        log::warn!("Could not remove staging file {}: {e}", staging.display());
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
