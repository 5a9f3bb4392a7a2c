//! [`MixingEngine`] backed by the `ffmpeg` and `ffprobe` command-line tools.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use derive_builder::Builder;

use super::layer::SpatialLayer;
use super::mixer::{MixLayout, MixRequest};
use super::probe;
use crate::error::{Result, SoundscapeError, Stage};
use crate::MixingEngine;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How the ffmpeg tools are located and what they are asked to encode.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into, strip_option), default)]
pub struct FfmpegOptions {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Audio codec, e.g. `"libmp3lame"`. ffmpeg picks one from the output
    /// extension when unset.
    pub codec: Option<String>,
    /// Target bitrate, e.g. `"192k"`.
    pub bitrate: Option<String>,
    pub sample_rate: Option<u32>,
    /// Wall-clock limit per tool invocation. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for FfmpegOptions {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            codec: None,
            bitrate: None,
            sample_rate: None,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    options: FfmpegOptions,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FfmpegOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FfmpegOptions {
        &self.options
    }

    /// Full ffmpeg argument list for `request`, excluding the program name.
    pub fn mix_args(&self, request: &MixRequest<'_>) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        for layer in request.layers {
            args.push("-i".to_string());
            args.push(layer.source.to_string_lossy().into_owned());
        }

        let graph = match request.layout {
            MixLayout::Stereo => stereo_filtergraph(request.layers),
            MixLayout::Multichannel => multichannel_filtergraph(request.layers, request.duration),
        };
        args.push("-filter_complex".to_string());
        args.push(graph);
        args.push("-map".to_string());
        args.push("[out]".to_string());

        if let Some(rate) = self.options.sample_rate {
            args.push("-ar".to_string());
            args.push(rate.to_string());
        }
        if let Some(codec) = &self.options.codec {
            args.push("-c:a".to_string());
            args.push(codec.clone());
        } else if probe::is_wav(request.output) {
            args.push("-c:a".to_string());
            args.push("pcm_s16le".to_string());
        }
        if let Some(bitrate) = &self.options.bitrate {
            args.push("-b:a".to_string());
            args.push(bitrate.clone());
        }

        args.push(request.output.to_string_lossy().into_owned());
        args
    }

    fn probe_duration(&self, source: &Path) -> Result<f64> {
        let args = [
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            source.to_string_lossy().into_owned(),
        ];
        let stdout = run_tool(
            &self.options.ffprobe_path,
            &args,
            Stage::Probe,
            self.options.timeout,
        )?;
        parse_duration(&stdout)
    }
}

impl MixingEngine for FfmpegEngine {
    fn content_length(&self, source: &Path) -> Result<f64> {
        if probe::is_wav(source) {
            match probe::wav_duration(source) {
                Ok(secs) => return Ok(secs),
                Err(e) => log::debug!("WAV header unreadable ({e}), falling back to ffprobe"),
            }
        }
        self.probe_duration(source)
    }

    fn mix(&self, request: &MixRequest<'_>) -> Result<()> {
        let args = self.mix_args(request);
        log::debug!("Running {} {}", self.options.ffmpeg_path.display(), args.join(" "));
        run_tool(
            &self.options.ffmpeg_path,
            &args,
            Stage::Spatialize,
            self.options.timeout,
        )?;
        Ok(())
    }
}

/// Each layer is downmixed to mono, delayed, and panned into a stereo pair with
/// the linear pan law; the pairs are summed without normalization and padded
/// to the longest layer.
pub fn stereo_filtergraph(layers: &[SpatialLayer<'_>]) -> String {
    let mut chains: Vec<String> = layers
        .iter()
        .enumerate()
        .map(|(i, layer)| {
            let gains = layer.channel_gains();
            format!(
                "[{i}:a]aformat=channel_layouts=mono{},pan=stereo|c0={:.6}*c0|c1={:.6}*c0[l{i}]",
                delay_filter(layer),
                gains.left,
                gains.right
            )
        })
        .collect();

    let labels: String = (0..layers.len()).map(|i| format!("[l{i}]")).collect();
    chains.push(format!(
        "{labels}amix=inputs={}:duration=longest:dropout_transition=0:normalize=0[out]",
        layers.len()
    ));
    chains.join(";")
}

/// Each layer becomes its own delayed channel, with no pan or gain. Channels are
/// padded to `duration` so the merge keeps the full length.
pub fn multichannel_filtergraph(layers: &[SpatialLayer<'_>], duration: f64) -> String {
    let mut chains: Vec<String> = layers
        .iter()
        .enumerate()
        .map(|(i, layer)| {
            format!(
                "[{i}:a]aformat=channel_layouts=mono{},apad=whole_dur={:.3}[p{i}]",
                delay_filter(layer),
                duration
            )
        })
        .collect();

    let labels: String = (0..layers.len()).map(|i| format!("[p{i}]")).collect();
    if layers.len() == 1 {
        chains.push(format!("{labels}anull[out]"));
    } else {
        chains.push(format!("{labels}amerge=inputs={}[out]", layers.len()));
    }
    chains.join(";")
}

fn delay_filter(layer: &SpatialLayer<'_>) -> String {
    match layer.delay_ms() {
        0 => String::new(),
        ms => format!(",adelay={ms}:all=1"),
    }
}

fn parse_duration(stdout: &str) -> Result<f64> {
    let text = stdout.trim();
    match text.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(SoundscapeError::StageFailed {
            stage: Stage::Probe,
            reason: format!("could not read a duration from ffprobe output {text:?}"),
        }),
    }
}

/// Run an external tool to completion and return its stdout.
///
/// A missing binary is [`SoundscapeError::ToolNotFound`]; a non-zero exit is
/// [`SoundscapeError::StageFailed`] carrying stderr; running past `timeout`
/// kills the child and yields [`SoundscapeError::StageTimedOut`].
fn run_tool(
    program: &Path,
    args: &[String],
    stage: Stage,
    timeout: Option<Duration>,
) -> Result<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SoundscapeError::ToolNotFound(program.display().to_string())
            } else {
                SoundscapeError::Io(e)
            }
        })?;

    // Drain both pipes off-thread so a chatty child cannot block on a full pipe.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                log::error!("{} exceeded {:?}, killing it", program.display(), limit);
                let _ = child.kill();
                child.wait()?;
                return Err(SoundscapeError::StageTimedOut {
                    stage,
                    after: limit,
                });
            }
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout.map(join_output).unwrap_or_default();
    let stderr = stderr.map(join_output).unwrap_or_default();

    if !status.success() {
        return Err(SoundscapeError::StageFailed {
            stage,
            reason: format!(
                "{} exited with code {:?}: {}",
                program.display(),
                status.code(),
                stderr.trim()
            ),
        });
    }
    Ok(stdout)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_output(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpatializationConfig;
    use crate::spatial::{Mixer, SpatialLayerBuilder};

    fn stereo_config(pans: &[f64], gains: &[f64], offsets: &[f64]) -> SpatializationConfig {
        SpatializationConfig {
            num_layers: pans.len(),
            stereo_positions: pans.to_vec(),
            volume_adjustments: gains.to_vec(),
            time_offsets: offsets.to_vec(),
            layout: MixLayout::Stereo,
        }
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn ffmpeg_available() -> bool {
        let found = |tool: &str| {
            Command::new(tool)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        };
        found("ffmpeg") && found("ffprobe")
    }

    fn write_tone(path: &Path, sample_rate: u32, secs: f64) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (sample_rate as f64 * secs) as u32;
        for n in 0..frames {
            let t = n as f64 / sample_rate as f64;
            let sample = (t * 440.0 * std::f64::consts::TAU).sin() * 8_000.0;
            writer.write_sample(sample as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn options_builder_fills_defaults() {
        let options = FfmpegOptionsBuilder::default()
            .codec("libmp3lame")
            .bitrate("192k")
            .build()
            .unwrap();
        assert_eq!(options.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(options.codec.as_deref(), Some("libmp3lame"));
        assert_eq!(options.timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(options.sample_rate, None);
    }

    #[test]
    fn stereo_graph_uses_linear_gains_and_delays() {
        let config = stereo_config(&[-1.0, 0.0, 0.4], &[1.0, 0.8, 0.5], &[0.0, 5.0, 12.5]);
        let source = Path::new("conversation.mp3");
        let layers = SpatialLayerBuilder::new(&config).build(source).unwrap();
        let graph = stereo_filtergraph(&layers);

        assert_eq!(
            graph,
            "[0:a]aformat=channel_layouts=mono,pan=stereo|c0=1.000000*c0|c1=0.000000*c0[l0];\
             [1:a]aformat=channel_layouts=mono,adelay=5000:all=1,\
             pan=stereo|c0=0.400000*c0|c1=0.400000*c0[l1];\
             [2:a]aformat=channel_layouts=mono,adelay=12500:all=1,\
             pan=stereo|c0=0.150000*c0|c1=0.350000*c0[l2];\
             [l0][l1][l2]amix=inputs=3:duration=longest:dropout_transition=0:normalize=0[out]"
        );
    }

    #[test]
    fn multichannel_graph_pads_every_channel() {
        let mut config = stereo_config(&[0.0, 0.0], &[0.6, 0.9], &[0.0, 2.0]);
        config.layout = MixLayout::Multichannel;
        let layers = SpatialLayerBuilder::new(&config)
            .build(Path::new("conversation.wav"))
            .unwrap();
        let graph = multichannel_filtergraph(&layers, 12.0);

        assert_eq!(
            graph,
            "[0:a]aformat=channel_layouts=mono,apad=whole_dur=12.000[p0];\
             [1:a]aformat=channel_layouts=mono,adelay=2000:all=1,apad=whole_dur=12.000[p1];\
             [p0][p1]amerge=inputs=2[out]"
        );
    }

    #[test]
    fn args_pass_the_shared_source_once_per_layer() {
        let config = stereo_config(&[-0.5, 0.5], &[0.7, 0.7], &[0.0, 3.0]);
        let source = Path::new("conversation.mp3");
        let layers = SpatialLayerBuilder::new(&config).build(source).unwrap();
        let request = MixRequest {
            layers: &layers,
            layout: MixLayout::Stereo,
            duration: 13.0,
            output: Path::new("out/.soundscape.partial.mp3"),
        };
        let engine = FfmpegEngine::with_options(
            FfmpegOptionsBuilder::default()
                .bitrate("192k")
                .sample_rate(44_100u32)
                .build()
                .unwrap(),
        );
        let args = engine.mix_args(&request);

        let inputs: Vec<_> = args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(inputs, vec!["conversation.mp3", "conversation.mp3"]);
        assert!(args.windows(2).any(|w| w == ["-ar", "44100"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "192k"]));
        assert!(!args.iter().any(|a| a == "-c:a"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("out/.soundscape.partial.mp3")
        );
    }

    #[test]
    fn wav_output_defaults_to_pcm() {
        let config = stereo_config(&[0.0], &[1.0], &[0.0]);
        let layers = SpatialLayerBuilder::new(&config)
            .build(Path::new("conversation.wav"))
            .unwrap();
        let request = MixRequest {
            layers: &layers,
            layout: MixLayout::Stereo,
            duration: 1.0,
            output: Path::new(".mix.partial.wav"),
        };
        let args = FfmpegEngine::new().mix_args(&request);
        assert!(args.windows(2).any(|w| w == ["-c:a", "pcm_s16le"]));
    }

    #[test]
    fn parses_ffprobe_duration() {
        assert_eq!(parse_duration("12.345000\n").unwrap(), 12.345);
        assert!(parse_duration("N/A\n").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn missing_binary_is_tool_not_found() {
        let err = run_tool(
            Path::new("/nonexistent/ffmpeg-for-tests"),
            &[],
            Stage::Spatialize,
            Some(Duration::from_secs(1)),
        )
        .unwrap_err();
        assert!(matches!(err, SoundscapeError::ToolNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn slow_tool_is_killed_at_timeout() {
        let started = Instant::now();
        let err = run_tool(
            Path::new("sleep"),
            &["5".to_string()],
            Stage::Spatialize,
            Some(Duration::from_millis(200)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SoundscapeError::StageTimedOut {
                stage: Stage::Spatialize,
                ..
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_stage_failure() {
        let err = run_tool(Path::new("false"), &[], Stage::Probe, None).unwrap_err();
        assert!(matches!(
            err,
            SoundscapeError::StageFailed {
                stage: Stage::Probe,
                ..
            }
        ));
    }

    #[test]
    fn wav_content_length_comes_from_the_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("conversation.wav");
        write_tone(&source, 8_000, 2.0);
        let engine = FfmpegEngine::with_options(
            FfmpegOptionsBuilder::default()
                .ffprobe_path("/nonexistent/ffprobe-for-tests")
                .build()
                .unwrap(),
        );
        assert_eq!(engine.content_length(&source).unwrap(), 2.0);
    }

    #[test]
    fn non_wav_content_length_goes_through_ffprobe() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mp3 = dir.path().join("conversation.mp3");
        let broken_wav = dir.path().join("broken.wav");
        std::fs::write(&mp3, b"not really mp3").unwrap();
        std::fs::write(&broken_wav, b"not really wav").unwrap();
        let engine = FfmpegEngine::with_options(
            FfmpegOptionsBuilder::default()
                .ffprobe_path("/nonexistent/ffprobe-for-tests")
                .build()
                .unwrap(),
        );

        for source in [&mp3, &broken_wav] {
            match engine.content_length(source).unwrap_err() {
                SoundscapeError::ToolNotFound(tool) => {
                    assert_eq!(tool, "/nonexistent/ffprobe-for-tests")
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn real_stereo_mix_has_padded_length() {
        init_logging();
        if !ffmpeg_available() {
            eprintln!("skipping: ffmpeg not installed");
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("conversation.wav");
        write_tone(&source, 8_000, 1.0);
        let output = dir.path().join("soundscape.wav");
        let config = stereo_config(&[-0.7, 0.7], &[0.8, 0.6], &[0.0, 0.5]);

        let outcome = Mixer::new(FfmpegEngine::new())
            .spatialize(&source, &config, &output)
            .unwrap();
        assert_eq!(outcome.duration_secs, 1.5);

        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().channels, 2);
        let secs = probe::wav_duration(&output).unwrap();
        assert!((secs - 1.5).abs() < 0.05, "mixed length {secs}");
    }

    #[test]
    fn real_multichannel_mix_has_one_channel_per_layer() {
        init_logging();
        if !ffmpeg_available() {
            eprintln!("skipping: ffmpeg not installed");
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("conversation.wav");
        write_tone(&source, 8_000, 1.0);
        let output = dir.path().join("layers.wav");
        let mut config = stereo_config(&[0.0, 0.0, 0.0], &[0.5, 0.5, 0.5], &[0.0, 0.25, 0.5]);
        config.layout = MixLayout::Multichannel;

        Mixer::new(FfmpegEngine::new())
            .spatialize(&source, &config, &output)
            .unwrap();

        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().channels, 3);
        let secs = probe::wav_duration(&output).unwrap();
        assert!((secs - 1.5).abs() < 0.05, "mixed length {secs}");
    }
}
