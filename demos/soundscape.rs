use std::path::PathBuf;
use std::time::Instant;

use rand::{rngs::StdRng, SeedableRng};
use soundscape_rs::{
    config::SoundscapeConfig,
    spatial::{FfmpegEngine, FfmpegOptionsBuilder, Mixer},
    Session,
};

/// Usage: soundscape <config.yaml> [turns] [seed] [conversation-audio output-audio]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = PathBuf::from(args.first().map(String::as_str).unwrap_or("soundscape.yaml"));
    let turns: usize = args.get(1).map(|s| s.parse()).transpose()?.unwrap_or(20);
    let seed: u64 = args.get(2).map(|s| s.parse()).transpose()?.unwrap_or(42);

    let config = SoundscapeConfig::from_path(&config_path)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let session = Session::new(config, &mut rng)?;

    for record in session.personalities().iter() {
        println!(
            "{}: verbosity {:.2}, rate {:.2}, pitch {:+.1}",
            record.speaker(),
            record.verbosity(),
            record.baseline().rate,
            record.baseline().pitch
        );
    }

    let plan = session.plan(turns, &mut rng)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);

    if let (Some(source), Some(output)) = (args.get(3), args.get(4)) {
        let options = FfmpegOptionsBuilder::default()
            .bitrate("192k")
            .build()?;
        let mixer = Mixer::new(FfmpegEngine::with_options(options));

        let mix_start = Instant::now();
        let outcome = mixer.spatialize(
            &PathBuf::from(source),
            &session.config().spatialization,
            &PathBuf::from(output),
        )?;
        println!(
            "Mixed {} layers ({:.2}s) in {:.2?} -> {}",
            outcome.layers,
            outcome.duration_secs,
            mix_start.elapsed(),
            outcome.output.display()
        );
    }

    Ok(())
}
