//! raudio-play - stream an audio file through the raudio mixer
//!
//! Opens the output device, loads the file as music and keeps its stream
//! fed until playback ends.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use raudio::{AudioConfig, AudioEngine};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Interval between music stream updates
const UPDATE_INTERVAL: Duration = Duration::from_millis(10);

/// Interval between progress reports
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Command-line arguments for raudio-play
#[derive(Parser, Debug)]
#[command(name = "raudio-play")]
#[command(about = "Play an audio file through the raudio mixing engine")]
#[command(version)]
struct Args {
    /// Audio file to play (wav, ogg, flac, mp3)
    #[arg(required_unless_present = "list_devices")]
    file: Option<PathBuf>,

    /// Config file (overrides RAUDIO_CONFIG and the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output device name
    #[arg(short, long)]
    device: Option<String>,

    /// Music volume (not clamped; master volume stays at 1.0)
    #[arg(long, default_value_t = 1.0)]
    volume: f32,

    /// Pitch factor (0.125 to 8.0)
    #[arg(long, default_value_t = 1.0)]
    pitch: f32,

    /// Play once instead of looping
    #[arg(long)]
    no_loop: bool,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AudioConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if args.device.is_some() {
        config.device.name = args.device.clone();
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("raudio={0},raudio_common={0}", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.list_devices {
        for name in AudioEngine::list_devices().context("Failed to enumerate output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let file = args.file.context("No input file given")?;

    let mut engine = AudioEngine::new(config).context("Invalid audio configuration")?;
    engine.init_device().context("Failed to open audio device")?;

    let mut music = engine
        .load_music_stream(&file)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    music.set_looping(!args.no_loop);
    music.set_volume(args.volume);
    if args.pitch != 1.0 {
        music.set_pitch(args.pitch).context("Invalid pitch")?;
    }

    info!(
        "Playing {} ({:.1}s, {})",
        file.display(),
        music.time_length(),
        if music.is_looping() { "looping" } else { "once" }
    );

    music.update().context("Failed to prime music stream")?;
    music.play();

    let mut last_report = Instant::now();
    while music.is_playing() {
        music.update().context("Music stream update failed")?;

        if last_report.elapsed() >= PROGRESS_INTERVAL {
            info!("{:.1}s / {:.1}s", music.time_played(), music.time_length());
            last_report = Instant::now();
        }

        thread::sleep(UPDATE_INTERVAL);
    }

    info!("Playback finished");
    engine.unload_music_stream(music)?;
    engine.close_device();
    Ok(())
}
