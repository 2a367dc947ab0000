//! fretwork CLI: chart inspection, autoplay playback and offline rendering.
//!
//! Usage:
//!   fw-cli song/notes.chart --info
//!   fw-cli song/notes.chart --track HardSingle
//!   fw-cli song/notes.chart --wav autoplay.wav
//!   fw-cli song/notes.chart --raw | aplay -f cd

use anyhow::{bail, Context, Result};
use clap::Parser;
use fw_audio::{CpalOutput, StreamSink};
use fw_master::{
    chart_music_path, load_config, open_chart, open_music, render_song_wav, Chart,
    FretworkConfig, Session, SongPlayer,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Longest offline render, in seconds.
const MAX_RENDER_SECS: f64 = 600.0;

#[derive(Parser, Debug)]
#[command(name = "fw-cli")]
#[command(about = "Play, inspect and render .chart rhythm game charts", long_about = None)]
struct Args {
    /// Chart file to load
    #[arg(value_name = "CHART")]
    chart: PathBuf,

    /// Track to play, overriding the config
    #[arg(short, long)]
    track: Option<String>,

    /// Music file (raw PCM or WAV); defaults to the chart's MusicStream
    #[arg(short, long, value_name = "FILE")]
    music: Option<PathBuf>,

    /// YAML config file
    #[arg(short, long, default_value = "fretwork.yaml", value_name = "FILE")]
    config: PathBuf,

    /// Render an autoplay run to a WAV file instead of playing it
    #[arg(long, value_name = "OUT")]
    wav: Option<PathBuf>,

    /// Stream headerless PCM to stdout in real time
    #[arg(long, conflicts_with = "wav")]
    raw: bool,

    /// Print chart metadata and tracks, then exit
    #[arg(long)]
    info: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(&args.config);

    // RUST_LOG overrides the configured level
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();
    log::info!("fw-cli starting up");

    if let Some(track) = &args.track {
        config.gameplay.track = track.clone();
    }

    let chart = open_chart(&args.chart)
        .with_context(|| format!("failed to load {}", args.chart.display()))?;
    if args.info {
        print_info(&chart);
        return Ok(());
    }

    let session = Session::from_config(&config.audio).context("invalid audio config")?;
    let music = match music_path(&args, &chart) {
        Some(path) => Some(open_music(&path, session.mixer().format())?),
        None => None,
    };
    let mut player = SongPlayer::new(session.mixer(), Arc::new(chart), music, &config.gameplay)?;

    match (&args.wav, args.raw) {
        (Some(out), _) => render_to_wav(&mut player, out),
        (None, true) => {
            session.start_output(|_| Ok(StreamSink::new(io::stdout())));
            play(&session, &mut player, &config, false)
        }
        (None, false) => {
            session.start_output(CpalOutput::open);
            play(&session, &mut player, &config, true)
        }
    }
}

/// `--music`, or the chart's MusicStream if that file exists.
fn music_path(args: &Args, chart: &Chart) -> Option<PathBuf> {
    if let Some(music) = &args.music {
        return Some(music.clone());
    }
    chart_music_path(&args.chart, chart).filter(|path| {
        let found = path.exists();
        if !found {
            log::warn!("music stream {} not found, playing silently", path.display());
        }
        found
    })
}

fn print_info(chart: &Chart) {
    let meta = &chart.metadata;
    println!("Title:      {}", meta.title);
    println!("Artist:     {}", meta.artist);
    println!("Album:      {}", meta.album);
    println!("Charter:    {}", meta.charter);
    println!("Music:      {}", meta.music_stream);
    println!("Resolution: {}", chart.resolution());
    println!("Offset:     {:.3}s", meta.offset);
    println!(
        "Sync:       {} tempo changes, {} time signatures",
        chart.tempo_changes.len(),
        chart.time_signatures.len()
    );
    if let Some(tempo) = chart.tempo_changes.first() {
        println!("Tempo:      {:.3} BPM", tempo.bpm);
    }
    println!();

    for track in &chart.tracks {
        let sustains = track.notes.iter().filter(|n| n.is_sustain()).count();
        let secs = chart.tick_to_seconds(track.last_tick());
        println!(
            "{:<16} {:>5} notes ({} sustains), last at {:.2}s",
            track.name,
            track.notes.len(),
            sustains,
            secs
        );
    }
}

/// Autoplay against the live output until the song finishes.
fn play(
    session: &Session,
    player: &mut SongPlayer,
    config: &FretworkConfig,
    show: bool,
) -> Result<()> {
    // Keep status off stdout when stdout carries PCM
    let mut status: Box<dyn Write> = if show {
        Box::new(io::stdout())
    } else {
        Box::new(io::stderr())
    };
    writeln!(status, "Playing {} (autoplay)...", config.gameplay.track)?;

    while !player.is_finished() {
        if !session.is_output_running() {
            bail!("audio output stopped");
        }
        player.autoplay_tick();
        write!(
            status,
            "\r{:7.2}s | music {:5.1}% | score {:8.1}",
            player.song_time(),
            player.music_progress() * 100.0,
            player.score()
        )?;
        status.flush()?;
        thread::sleep(Duration::from_millis(5));
    }

    session.stop_output();
    writeln!(status, "\nDone. Final score {:.1}", player.score())?;
    Ok(())
}

fn render_to_wav(player: &mut SongPlayer, path: &Path) -> Result<()> {
    let format = player.mixer().format();
    println!(
        "Rendering to {} at {} Hz, {} ch...",
        path.display(),
        format.sample_rate,
        format.channels
    );

    let (wav, outcome) = render_song_wav(player, MAX_RENDER_SECS);
    std::fs::write(path, &wav).with_context(|| format!("failed to write {}", path.display()))?;

    println!("Rendered {} bytes, score {:.1}", wav.len(), outcome.score);
    if !outcome.finished {
        println!("Stopped after {:.0}s", MAX_RENDER_SECS);
    }
    Ok(())
}
