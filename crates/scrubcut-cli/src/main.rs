// crates/scrubcut-cli/src/main.rs
//
// Headless front end: drives the decode handle, task supervisor and playback
// driver the way an editor UI would, and reports what comes out.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use scrubcut_core::config::ScrubConfig;
use scrubcut_core::generation::ThumbnailParams;

mod commands;
mod helpers;

#[derive(Parser, Debug)]
#[command(name = "scrubcut", version, about = "Scrub, preview and analyse media clips")]
struct Cli {
    /// JSON config file; missing fields take their defaults.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Where media comes from: a file, or a generated test source.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Media file to open.
    pub path: Option<PathBuf>,

    /// Use a generated source of this many seconds instead of a file.
    #[arg(long, value_name = "SECS", conflicts_with = "path")]
    pub synthetic: Option<f64>,
}

/// Optional in/out points bounding generation.
#[derive(Args, Debug, Clone, Copy)]
pub struct RangeArgs {
    #[arg(long = "in", value_name = "SECS")]
    pub in_point:  Option<f64>,

    #[arg(long = "out", value_name = "SECS")]
    pub out_point: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a source and print its media info.
    Probe {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Generate a thumbnail strip and write each thumbnail as PNG.
    Thumbs {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        range:  RangeArgs,
        /// Number of thumbnails (1..=48).
        #[arg(long)]
        count:  Option<usize>,
        /// Size the count for a strip this many pixels wide instead.
        #[arg(long, value_name = "PX", conflicts_with = "count")]
        strip_width: Option<u32>,
        /// Maximum thumbnail width in pixels.
        #[arg(long)]
        width:  Option<u32>,
        /// Output directory.
        #[arg(long, default_value = "thumbs")]
        out:    PathBuf,
    },

    /// Compute the audio envelope and print a summary.
    Waveform {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        range:  RangeArgs,
        /// Envelope points per second of media.
        #[arg(long)]
        pps:    Option<u32>,
    },

    /// Play without a display, logging transport and position.
    Play {
        #[command(flatten)]
        source:        SourceArgs,
        /// Wall-clock seconds to run for.
        #[arg(long, default_value_t = 3.0)]
        seconds:       f64,
        /// Start at this position instead of 0.
        #[arg(long, value_name = "SECS")]
        from:          Option<f64>,
        #[arg(long = "loop")]
        looping:       bool,
        /// Show every frame even when falling behind.
        #[arg(long)]
        no_frame_skip: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ScrubConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ScrubConfig::default(),
    };

    match cli.command {
        Command::Probe { source } => commands::probe(&source, &config),
        Command::Thumbs { source, range, count, strip_width, width, out } => {
            let mut config = config;
            if let Some(n) = count { config.generation.thumbnail_count = n; }
            if let Some(px) = strip_width {
                config.generation.thumbnail_count = ThumbnailParams::count_for_strip(px);
            }
            if let Some(w) = width { config.generation.thumbnail_width = w; }
            commands::thumbs(&source, range, &config, &out)
        }
        Command::Waveform { source, range, pps } => {
            let mut config = config;
            if let Some(p) = pps { config.generation.waveform_points_per_second = p; }
            commands::waveform(&source, range, &config)
        }
        Command::Play { source, seconds, from, looping, no_frame_skip } => {
            let mut config = config;
            if looping       { config.playback.looping = true; }
            if no_frame_skip { config.playback.frame_skip = false; }
            commands::play(&source, &config, seconds, from)
        }
    }
}
