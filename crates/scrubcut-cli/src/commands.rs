// crates/scrubcut-cli/src/commands.rs
//
// One function per subcommand. Each opens its source, runs the core on it
// and pumps the resulting events on this thread, the same single-owner loop an
// editor runs once per frame.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};

use scrubcut_core::clip::ClipDescriptor;
use scrubcut_core::config::ScrubConfig;
use scrubcut_core::generation::{GenerationEvent, GenerationParams};
use scrubcut_core::media_types::{Thumbnail, Waveform};
use scrubcut_core::playback_types::{PlaybackEvent, Transport};
use scrubcut_core::TaskKind;
use scrubcut_media::{DecodeHandle, PlaybackDriver, SyntheticSource, TaskSupervisor};

use crate::helpers::png_out::write_rgba_png;
use crate::helpers::sparkline::sparkline;
use crate::{RangeArgs, SourceArgs};

/// How long to wait for a generation before giving up.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(300);
const PUMP_INTERVAL:      Duration = Duration::from_millis(50);
const SPARKLINE_COLUMNS:  usize    = 64;

// ── Source ────────────────────────────────────────────────────────────────────

fn open(source: &SourceArgs, config: &ScrubConfig) -> Result<DecodeHandle> {
    match (&source.path, source.synthetic) {
        (_, Some(secs)) => {
            log::info!("[cli] using a {secs:.2}s synthetic source");
            Ok(DecodeHandle::open(
                SyntheticSource::new(secs).with_sample_rate(config.generation.audio_analysis_rate),
            ))
        }
        (Some(path), None) => DecodeHandle::open_path(path, config.generation.audio_analysis_rate)
            .with_context(|| format!("opening {}", path.display())),
        (None, None) => bail!("give a media path or --synthetic <secs>"),
    }
}

fn clip_for(source: &SourceArgs, range: RangeArgs) -> ClipDescriptor {
    let mut clip = ClipDescriptor::new(source.path.clone().unwrap_or_default());
    clip.in_point  = range.in_point;
    clip.out_point = range.out_point;
    clip
}

fn params_of(clip: &ClipDescriptor, config: &ScrubConfig, kind: TaskKind) -> Result<GenerationParams> {
    clip.generation_params(&config.generation)
        .into_iter()
        .find(|p| p.kind() == kind)
        .ok_or_else(|| anyhow!("no {kind} generation for this clip"))
}

/// Pump `sup` until `done` returns a value from one of its events.
fn run_until<T>(
    sup:    &mut TaskSupervisor,
    events: &crossbeam_channel::Receiver<GenerationEvent>,
    mut done: impl FnMut(GenerationEvent) -> Option<Result<T>>,
) -> Result<T> {
    let deadline = Instant::now() + GENERATION_TIMEOUT;
    while Instant::now() < deadline {
        sup.pump_timeout(PUMP_INTERVAL);
        for event in events.try_iter() {
            if let Some(result) = done(event) {
                return result;
            }
        }
    }
    bail!("generation timed out after {}s", GENERATION_TIMEOUT.as_secs())
}

// ── probe ─────────────────────────────────────────────────────────────────────

pub fn probe(source: &SourceArgs, config: &ScrubConfig) -> Result<()> {
    let handle = open(source, config)?;
    let info   = handle.info();
    match &info.path {
        Some(p) => println!("path:        {}", p.display()),
        None    => println!("path:        (synthetic)"),
    }
    println!("duration:    {:.3}s", info.duration);
    println!("fps:         {:.3}", info.fps);
    println!("size:        {}x{}", info.width, info.height);
    println!("audio:       {}", if info.has_audio { "yes" } else { "no" });
    println!("analysis:    {} Hz mono", info.sample_rate);
    Ok(())
}

// ── thumbs ────────────────────────────────────────────────────────────────────

pub fn thumbs(source: &SourceArgs, range: RangeArgs, config: &ScrubConfig, out: &Path) -> Result<()> {
    let handle = open(source, config)?;
    let params = params_of(&clip_for(source, range), config, TaskKind::Thumbnails)?;
    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;

    let mut sup = TaskSupervisor::new();
    let events  = sup.subscribe();
    let busy    = sup.subscribe_busy();
    let token   = sup.request_generation(&handle, params);
    log::info!("[cli] thumbnails requested ({token})");

    let strip = run_until(&mut sup, &events, |event| {
        for change in busy.try_iter() {
            log::debug!("[cli] {} busy={}", change.kind, change.busy);
        }
        match event {
            GenerationEvent::ThumbnailsProgress { batch, .. } => {
                log::info!("[cli] +{} thumbnails", batch.len());
                None
            }
            GenerationEvent::ThumbnailsComplete { thumbnails, .. } => Some(Ok(thumbnails)),
            GenerationEvent::ThumbnailsFailed { error, .. } => {
                Some(Err(anyhow!(error).context("thumbnail generation failed")))
            }
            _ => None,
        }
    })?;

    for thumb in strip.iter() {
        let path = out.join(thumbnail_file_name(thumb));
        write_rgba_png(&path, &thumb.frame)?;
        println!("{:>8.3}s  {}x{}  {}", thumb.timestamp, thumb.frame.width, thumb.frame.height, path.display());
    }
    log::info!("[cli] wrote {} thumbnails to {}", strip.len(), out.display());
    Ok(())
}

fn thumbnail_file_name(thumb: &Thumbnail) -> String {
    format!("thumb_{:03}_{:08.3}.png", thumb.index, thumb.timestamp)
}

// ── waveform ──────────────────────────────────────────────────────────────────

pub fn waveform(source: &SourceArgs, range: RangeArgs, config: &ScrubConfig) -> Result<()> {
    let handle = open(source, config)?;
    let params = params_of(&clip_for(source, range), config, TaskKind::Waveform)?;

    let mut sup = TaskSupervisor::new();
    let events  = sup.subscribe();
    let token   = sup.request_generation(&handle, params);
    log::info!("[cli] waveform requested ({token})");

    let waveform = run_until(&mut sup, &events, |event| match event {
        GenerationEvent::WaveformProgress { chunk, .. } => {
            log::debug!("[cli] waveform chunk at point {}", chunk.offset);
            None
        }
        GenerationEvent::WaveformComplete { waveform, .. } => Some(Ok(waveform)),
        GenerationEvent::WaveformFailed { error, .. } => {
            Some(Err(anyhow!(error).context("waveform generation failed")))
        }
        _ => None,
    })?;

    print_waveform(&waveform);
    Ok(())
}

fn print_waveform(w: &Waveform) {
    let peak = w.envelope
        .iter()
        .enumerate()
        .fold((0usize, 0.0f32), |best, (i, v)| if *v > best.1 { (i, *v) } else { best });
    let mean = if w.envelope.is_empty() {
        0.0
    } else {
        w.envelope.iter().sum::<f32>() / w.envelope.len() as f32
    };
    println!("points:      {} @ {}/s from {:.3}s", w.envelope.len(), w.points_per_second, w.start);
    println!("peak:        {:.3} at {:.3}s", peak.1, w.start + peak.0 as f64 / w.points_per_second as f64);
    println!("mean:        {mean:.3}");
    println!("{}", sparkline(&w.envelope, SPARKLINE_COLUMNS));
}

// ── play ──────────────────────────────────────────────────────────────────────

pub fn play(source: &SourceArgs, config: &ScrubConfig, seconds: f64, from: Option<f64>) -> Result<()> {
    let run_for = Duration::try_from_secs_f64(seconds)
        .map_err(|e| anyhow!("--seconds {seconds}: {e}"))?;
    let handle = open(source, config)?;
    let driver = PlaybackDriver::new(config.playback.clone()).context("starting playback scheduler")?;
    let events = driver.subscribe();

    driver.load(handle)?;
    if let Some(t) = from {
        driver.seek(t)?;
    }
    driver.play()?;

    let deadline  = Instant::now()
        .checked_add(run_for)
        .ok_or_else(|| anyhow!("--seconds {seconds} is too long"))?;
    let mut shown = 0usize;
    let mut last  = Instant::now();
    while Instant::now() < deadline {
        let Ok(event) = events.recv_timeout(PUMP_INTERVAL) else { continue };
        match event {
            PlaybackEvent::FrameReady { timestamp, .. } => {
                shown += 1;
                if last.elapsed() >= Duration::from_millis(500) {
                    log::info!("[cli] position {timestamp:.3}s ({shown} frames)");
                    last = Instant::now();
                }
            }
            PlaybackEvent::StateChanged(t) => {
                log::info!("[cli] transport {t}");
                if t == Transport::Stopped { break; }
            }
            PlaybackEvent::Error(msg) => log::warn!("[cli] playback error: {msg}"),
            PlaybackEvent::ClipLoaded { duration } => log::info!("[cli] clip loaded ({duration:.3}s)"),
            PlaybackEvent::PositionChanged(_) => {}
        }
    }

    let state = driver.snapshot();
    if state.is_playing() {
        driver.pause()?;
    }
    println!("frames:      {shown}");
    println!("position:    {:.3}s / {:.3}s", state.position, state.duration);
    println!("transport:   {}", driver.snapshot().transport);
    Ok(())
}
