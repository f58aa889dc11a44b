// crates/scrubcut-media/src/ffmpeg_source.rs
//
// FfmpegSource: in-process FFmpeg decoding behind the `MediaSource` seam.
// Only built with the `backend-ffmpeg` feature.
//
// Video keeps one open demuxer + decoder and reads forward whenever it can:
//   • same frame as last time     → cached copy
//   • small forward step (< 2 s)  → decode forward from the current position
//   • backward, or a large jump   → keyframe-aligned backward seek, flush,
//                                   decode forward to the target PTS
//   • back to 0 after any read    → reopen the input, flush
// Frames are scaled to packed RGBA at native size. If EOF arrives before the
// target (the last frame of a file), the last frame decoded is returned.
//
// Audio has its own demuxer. Chunks are resampled to mono f32 at the handle's
// analysis rate; consecutive chunk reads continue from where the previous one
// stopped instead of seeking again. Both cursors share the continue/seek/
// rewind decision in `helpers::reseek`.
//
// Everything in here speaks `anyhow`; errors are mapped to `DecodeError` /
// `OpenError` at the trait boundary.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{anyhow, Context as _, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::sample::{Sample, Type as SampleType};
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::resampling;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;

use scrubcut_core::media_types::{AudioSamples, Frame, MediaInfo};
use scrubcut_core::{DecodeError, OpenError};

use crate::helpers::reseek::{reseek_needed, Reseek};
use crate::helpers::seek::seek_to_secs;
use crate::source::{check_range, MediaSource};

/// Forward jumps longer than this re-seek instead of decoding through.
const MAX_FORWARD_DECODE_SECS: f64 = 2.0;

/// Consecutive demux errors tolerated before a read gives up.
const MAX_PACKET_ERRORS: usize = 32;

/// Audio cursors continue across reads landing within this many samples of
/// where the last read stopped.
const AUDIO_SLACK_SAMPLES: i64 = 2;

/// Mono packed f32, what the waveform reducer consumes.
const AUDIO_FMT: Sample = Sample::F32(SampleType::Packed);

fn init() -> Result<(), OpenError> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();
    INIT.get_or_init(|| ffmpeg::init().map_err(|e| e.to_string()))
        .clone()
        .map_err(OpenError::Backend)
}

fn backend(t: f64) -> impl Fn(anyhow::Error) -> DecodeError {
    move |e| {
        log::warn!("[ffmpeg] decode at {t:.3}s: {e:#}");
        DecodeError::Backend(format!("{e:#}"))
    }
}

// ── Video ─────────────────────────────────────────────────────────────────────

struct VideoCursor {
    path:       PathBuf,
    ictx:       ffmpeg::format::context::Input,
    decoder:    ffmpeg::decoder::video::Video,
    stream_idx: usize,
    tb_num:     i32,
    tb_den:     i32,
    scaler:     SwsContext,
    width:      u32,
    height:     u32,
    /// PTS of the last frame pulled from the decoder; `None` after a seek.
    last_pts:   Option<i64>,
    last_frame: Option<Frame>,
    /// No packet has been read since the input was (re)opened.
    fresh:      bool,
}

impl VideoCursor {
    fn open(path: &Path) -> Result<Self, OpenError> {
        let ictx = input(path).map_err(|e| OpenError::Unsupported(e.to_string()))?;
        let stream = ictx.streams().best(Type::Video)
            .ok_or_else(|| OpenError::NoStream(path.to_path_buf()))?;
        let stream_idx = stream.index();
        let tb = stream.time_base();
        let (tb_num, tb_den) = (tb.numerator(), tb.denominator());

        // Second context for decoder params (Parameters borrows from the
        // stream, which borrows `ictx`).
        let params_ctx = input(path).map_err(|e| OpenError::Unsupported(e.to_string()))?;
        let params = params_ctx.stream(stream_idx)
            .ok_or_else(|| OpenError::NoStream(path.to_path_buf()))?;
        let decoder = ffmpeg::codec::context::Context::from_parameters(params.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| OpenError::Unsupported(e.to_string()))?;

        let (width, height) = (decoder.width().max(2), decoder.height().max(2));
        let scaler = SwsContext::get(
            decoder.format(), decoder.width(), decoder.height(),
            Pixel::RGBA, width, height, Flags::BILINEAR,
        ).map_err(|e| OpenError::Backend(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            ictx, decoder, stream_idx, tb_num, tb_den, scaler, width, height,
            last_pts:   None,
            last_frame: None,
            fresh:      true,
        })
    }

    fn ts_to_pts(&self, t: f64) -> i64 {
        (t * self.tb_den as f64 / self.tb_num.max(1) as f64) as i64
    }

    fn pts_to_secs(&self, pts: i64) -> f64 {
        pts as f64 * self.tb_num as f64 / self.tb_den.max(1) as f64
    }

    fn reposition(&mut self, t: f64, target_pts: i64) -> Result<()> {
        let window = self.ts_to_pts(MAX_FORWARD_DECODE_SECS);
        match reseek_needed(self.fresh, self.last_pts, target_pts, 0, window) {
            Reseek::Continue => return Ok(()),
            Reseek::Seek => {
                seek_to_secs(&mut self.ictx, t, "video");
            }
            Reseek::Rewind => {
                log::debug!("[ffmpeg] video rewind: reopening {}", self.path.display());
                self.ictx  = input(&self.path).context("reopen for rewind")?;
                self.fresh = true;
            }
        }
        self.decoder.flush();
        self.last_pts   = None;
        self.last_frame = None;
        Ok(())
    }

    fn read(&mut self, t: f64) -> Result<Frame> {
        let target_pts = self.ts_to_pts(t);

        if let (Some(last), Some(frame)) = (self.last_pts, &self.last_frame) {
            if last == target_pts {
                return Ok(Frame { timestamp: t, ..frame.clone() });
            }
        }

        self.reposition(t, target_pts)?;

        let mut last_good: Option<Frame> = None;
        let mut errors = 0usize;
        loop {
            self.fresh = false;
            let (idx, packet) = match self.ictx.packets().next() {
                None                     => break,
                Some(Ok((stream, pkt)))  => { errors = 0; (stream.index(), pkt) }
                Some(Err(e)) => {
                    errors += 1;
                    log::warn!("[ffmpeg] video demux error near t={t:.3}: {e}");
                    if errors > MAX_PACKET_ERRORS { return Err(anyhow!("demux: {e}")); }
                    continue;
                }
            };
            if idx != self.stream_idx { continue; }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::warn!("[ffmpeg] video packet rejected near t={t:.3}: {e}");
                continue;
            }

            let mut decoded = VideoFrame::empty();
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts = decoded.pts().unwrap_or_else(|| self.last_pts.map_or(0, |p| p + 1));
                self.last_pts = Some(pts);
                let frame = self.scale(&decoded, self.pts_to_secs(pts))?;
                if pts < target_pts {
                    last_good = Some(frame);
                    continue;
                }
                self.last_frame = Some(frame.clone());
                return Ok(Frame { timestamp: t, ..frame });
            }
        }

        // EOF before the target: show the last frame we saw.
        let frame = last_good.or_else(|| self.last_frame.clone())
            .ok_or_else(|| anyhow!("no frame found at t={t:.3}"))?;
        self.last_frame = Some(frame.clone());
        Ok(Frame { timestamp: t, ..frame })
    }

    fn scale(&mut self, decoded: &VideoFrame, timestamp: f64) -> Result<Frame> {
        let mut out = VideoFrame::empty();
        self.scaler.run(decoded, &mut out).context("swscale")?;
        let stride = out.stride(0);
        let row    = self.width as usize * 4;
        let raw    = out.data(0);
        let data: Vec<u8> = (0..self.height as usize)
            .flat_map(|y| &raw[y * stride..y * stride + row])
            .copied()
            .collect();
        Ok(Frame { timestamp, width: self.width, height: self.height, data })
    }
}

// ── Audio ─────────────────────────────────────────────────────────────────────

struct AudioCursor {
    path:       PathBuf,
    ictx:       ffmpeg::format::context::Input,
    decoder:    ffmpeg::decoder::audio::Audio,
    stream_idx: usize,
    tb_num:     i32,
    tb_den:     i32,
    rate:       u32,
    resampler:  Option<resampling::Context>,
    /// Samples decoded past the end of the previous read.
    carry:      Vec<f32>,
    /// Media time of `carry[0]`; `None` after a seek or before the first read.
    cursor:     Option<f64>,
    eof_sent:   bool,
    /// No packet has been read since the input was (re)opened.
    fresh:      bool,
}

impl AudioCursor {
    fn open(path: &Path, rate: u32) -> Result<Option<Self>> {
        let ictx = input(path)?;
        let Some(stream) = ictx.streams().best(Type::Audio) else { return Ok(None) };
        let stream_idx = stream.index();
        let tb = stream.time_base();
        let dec_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = dec_ctx.decoder().audio()?;
        let (tb_num, tb_den) = (tb.numerator(), tb.denominator());

        Ok(Some(Self {
            path: path.to_path_buf(),
            ictx, decoder, stream_idx, tb_num, tb_den,
            rate:      rate.max(1),
            resampler: None,
            carry:     Vec::new(),
            cursor:    None,
            eof_sent:  false,
            fresh:     true,
        }))
    }

    fn read(&mut self, t0: f64, t1: f64) -> Result<Vec<f32>> {
        let rate  = self.rate as f64;
        let want  = ((t1 - t0) * rate).round().max(0.0) as usize;
        let mut out = Vec::with_capacity(want);

        let last   = self.cursor.map(|c| (c * rate).round() as i64);
        let target = (t0 * rate).round() as i64;
        let decision = reseek_needed(self.fresh, last, target, AUDIO_SLACK_SAMPLES, AUDIO_SLACK_SAMPLES);
        match decision {
            Reseek::Continue => out.append(&mut self.carry),
            Reseek::Seek => {
                seek_to_secs(&mut self.ictx, t0, "audio");
            }
            Reseek::Rewind => {
                log::debug!("[ffmpeg] audio rewind: reopening {}", self.path.display());
                self.ictx  = input(&self.path).context("reopen for rewind")?;
                self.fresh = true;
            }
        }
        let seeked = decision != Reseek::Continue;
        if seeked {
            self.decoder.flush();
            self.carry.clear();
            self.eof_sent = false;
        }

        while out.len() < want {
            let Some((start, samples)) = self.next_chunk()? else { break };
            // Drop pre-roll left by the keyframe-aligned seek.
            let skip = if seeked && start < t0 {
                (((t0 - start) * self.rate as f64).round() as usize).min(samples.len())
            } else {
                0
            };
            out.extend_from_slice(&samples[skip..]);
        }

        if out.len() > want {
            self.carry = out.split_off(want);
        }
        self.cursor = Some(t0 + want as f64 / self.rate as f64);
        // Short at EOF: pad with silence so chunk sizes stay predictable.
        out.resize(want, 0.0);
        Ok(out)
    }

    fn next_chunk(&mut self) -> Result<Option<(f64, Vec<f32>)>> {
        let mut frame  = AudioFrame::empty();
        let mut errors = 0usize;
        loop {
            if self.decoder.receive_frame(&mut frame).is_ok() {
                let start = frame.pts()
                    .map(|p| p as f64 * self.tb_num as f64 / self.tb_den.max(1) as f64)
                    .unwrap_or_else(|| self.cursor.unwrap_or(0.0));
                let samples = self.resample(&frame)?;
                return Ok(Some((start, samples)));
            }
            if self.eof_sent {
                return Ok(None);
            }

            self.fresh = false;
            let (idx, packet) = match self.ictx.packets().next() {
                None => {
                    if let Err(e) = self.decoder.send_eof() {
                        log::warn!("[ffmpeg] audio decoder refused EOF: {e}");
                    }
                    self.eof_sent = true;
                    continue;
                }
                Some(Ok((stream, pkt))) => { errors = 0; (stream.index(), pkt) }
                Some(Err(e)) => {
                    errors += 1;
                    log::warn!("[ffmpeg] audio demux error: {e}");
                    if errors > MAX_PACKET_ERRORS { return Err(anyhow!("demux: {e}")); }
                    continue;
                }
            };
            if idx != self.stream_idx { continue; }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::warn!("[ffmpeg] audio packet rejected: {e}");
            }
        }
    }

    /// Resample one decoded frame to mono packed f32 at `rate`. The resampler
    /// is built lazily from the first frame's real format and layout.
    fn resample(&mut self, frame: &AudioFrame) -> Result<Vec<f32>> {
        if self.resampler.is_none() {
            let src_layout = if frame.ch_layout().channels() >= 2 {
                frame.ch_layout()
            } else {
                ChannelLayout::MONO
            };
            let ctx = resampling::Context::get2(
                frame.format(), src_layout,          frame.rate(),
                AUDIO_FMT,      ChannelLayout::MONO, self.rate,
            ).context("create audio resampler")?;
            self.resampler = Some(ctx);
        }
        let Some(rs) = self.resampler.as_mut() else { return Ok(Vec::new()) };

        let mut resampled = AudioFrame::empty();
        rs.run(frame, &mut resampled).context("resample")?;
        let n    = resampled.samples();
        let data = resampled.data(0);
        Ok(data.chunks_exact(4)
            .take(n)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}

// ── FfmpegSource ──────────────────────────────────────────────────────────────

pub struct FfmpegSource {
    info:  MediaInfo,
    video: VideoCursor,
    audio: Option<AudioCursor>,
}

impl FfmpegSource {
    pub fn open(path: &Path, audio_rate: u32) -> Result<Self, OpenError> {
        init()?;
        let video = VideoCursor::open(path)?;
        let audio = match AudioCursor::open(path, audio_rate) {
            Ok(a)  => a,
            Err(e) => {
                // A broken audio stream should not make the video unusable.
                log::warn!("[ffmpeg] audio unavailable in {}: {e:#}", path.display());
                None
            }
        };

        let (duration, fps) = probe_timing(path)
            .map_err(|e| OpenError::Backend(format!("{e:#}")))?;
        let info = MediaInfo {
            path:        Some(PathBuf::from(path)),
            duration,
            fps,
            sample_rate: audio_rate.max(1),
            width:       video.width,
            height:      video.height,
            has_audio:   audio.is_some(),
        };
        log::info!(
            "[ffmpeg] opened {}: {duration:.2}s @ {fps:.2} fps, {}x{}, audio={}",
            path.display(), info.width, info.height, info.has_audio,
        );
        Ok(Self { info, video, audio })
    }
}

/// Container duration (falling back to the stream's) and average frame rate.
fn probe_timing(path: &Path) -> Result<(f64, f64)> {
    let ictx = input(path)?;
    let stream = ictx.streams().best(Type::Video)
        .ok_or_else(|| anyhow!("no video stream"))?;

    let mut duration = ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
    if duration <= 0.0 {
        let tb = stream.time_base();
        duration = stream.duration() as f64 * tb.numerator() as f64 / tb.denominator().max(1) as f64;
    }

    let rate = stream.avg_frame_rate();
    let fps = if rate.denominator() != 0 && rate.numerator() > 0 {
        rate.numerator() as f64 / rate.denominator() as f64
    } else {
        0.0
    };
    Ok((duration.max(0.0), fps))
}

impl MediaSource for FfmpegSource {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn read_frame(&mut self, t: f64) -> Result<Frame, DecodeError> {
        check_range(&self.info, t)?;
        let t = self.info.clamp_time(t);
        self.video.read(t).map_err(backend(t))
    }

    fn read_audio(&mut self, t0: f64, t1: f64) -> Result<AudioSamples, DecodeError> {
        let audio = self.audio.as_mut().ok_or(DecodeError::NoAudio)?;
        check_range(&self.info, t0)?;
        check_range(&self.info, t1)?;
        let (t0, t1) = (self.info.clamp_time(t0), self.info.clamp_time(t1));
        let samples = audio.read(t0, t1).map_err(backend(t0))?;
        Ok(AudioSamples { start: t0, sample_rate: self.info.sample_rate, samples })
    }
}
