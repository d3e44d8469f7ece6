use ffmpeg_next as ffmpeg;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{FennecError, Result};
use crate::types::scene::NewScene;

/// Histogram distance above which a frame starts a new scene.
const CUT_THRESHOLD: f64 = 0.45;
/// Minimum scene length; cuts closer than this to the previous cut are
/// treated as flicker and ignored.
const MIN_SCENE_SECS: f64 = 1.0;
/// Analysis resolution. Detection compares color distributions, which
/// survive heavy downscaling.
const SAMPLE_WIDTH: u32 = 64;
const SAMPLE_HEIGHT: u32 = 36;
/// Histogram bins per RGB channel.
const BINS: usize = 8;

type Histogram = [f64; BINS * 3];

fn histogram_of(data: &[u8], stride: usize, width: usize, height: usize) -> Histogram {
    let mut hist = [0.0f64; BINS * 3];
    for y in 0..height {
        let row = &data[y * stride..y * stride + width * 3];
        for px in row.chunks_exact(3) {
            for (channel, &value) in px.iter().enumerate() {
                let bin = (value as usize * BINS) / 256;
                hist[channel * BINS + bin] += 1.0;
            }
        }
    }
    let total = (width * height) as f64;
    for v in hist.iter_mut() {
        *v /= total;
    }
    hist
}

/// L1 distance between normalized histograms, halved so identical frames
/// score 0 and disjoint distributions score 3 (1 per channel).
fn histogram_distance(a: &Histogram, b: &Histogram) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum::<f64>() / 2.0
}

/// Streaming cut decision, separated from the decode loop so it can be
/// exercised on synthetic histograms.
#[derive(Debug)]
struct CutDetector {
    previous: Option<Histogram>,
    last_cut_secs: f64,
    cuts: Vec<f64>,
}

impl CutDetector {
    fn new() -> Self {
        Self {
            previous: None,
            last_cut_secs: 0.0,
            cuts: Vec::new(),
        }
    }

    fn push(&mut self, timestamp_secs: f64, hist: Histogram) {
        if let Some(prev) = &self.previous {
            let distance = histogram_distance(prev, &hist);
            if distance >= CUT_THRESHOLD
                && timestamp_secs - self.last_cut_secs >= MIN_SCENE_SECS
            {
                self.cuts.push(timestamp_secs);
                self.last_cut_secs = timestamp_secs;
            }
        }
        self.previous = Some(hist);
    }

    /// Turn cut timestamps into a strictly ordered non-overlapping cover
    /// of `[0, duration)`. No cuts yields the single whole-file scene.
    fn into_cover(self, duration_secs: f64) -> Vec<NewScene> {
        let mut scenes = Vec::with_capacity(self.cuts.len() + 1);
        let mut start = 0.0f64;
        for cut in self.cuts {
            if cut <= start || cut >= duration_secs {
                continue;
            }
            scenes.push(NewScene {
                start_secs: start,
                end_secs: cut,
            });
            start = cut;
        }
        if duration_secs > start {
            scenes.push(NewScene {
                start_secs: start,
                end_secs: duration_secs,
            });
        }
        scenes
    }
}

/// Run the content-based detector over a file's decoded frames. Yields an
/// ordered cover of `[0, duration)` with exclusive ends.
pub fn detect_scenes(path: &Path, duration_secs: f64) -> Result<Vec<NewScene>> {
    super::init_ffmpeg();

    let mut input = ffmpeg::format::input(path).map_err(|e| {
        FennecError::UnreadableMedia(format!("{}: {e}", path.display()))
    })?;

    let stream = input
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| {
            FennecError::UnreadableMedia(format!("{}: no video stream", path.display()))
        })?;
    let stream_index = stream.index();
    let time_base = stream.time_base();

    let codec = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
    let mut decoder = codec.decoder().video()?;

    let mut scaler = ffmpeg::software::scaling::context::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg::format::Pixel::RGB24,
        SAMPLE_WIDTH,
        SAMPLE_HEIGHT,
        ffmpeg::software::scaling::flag::Flags::FAST_BILINEAR,
    )?;

    let mut detector = CutDetector::new();
    let mut decoded = ffmpeg::util::frame::video::Video::empty();
    let mut small = ffmpeg::util::frame::video::Video::empty();
    let mut frames = 0u64;

    let tb = time_base.numerator() as f64 / time_base.denominator() as f64;

    let consume = |frame: &ffmpeg::util::frame::video::Video,
                       detector: &mut CutDetector,
                       scaler: &mut ffmpeg::software::scaling::context::Context,
                       small: &mut ffmpeg::util::frame::video::Video|
     -> Result<()> {
        let Some(pts) = frame.pts() else {
            return Ok(());
        };
        let timestamp = pts as f64 * tb;
        scaler.run(frame, small)?;
        let hist = histogram_of(
            small.data(0),
            small.stride(0),
            SAMPLE_WIDTH as usize,
            SAMPLE_HEIGHT as usize,
        );
        detector.push(timestamp, hist);
        Ok(())
    };

    for (stream, packet) in input.packets() {
        if stream.index() != stream_index {
            continue;
        }
        if let Err(e) = decoder.send_packet(&packet) {
            debug!("send_packet failed during scene detection: {e}");
            continue;
        }
        while decoder.receive_frame(&mut decoded).is_ok() {
            frames += 1;
            consume(&decoded, &mut detector, &mut scaler, &mut small)?;
        }
    }

    // Drain the decoder.
    if decoder.send_eof().is_ok() {
        while decoder.receive_frame(&mut decoded).is_ok() {
            frames += 1;
            consume(&decoded, &mut detector, &mut scaler, &mut small)?;
        }
    }

    if frames == 0 {
        warn!("{}: no frames decoded, treating as single scene", path.display());
    }

    let scenes = detector.into_cover(duration_secs);
    debug!(
        "{}: {} frames analyzed, {} scenes",
        path.display(),
        frames,
        scenes.len()
    );
    Ok(scenes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: usize) -> Histogram {
        // All mass in one bin per channel.
        let mut hist = [0.0; BINS * 3];
        for channel in 0..3 {
            hist[channel * BINS + value] = 1.0;
        }
        hist
    }

    #[test]
    fn no_cuts_yields_single_scene() {
        let mut detector = CutDetector::new();
        for i in 0..100 {
            detector.push(i as f64 / 25.0, flat(2));
        }
        let scenes = detector.into_cover(60.0);
        assert_eq!(
            scenes,
            vec![NewScene {
                start_secs: 0.0,
                end_secs: 60.0
            }]
        );
    }

    #[test]
    fn content_change_is_a_cut() {
        let mut detector = CutDetector::new();
        for i in 0..50 {
            detector.push(i as f64 * 0.1, flat(1));
        }
        for i in 50..100 {
            detector.push(i as f64 * 0.1, flat(6));
        }
        let scenes = detector.into_cover(10.0);
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].start_secs, 0.0);
        assert!((scenes[0].end_secs - 5.0).abs() < 1e-9);
        assert!((scenes[1].start_secs - 5.0).abs() < 1e-9);
        assert_eq!(scenes[1].end_secs, 10.0);
    }

    #[test]
    fn flicker_within_min_scene_length_is_ignored() {
        let mut detector = CutDetector::new();
        detector.push(0.0, flat(1));
        detector.push(0.2, flat(6));
        detector.push(0.4, flat(1));
        let scenes = detector.into_cover(8.0);
        assert_eq!(scenes.len(), 1);
    }

    #[test]
    fn cover_is_ordered_and_contiguous() {
        let mut detector = CutDetector::new();
        let mut bin = 0;
        for i in 0..300 {
            let t = i as f64 * 0.1;
            if i % 60 == 0 && i > 0 {
                bin = (bin + 3) % BINS;
            }
            detector.push(t, flat(bin));
        }
        let scenes = detector.into_cover(30.0);
        assert!(!scenes.is_empty());
        let mut cursor = 0.0;
        for scene in &scenes {
            assert_eq!(scene.start_secs, cursor);
            assert!(scene.end_secs > scene.start_secs);
            cursor = scene.end_secs;
        }
        assert_eq!(cursor, 30.0);
    }
}
