use ffmpeg_next as ffmpeg;
use std::path::Path;
use tracing::debug;

use crate::error::{FennecError, Result};
use crate::types::file::VideoProbe;

/// Probe a container for the technical metadata stored on the file row.
/// A rejection from the demuxer is terminal for the file.
pub fn probe_file(path: &Path) -> Result<VideoProbe> {
    super::init_ffmpeg();

    debug!("probing {}", path.display());

    let input = ffmpeg::format::input(path).map_err(|e| {
        FennecError::UnreadableMedia(format!("{}: {e}", path.display()))
    })?;

    let mut probe = VideoProbe::default();

    if input.duration() != ffmpeg::ffi::AV_NOPTS_VALUE {
        probe.duration_secs =
            Some(input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE));
    }

    let mut best_width = 0u32;
    let mut audio_tracks = 0i32;

    for stream in input.streams() {
        let codec = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;

        match codec.medium() {
            ffmpeg::media::Type::Video => {
                let Ok(video) = codec.decoder().video() else {
                    continue;
                };
                let width = video.width();
                let height = video.height();
                let codec_name = video
                    .codec()
                    .map(|c| c.name().to_string())
                    .unwrap_or_default();

                // Skip cover-art streams.
                let is_attachment = codec_name == "mjpeg"
                    || stream
                        .disposition()
                        .contains(ffmpeg::format::stream::Disposition::ATTACHED_PIC);

                if is_attachment || width <= best_width {
                    continue;
                }
                best_width = width;

                probe.width = Some(width as i32);
                probe.height = Some(height as i32);
                probe.codec = Some(codec_name);
                probe.pixel_format = Some(format!("{:?}", video.format()).to_lowercase());
                probe.color_space = Some(format!("{:?}", video.color_space()).to_lowercase());
                probe.color_transfer =
                    Some(format!("{:?}", video.color_transfer_characteristic()).to_lowercase());
                probe.color_primaries =
                    Some(format!("{:?}", video.color_primaries()).to_lowercase());

                let rate = stream.avg_frame_rate();
                if rate.denominator() != 0 {
                    probe.fps =
                        Some(rate.numerator() as f64 / rate.denominator() as f64);
                }
            }
            ffmpeg::media::Type::Audio => {
                audio_tracks += 1;
            }
            _ => {}
        }
    }

    probe.audio_tracks = Some(audio_tracks);

    if probe.width.is_none() {
        return Err(FennecError::UnreadableMedia(format!(
            "{}: no usable video stream",
            path.display()
        )));
    }

    debug!(
        "probed {}: {}x{} {} {:.3}s",
        path.display(),
        probe.width.unwrap_or(0),
        probe.height.unwrap_or(0),
        probe.codec.as_deref().unwrap_or("unknown"),
        probe.duration_secs.unwrap_or(0.0),
    );

    Ok(probe)
}
