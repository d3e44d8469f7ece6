use ffmpeg_next as ffmpeg;
use image::{ImageBuffer, Rgb, RgbImage};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{FennecError, Result};
use crate::settings::PosterSettings;

/// Decode the frame nearest to `seconds`, returned at source resolution
/// in RGB. Used for poster extraction and face detection input.
pub fn decode_frame_at(path: &Path, seconds: f64) -> Result<RgbImage> {
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
    let codec_params = stream.parameters();

    let mut seek_succeeded = false;
    let position_us = (seconds * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
    if seconds > 0.0 {
        if input.seek(position_us, ..).is_ok() {
            seek_succeeded = true;
        } else {
            warn!("seek to {seconds:.3}s failed, decoding from start");
        }
    }

    let codec = ffmpeg::codec::context::Context::from_parameters(codec_params)?;
    let mut decoder = codec.decoder().video()?;

    if decoder.width() == 0 || decoder.height() == 0 {
        return Err(FennecError::UnreadableMedia(format!(
            "{}: invalid dimensions {}x{}",
            path.display(),
            decoder.width(),
            decoder.height()
        )));
    }

    let mut scaler = ffmpeg::software::scaling::context::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg::format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg::software::scaling::flag::Flags::BILINEAR,
    )?;

    let target_pts = (seconds / f64::from(time_base.numerator())
        * f64::from(time_base.denominator())) as i64;

    let mut decoded = ffmpeg::util::frame::video::Video::empty();
    let mut rgb = ffmpeg::util::frame::video::Video::empty();
    let mut packet_count = 0usize;
    const MAX_PACKETS: usize = 4096;

    for (stream, packet) in input.packets() {
        if stream.index() != stream_index {
            continue;
        }
        packet_count += 1;
        if packet_count > MAX_PACKETS {
            break;
        }

        if let Err(e) = decoder.send_packet(&packet) {
            debug!("send_packet failed: {e}");
            continue;
        }

        while decoder.receive_frame(&mut decoded).is_ok() {
            if decoded.width() == 0 || decoded.format() == ffmpeg::format::Pixel::None {
                continue;
            }

            // After a successful seek we land on the preceding keyframe;
            // keep decoding until the target timestamp passes.
            if seek_succeeded {
                if let Some(pts) = decoded.pts() {
                    if pts < target_pts {
                        continue;
                    }
                }
            }

            scaler.run(&decoded, &mut rgb)?;
            return frame_to_image(&rgb);
        }
    }

    Err(FennecError::UnreadableMedia(format!(
        "{}: no decodable frame near {seconds:.3}s",
        path.display()
    )))
}

/// Copy an RGB24 frame into an `image` buffer, stripping row padding.
pub(crate) fn frame_to_image(frame: &ffmpeg::util::frame::video::Video) -> Result<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let stride = frame.stride(0);
    let data = frame.data(0);

    let row_bytes = (width as usize) * 3;
    let pixels = if stride == row_bytes {
        data[..row_bytes * height as usize].to_vec()
    } else {
        let mut clean = Vec::with_capacity(row_bytes * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            clean.extend_from_slice(&data[start..start + row_bytes]);
        }
        clean
    };

    ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, pixels).ok_or_else(|| {
        FennecError::Internal(format!("frame buffer mismatch at {width}x{height}"))
    })
}

/// Write a poster image at the configured width (preserving aspect) and
/// quality. Returns the final pixel dimensions.
pub fn write_poster(
    frame: &RgbImage,
    out_path: &Path,
    settings: &PosterSettings,
) -> Result<(u32, u32)> {
    let (src_w, src_h) = frame.dimensions();
    let (out_w, out_h) = if src_w > settings.width {
        let h = ((settings.width as f64 / src_w as f64) * src_h as f64).round() as u32;
        (settings.width, h.max(1))
    } else {
        (src_w, src_h)
    };

    let resized = if (out_w, out_h) == (src_w, src_h) {
        frame.clone()
    } else {
        image::imageops::resize(frame, out_w, out_h, image::imageops::FilterType::Triangle)
    };

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match settings.format.as_str() {
        "png" => {
            resized
                .save_with_format(out_path, image::ImageFormat::Png)
                .map_err(|e| FennecError::StageTransient(format!("poster write failed: {e}")))?;
        }
        _ => {
            let file = std::fs::File::create(out_path)?;
            let mut writer = std::io::BufWriter::new(file);
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                &mut writer,
                settings.quality,
            );
            resized
                .write_with_encoder(encoder)
                .map_err(|e| FennecError::StageTransient(format!("poster write failed: {e}")))?;
        }
    }

    Ok((out_w, out_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
    }

    #[test]
    fn poster_downscales_to_configured_width() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("poster.jpg");
        let frame = gradient(1920, 1080);
        let settings = PosterSettings {
            width: 1280,
            quality: 80,
            format: "jpg".into(),
        };

        let (w, h) = write_poster(&frame, &out, &settings).unwrap();
        assert_eq!(w, 1280);
        assert_eq!(h, 720);
        assert!(out.exists());
    }

    #[test]
    fn poster_never_upscales() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("poster.jpg");
        let frame = gradient(640, 360);
        let settings = PosterSettings::default();

        let (w, h) = write_poster(&frame, &out, &settings).unwrap();
        assert_eq!((w, h), (640, 360));
    }
}
