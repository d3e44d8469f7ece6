use ffmpeg_next as ffmpeg;
use std::path::Path;
use tracing::debug;

use crate::error::{FennecError, Result};

/// Output format expected by the speech-to-text host.
const TARGET_RATE: u32 = 16_000;

/// Extract one scene's audio as 16 kHz mono s16 WAV bytes. Returns
/// `None` when the file has no audio stream; an empty-duration range
/// yields a valid WAV with zero samples.
pub fn extract_audio_range(
    path: &Path,
    start_secs: f64,
    end_secs: f64,
) -> Result<Option<Vec<u8>>> {
    super::init_ffmpeg();

    let mut input = ffmpeg::format::input(path).map_err(|e| {
        FennecError::UnreadableMedia(format!("{}: {e}", path.display()))
    })?;

    let Some(stream) = input.streams().best(ffmpeg::media::Type::Audio) else {
        return Ok(None);
    };
    let stream_index = stream.index();
    let time_base = stream.time_base();
    let tb = time_base.numerator() as f64 / time_base.denominator() as f64;

    let codec = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
    let mut decoder = codec.decoder().audio()?;

    let position_us = (start_secs * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
    if start_secs > 0.0 && input.seek(position_us, ..).is_err() {
        debug!("audio seek to {start_secs:.3}s failed, decoding from start");
    }

    let mut resampler = ffmpeg::software::resampling::context::Context::get(
        decoder.format(),
        decoder.channel_layout(),
        decoder.rate(),
        ffmpeg::format::Sample::I16(ffmpeg::format::sample::Type::Packed),
        ffmpeg::ChannelLayout::MONO,
        TARGET_RATE,
    )?;

    let mut pcm: Vec<u8> = Vec::new();
    let mut decoded = ffmpeg::util::frame::audio::Audio::empty();
    let mut resampled = ffmpeg::util::frame::audio::Audio::empty();

    let consume = |frame: &ffmpeg::util::frame::audio::Audio,
                       pcm: &mut Vec<u8>,
                       resampler: &mut ffmpeg::software::resampling::context::Context,
                       resampled: &mut ffmpeg::util::frame::audio::Audio|
     -> Result<bool> {
        // Frames entirely before the scene start are seek overshoot.
        if let Some(pts) = frame.pts() {
            let timestamp = pts as f64 * tb;
            if timestamp >= end_secs {
                return Ok(true);
            }
            if timestamp < start_secs {
                return Ok(false);
            }
        }
        resampler.run(frame, resampled)?;
        if resampled.samples() > 0 {
            let bytes = resampled.samples() * 2;
            pcm.extend_from_slice(&resampled.data(0)[..bytes]);
        }
        Ok(false)
    };

    'outer: for (stream, packet) in input.packets() {
        if stream.index() != stream_index {
            continue;
        }
        if decoder.send_packet(&packet).is_err() {
            continue;
        }
        while decoder.receive_frame(&mut decoded).is_ok() {
            if consume(&decoded, &mut pcm, &mut resampler, &mut resampled)? {
                break 'outer;
            }
        }
    }

    if decoder.send_eof().is_ok() {
        while decoder.receive_frame(&mut decoded).is_ok() {
            if consume(&decoded, &mut pcm, &mut resampler, &mut resampled)? {
                break;
            }
        }
    }

    Ok(Some(wrap_wav(&pcm, TARGET_RATE)))
}

/// Minimal PCM WAV container: 44-byte header, 16-bit mono.
fn wrap_wav(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let byte_rate = sample_rate * 2;
    let mut wav = Vec::with_capacity(44 + pcm.len());

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_is_well_formed() {
        let pcm = vec![0u8; 32_000];
        let wav = wrap_wav(&pcm, TARGET_RATE);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + pcm.len());
        let data_len = u32::from_le_bytes(wav[40..44].try_into().unwrap());
        assert_eq!(data_len as usize, pcm.len());
        let rate = u32::from_le_bytes(wav[24..28].try_into().unwrap());
        assert_eq!(rate, TARGET_RATE);
    }

    #[test]
    fn empty_audio_is_a_valid_container() {
        let wav = wrap_wav(&[], TARGET_RATE);
        assert_eq!(wav.len(), 44);
        let data_len = u32::from_le_bytes(wav[40..44].try_into().unwrap());
        assert_eq!(data_len, 0);
    }
}
