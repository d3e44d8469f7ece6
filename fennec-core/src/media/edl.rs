use std::fmt::Write as _;

use crate::error::{FennecError, Result};

/// One event of an export: a scene interval addressed by source
/// timecode at the clip's own frame rate.
#[derive(Debug, Clone, PartialEq)]
pub struct EdlClip {
    pub scene_id: i64,
    pub in_secs: f64,
    pub out_secs: f64,
    pub fps: f64,
    pub clip_name: String,
}

/// Render seconds as non-drop `HH:MM:SS:FF` at the given frame rate.
pub fn timecode(secs: f64, fps: f64) -> String {
    let total_frames = (secs * fps).round() as i64;
    let fps_i = fps.round().max(1.0) as i64;
    let frames = total_frames % fps_i;
    let total_secs = total_frames / fps_i;
    let (hours, minutes, seconds) = (
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
    );
    format!("{hours:02}:{minutes:02}:{seconds:02}:{frames:02}")
}

/// Parse non-drop `HH:MM:SS:FF` back to seconds at the given frame rate.
pub fn parse_timecode(tc: &str, fps: f64) -> Result<f64> {
    let parts: Vec<&str> = tc.split(':').collect();
    if parts.len() != 4 {
        return Err(FennecError::BadRequest(format!("malformed timecode '{tc}'")));
    }
    let mut fields = [0i64; 4];
    for (i, part) in parts.iter().enumerate() {
        fields[i] = part
            .parse()
            .map_err(|_| FennecError::BadRequest(format!("malformed timecode '{tc}'")))?;
    }
    let [hours, minutes, seconds, frames] = fields;
    let fps_i = fps.round().max(1.0) as i64;
    let total_frames = ((hours * 3600 + minutes * 60 + seconds) * fps_i) + frames;
    Ok(total_frames as f64 / fps)
}

/// Emit a CMX3600-style edit list. Record timecodes accumulate on the
/// timeline at each clip's own frame rate; source in/out address the
/// original file.
pub fn export_edl(title: &str, clips: &[EdlClip]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "TITLE: {title}");
    let _ = writeln!(out, "FCM: NON-DROP FRAME");
    let _ = writeln!(out);

    let mut record_secs = 0.0f64;
    for (i, clip) in clips.iter().enumerate() {
        let duration = clip.out_secs - clip.in_secs;
        let src_in = timecode(clip.in_secs, clip.fps);
        let src_out = timecode(clip.out_secs, clip.fps);
        let rec_in = timecode(record_secs, clip.fps);
        let rec_out = timecode(record_secs + duration, clip.fps);

        let _ = writeln!(
            out,
            "{:03}  AX       V     C        {src_in} {src_out} {rec_in} {rec_out}",
            i + 1
        );
        let _ = writeln!(out, "* FROM CLIP NAME: {}", clip.clip_name);
        let _ = writeln!(out, "* SCENE ID: {}", clip.scene_id);
        let _ = writeln!(out);

        record_secs += duration;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timecode_formatting() {
        assert_eq!(timecode(0.0, 25.0), "00:00:00:00");
        assert_eq!(timecode(1.0, 25.0), "00:00:01:00");
        assert_eq!(timecode(1.5, 24.0), "00:00:01:12");
        assert_eq!(timecode(3661.0, 30.0), "01:01:01:00");
    }

    #[test]
    fn timecode_round_trips_within_one_frame() {
        for fps in [23.976, 24.0, 25.0, 29.97, 30.0, 60.0] {
            for secs in [0.0, 0.04, 1.0, 59.96, 61.5, 3599.9] {
                let tc = timecode(secs, fps);
                let back = parse_timecode(&tc, fps).unwrap();
                assert!(
                    (back - secs).abs() <= 1.0 / fps + 1e-9,
                    "fps={fps} secs={secs} tc={tc} back={back}"
                );
            }
        }
    }

    #[test]
    fn export_round_trips_clip_bounds() {
        let clips = vec![
            EdlClip {
                scene_id: 10,
                in_secs: 1.2,
                out_secs: 4.8,
                fps: 25.0,
                clip_name: "a.mp4".into(),
            },
            EdlClip {
                scene_id: 22,
                in_secs: 0.0,
                out_secs: 2.0,
                fps: 25.0,
                clip_name: "b.mp4".into(),
            },
        ];
        let edl = export_edl("test", &clips);
        assert!(edl.starts_with("TITLE: test"));
        assert!(edl.contains("FCM: NON-DROP FRAME"));

        let events: Vec<&str> = edl
            .lines()
            .filter(|l| l.starts_with(|c: char| c.is_ascii_digit()))
            .collect();
        assert_eq!(events.len(), 2);

        for (event, clip) in events.iter().zip(&clips) {
            let cols: Vec<&str> = event.split_whitespace().collect();
            let src_in = parse_timecode(cols[4], clip.fps).unwrap();
            let src_out = parse_timecode(cols[5], clip.fps).unwrap();
            assert!((src_in - clip.in_secs).abs() <= 1.0 / clip.fps);
            assert!((src_out - clip.out_secs).abs() <= 1.0 / clip.fps);
        }
    }

    #[test]
    fn malformed_timecode_is_rejected() {
        assert!(parse_timecode("1:2:3", 25.0).is_err());
        assert!(parse_timecode("aa:bb:cc:dd", 25.0).is_err());
    }
}
