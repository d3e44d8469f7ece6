//! Media decoding boundary: probing, frame extraction, scene detection,
//! audio extraction, and EDL export. Everything here wraps ffmpeg and is
//! synchronous; callers run it under `spawn_blocking`.

pub mod audio;
pub mod edl;
pub mod frames;
pub mod probe;
pub mod scene_detect;

use std::sync::Once;

static FFMPEG_INIT: Once = Once::new();

/// Initialize ffmpeg once per process. Safe to call from every entry
/// point; later calls are no-ops.
pub fn init_ffmpeg() {
    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg_next::init() {
            tracing::error!("ffmpeg initialization failed: {e}");
        }
    });
}
