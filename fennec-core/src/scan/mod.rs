//! Scanner: reconciles the `video_files` table with the watch roots.

mod scanner;

pub use scanner::{Scanner, is_video_file, VIDEO_EXTENSIONS};
