//! FFmpeg/FFprobe CLI wrappers for media ingestion.
//!
//! This crate provides:
//! - Duration probing via `ffprobe`
//! - A type-safe FFmpeg command builder with the low-res resize preset
//! - Wait loops for objects that materialise late on a storage mount

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod probe;

pub use command::{FfmpegCommand, FfmpegRunner, DEFAULT_FFMPEG};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, scratch_path, wait_for_file, wait_for_recent_update};
pub use probe::{parse_duration_output, DurationProbe, DEFAULT_FFPROBE};
