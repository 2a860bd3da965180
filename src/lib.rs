use std::path::PathBuf;

pub mod cuts;
pub mod util;
pub mod video;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("video file not found at: {0:?}")]
    VideoNotFound(PathBuf),
    #[error("no video stream found in: {0:?}")]
    NoVideoStream(PathBuf),
    #[error("no decodable frame at or after {time:.3}s")]
    NoFrameAt { time: f64 },
    #[error("decoded frame has an unexpected layout ({width}x{height})")]
    FrameLayout { width: u32, height: u32 },
    #[error("FFmpeg error: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),
    #[error("image error: {0}")]
    ImageError(#[from] image::ImageError),
    #[error("serde_json error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
