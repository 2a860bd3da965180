extern crate ffmpeg_next;
extern crate image;

use std::path::{Path, PathBuf};

use image::RgbImage;

use super::compare_frames;
use crate::cuts::FrameComparator;
use crate::{Error, Result};

// Container level timestamps (duration, seeking) are in AV_TIME_BASE units.
const AV_TIME_BASE: f64 = 1_000_000.0;

/// Thin wrapper around the native `FFmpeg` video decoder.
struct VideoDecoder {
    decoder: ffmpeg_next::codec::decoder::Video,
    converter: Option<ffmpeg_next::software::scaling::context::Context>,
}

impl VideoDecoder {
    fn build_threading_config() -> ffmpeg_next::codec::threading::Config {
        let mut config = ffmpeg_next::codec::threading::Config::default();
        config.count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        config.kind = ffmpeg_next::codec::threading::Type::Frame;
        config
    }

    fn from_stream(stream: ffmpeg_next::format::stream::Stream, threaded: bool) -> Result<Self> {
        let ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let mut decoder = ctx.decoder();

        if threaded {
            decoder.set_threading(Self::build_threading_config());
        }

        Ok(Self {
            decoder: decoder.video()?,
            converter: None,
        })
    }

    fn set_converter(&mut self, format: ffmpeg_next::format::Pixel) -> Result<()> {
        self.converter = Some(self.decoder.converter(format)?);
        Ok(())
    }

    fn convert_frame(
        &mut self,
        frame: &ffmpeg_next::frame::Video,
        converted_frame: &mut ffmpeg_next::frame::Video,
    ) -> Result<()> {
        if let Some(converter) = &mut self.converter {
            converter.run(frame, converted_frame)?;
        }
        Ok(())
    }

    fn send_packet(&mut self, packet: &ffmpeg_next::packet::Packet) -> Result<()> {
        Ok(self.decoder.send_packet(packet)?)
    }

    fn send_eof(&mut self) -> Result<()> {
        Ok(self.decoder.send_eof()?)
    }

    fn receive_frame(&mut self, frame: &mut ffmpeg_next::frame::Video) -> Result<()> {
        Ok(self.decoder.receive_frame(frame)?)
    }

    /// Drains decoded frames until one is presented at or after `target` (stream time base) and
    /// returns it. Earlier frames are kept in `last`.
    fn receive_until(
        &mut self,
        target: i64,
        frame: &mut ffmpeg_next::frame::Video,
        last: &mut Option<ffmpeg_next::frame::Video>,
    ) -> Option<ffmpeg_next::frame::Video> {
        while self.receive_frame(frame).is_ok() {
            let pts = frame.timestamp().or_else(|| frame.pts());
            if pts.map_or(true, |pts| pts >= target) {
                return Some(std::mem::replace(frame, ffmpeg_next::frame::Video::empty()));
            }
            let spare = last.take().unwrap_or_else(ffmpeg_next::frame::Video::empty);
            *last = Some(std::mem::replace(frame, spare));
        }
        None
    }
}

// Copies an RGB24 frame into an image, dropping any per-row padding.
fn to_rgb_image(frame: &ffmpeg_next::frame::Video) -> Result<RgbImage> {
    let (width, height) = (frame.width(), frame.height());
    let row_len = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut buf = Vec::with_capacity(row_len * height as usize);
    for y in 0..height as usize {
        let row = data
            .get(y * stride..y * stride + row_len)
            .ok_or(Error::FrameLayout { width, height })?;
        buf.extend_from_slice(row);
    }

    RgbImage::from_raw(width, height, buf).ok_or(Error::FrameLayout { width, height })
}

/// Decodes single frames out of a video file.
///
/// Every call opens its own input context and decoder, so a [FrameReader] can be shared between
/// threads freely.
#[derive(Clone, Debug)]
pub struct FrameReader {
    path: PathBuf,
    threaded_decoding: bool,
}

impl FrameReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            threaded_decoding: false,
        }
    }

    /// Returns a new [FrameReader] with FFmpeg threaded decoding enabled or disabled.
    pub fn with_threaded_decoding(mut self, threaded_decoding: bool) -> Self {
        self.threaded_decoding = threaded_decoding;
        self
    }

    /// Returns the first frame presented at or after `time` (seconds), as RGB.
    ///
    /// Requests at or past the end of the clip return the last frame of the video.
    pub fn frame_at(&self, time: f64) -> Result<RgbImage> {
        let span = tracing::span!(tracing::Level::TRACE, "frame_at", time);
        let _enter = span.enter();

        let mut ctx = ffmpeg_next::format::input(&self.path)?;
        let stream = ctx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| Error::NoVideoStream(self.path.clone()))?;
        let stream_idx = stream.index();
        let time_base = f64::from(stream.time_base());
        let mut decoder = VideoDecoder::from_stream(stream, self.threaded_decoding)?;
        decoder.set_converter(ffmpeg_next::format::Pixel::RGB24)?;

        // Unknown durations are reported as zero or negative.
        let duration = (ctx.duration() > 0).then(|| ctx.duration() as f64 / AV_TIME_BASE);
        let seek_time = clamp_to_duration(time, duration);

        // Land on the closest keyframe at or before the target, then decode forward.
        if seek_time > 0.0 {
            let timestamp = (seek_time * AV_TIME_BASE) as i64;
            ctx.seek(timestamp, ..timestamp)?;
        }

        let target = (seek_time / time_base) as i64;
        let mut frame = ffmpeg_next::frame::Video::empty();
        let mut last = None;
        let mut reached = None;

        for (s, packet) in ctx.packets() {
            if s.index() != stream_idx {
                continue;
            }
            decoder.send_packet(&packet)?;
            reached = decoder.receive_until(target, &mut frame, &mut last);
            if reached.is_some() {
                break;
            }
        }

        if reached.is_none() {
            decoder.send_eof()?;
            reached = decoder.receive_until(target, &mut frame, &mut last);
            if reached.is_none() && last.is_some() {
                tracing::debug!(time, ?duration, "target is past the last frame");
            }
        }

        let frame = pick_frame(reached, last, time)?;
        let mut frame_rgb = ffmpeg_next::frame::Video::empty();
        decoder.convert_frame(&frame, &mut frame_rgb)?;
        to_rgb_image(&frame_rgb)
    }
}

// Requests at or past a known duration seek to the end of the clip instead.
fn clamp_to_duration(time: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(duration) if time >= duration => duration,
        _ => time,
    }
}

// Prefers the first frame at or after the target, then the last frame decoded before it.
fn pick_frame<T>(reached: Option<T>, last: Option<T>, time: f64) -> Result<T> {
    reached.or(last).ok_or(Error::NoFrameAt { time })
}

/// Saves a frame to the given path. The format of the image is determined using the file
/// extension.
pub fn save_frame(image: &RgbImage, path: impl AsRef<Path>) -> Result<()> {
    image.save(path.as_ref())?;
    Ok(())
}

/// Compares frames of a video file by hue-saturation histogram correlation.
///
/// If a frame dump directory is set, both frames of every comparison are written to it as PNG,
/// named after their timestamps.
#[derive(Clone, Debug)]
pub struct HistogramComparator {
    reader: FrameReader,
    frame_dump_dir: Option<PathBuf>,
}

impl HistogramComparator {
    pub fn new(video: impl AsRef<Path>) -> Result<Self> {
        let video = video.as_ref();
        if !video.exists() {
            return Err(Error::VideoNotFound(video.to_owned()));
        }
        Ok(Self {
            reader: FrameReader::new(video),
            frame_dump_dir: None,
        })
    }

    /// Returns a new [HistogramComparator] with FFmpeg threaded decoding enabled or disabled.
    pub fn with_threaded_decoding(mut self, threaded_decoding: bool) -> Self {
        self.reader = self.reader.with_threaded_decoding(threaded_decoding);
        self
    }

    /// Returns a new [HistogramComparator] that writes compared frames into `dir`.
    pub fn with_frame_dump_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.frame_dump_dir = dir;
        self
    }

    fn dump(&self, image: &RgbImage, time: f64) -> Result<()> {
        if let Some(dir) = &self.frame_dump_dir {
            let path = dir.join(format!("frame_{:010.3}.png", time));
            save_frame(image, &path)?;
            tracing::trace!(path = %path.display(), "dumped frame");
        }
        Ok(())
    }
}

impl FrameComparator for HistogramComparator {
    fn similarity(&self, before: f64, after: f64) -> Result<f64> {
        let before_frame = self.reader.frame_at(before)?;
        let after_frame = self.reader.frame_at(after)?;

        self.dump(&before_frame, before)?;
        self.dump(&after_frame, after)?;

        let similarity = compare_frames(&before_frame, &after_frame);
        tracing::trace!(before, after, similarity, "compared frames");

        Ok(similarity)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_missing_video() {
        let err = HistogramComparator::new("/does/not/exist.mkv").unwrap_err();
        assert!(matches!(err, Error::VideoNotFound(_)));
    }

    #[test]
    fn test_to_rgb_image_skips_padding() {
        let mut frame = ffmpeg_next::frame::Video::new(ffmpeg_next::format::Pixel::RGB24, 3, 2);
        let stride = frame.stride(0);
        let data = frame.data_mut(0);
        for y in 0..2 {
            for x in 0..3 {
                let offset = y * stride + x * 3;
                data[offset..offset + 3].copy_from_slice(&[x as u8, y as u8, 7]);
            }
        }

        let image = to_rgb_image(&frame).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1).0, [2, 1, 7]);
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 7]);
    }

    #[test]
    fn test_requests_past_the_end_seek_to_the_end() {
        assert_eq!(clamp_to_duration(4.0, Some(10.0)), 4.0);
        assert_eq!(clamp_to_duration(10.0, Some(10.0)), 10.0);
        assert_eq!(clamp_to_duration(11.5, Some(10.0)), 10.0);
        assert_eq!(clamp_to_duration(11.5, None), 11.5);
    }

    #[test]
    fn test_pick_frame_falls_back_to_last_frame() {
        assert_eq!(pick_frame(Some(2), Some(1), 5.0).unwrap(), 2);
        assert_eq!(pick_frame(None, Some(1), 5.0).unwrap(), 1);
        let err = pick_frame::<u8>(None, None, 5.0).unwrap_err();
        assert!(matches!(err, Error::NoFrameAt { time } if time == 5.0));
    }

    #[test]
    fn test_dump_writes_png() {
        let dir = std::env::temp_dir().join("cutfinder-dump-test");
        std::fs::create_dir_all(&dir).unwrap();
        let comparator = HistogramComparator {
            reader: FrameReader::new("unused.mp4"),
            frame_dump_dir: Some(dir.clone()),
        };
        let image = RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        comparator.dump(&image, 12.5).unwrap();

        let path = dir.join("frame_000012.500.png");
        assert!(path.exists());
        std::fs::remove_file(path).unwrap();
    }
}
