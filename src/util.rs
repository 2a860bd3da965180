use std::io::Read;
use std::path::Path;

/// Formats a time in seconds as "HH:MM:SS.mmm".
///
/// Negative and non-finite inputs are clamped to zero.
pub fn format_time(seconds: f64) -> String {
    let millis = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };
    let (secs, millis) = (millis / 1000, millis % 1000);
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60,
        millis
    )
}

/// Checks if the given path points to a valid video file.
///
/// If `full` is set to **false**, only the file header will be checked. This is a very cheap
/// operation, but it does not guarantee validity. If set to **true**, FFmpeg will be used to
/// check that the file contains at least one video stream.
pub fn is_valid_video_file(path: impl AsRef<Path>, full: bool) -> bool {
    if !full {
        let mut buf = [0u8; 8192];
        let n = match std::fs::File::open(path.as_ref()).and_then(|mut f| f.read(&mut buf)) {
            Ok(n) => n,
            Err(_) => return false,
        };
        return infer::is_video(&buf[..n]);
    }

    match ffmpeg_next::format::input(&path.as_ref()) {
        Ok(input) => input
            .streams()
            .any(|s| s.parameters().medium() == ffmpeg_next::util::media::Type::Video),
        Err(_) => false,
    }
}

/// Returns the MD5 of the first 8 KiB of a video file.
///
/// This is enough to tell two captures apart without hashing gigabytes of video.
pub fn compute_header_md5sum(video: impl AsRef<Path>) -> crate::Result<String> {
    let mut buf = [0u8; 8192];
    let mut f = std::fs::File::open(video.as_ref())?;
    f.read_exact(&mut buf)?;
    Ok(format!("{:x}", md5::compute(&buf)))
}

/// Returns the MD5 of a whole (small) file, such as a signals file.
pub fn compute_file_md5sum(path: impl AsRef<Path>) -> crate::Result<String> {
    let data = std::fs::read(path.as_ref())?;
    Ok(format!("{:x}", md5::compute(&data)))
}

/// Returns the underlying FFmpeg version integer used by cutfinder.
pub fn ffmpeg_version() -> u32 {
    ffmpeg_next::util::version()
}

/// Returns the underlying FFmpeg version string used by cutfinder.
pub fn ffmpeg_version_string() -> String {
    let version_int = ffmpeg_version();

    // Reference: https://github.com/FFmpeg/FFmpeg/blob/130d19bf2044ac76372d1b97ab87ab283c8b37f8/libavutil/version.h#L64
    format!(
        "{}.{}.{}",
        version_int >> 16,             // MAJOR
        (version_int & 0x00FF00) >> 8, // MINOR
        version_int & 0xFF             // MICRO
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_time() {
        insta::assert_snapshot!(format_time(0.0), @"00:00:00.000");
        insta::assert_snapshot!(format_time(75.25), @"00:01:15.250");
        insta::assert_snapshot!(format_time(3725.5), @"01:02:05.500");
        assert_eq!(format_time(59.9996), "00:01:00.000");
        assert_eq!(format_time(-3.0), "00:00:00.000");
        assert_eq!(format_time(f64::NAN), "00:00:00.000");
    }

    #[test]
    fn test_md5_of_small_file() {
        let path = std::env::temp_dir().join("cutfinder-md5-test.json");
        std::fs::write(&path, b"{}").unwrap();
        let md5 = compute_file_md5sum(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(md5, "99914b932bd37a50b983c5e7c90ae93b");
    }

    #[test]
    fn test_header_md5_needs_full_header() {
        let path = std::env::temp_dir().join("cutfinder-header-test.bin");
        std::fs::write(&path, [0u8; 16]).unwrap();
        let result = compute_header_md5sum(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_not_a_video() {
        assert!(!is_valid_video_file("/does/not/exist.mp4", false));
    }
}
