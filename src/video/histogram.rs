use image::RgbImage;

use super::{HUE_BINS, SATURATION_BINS};

// 8-bit hue covers [0, 180) so that it fits into a byte.
const HUE_RANGE: u32 = 180;
const SATURATION_RANGE: u32 = 256;

/// Converts one 8-bit RGB pixel to 8-bit (hue, saturation).
///
/// Hue is in `[0, 180)` (degrees halved) and saturation in `[0, 255]`, with the same rounding as
/// the usual 8-bit HSV conversion. Value is not needed.
#[inline]
pub fn rgb_to_hue_saturation(r: u8, g: u8, b: u8) -> (u8, u8) {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    let v = r.max(g).max(b);
    let diff = v - r.min(g).min(b);

    if diff == 0 {
        return (0, 0);
    }

    let s = (f64::from(diff) * 255.0 / f64::from(v)).round() as i32;

    // Hue in units of `diff`, where a full turn is `6 * diff`.
    let h = if v == r {
        g - b
    } else if v == g {
        b - r + 2 * diff
    } else {
        r - g + 4 * diff
    };
    let mut h = (f64::from(h) * 30.0 / f64::from(diff)).round() as i32;
    if h < 0 {
        h += HUE_RANGE as i32;
    }
    if h >= HUE_RANGE as i32 {
        h -= HUE_RANGE as i32;
    }

    (h as u8, s.min(255) as u8)
}

/// A 2D hue-saturation histogram, L2-normalized.
#[derive(Clone, Debug, PartialEq)]
pub struct HsHistogram {
    bins: Vec<f64>,
}

impl HsHistogram {
    /// Builds the histogram of an RGB frame.
    pub fn from_image(image: &RgbImage) -> Self {
        let mut bins = vec![0.0; HUE_BINS * SATURATION_BINS];

        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            let (h, s) = rgb_to_hue_saturation(r, g, b);
            let h_bin = u32::from(h) * HUE_BINS as u32 / HUE_RANGE;
            let s_bin = u32::from(s) * SATURATION_BINS as u32 / SATURATION_RANGE;
            bins[h_bin as usize * SATURATION_BINS + s_bin as usize] += 1.0;
        }

        let norm = bins.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            bins.iter_mut().for_each(|v| *v /= norm);
        }

        Self { bins }
    }

    /// Pearson correlation between two histograms.
    ///
    /// 1.0 means identical distributions. If either histogram is flat the result is 1.0.
    pub fn correlation(&self, other: &HsHistogram) -> f64 {
        let n = self.bins.len() as f64;
        let mean_a = self.bins.iter().sum::<f64>() / n;
        let mean_b = other.bins.iter().sum::<f64>() / n;

        let (mut num, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
        for (a, b) in self.bins.iter().zip(&other.bins) {
            let (da, db) = (a - mean_a, b - mean_b);
            num += da * db;
            var_a += da * da;
            var_b += db * db;
        }

        let denom = var_a * var_b;
        if denom.abs() > f64::EPSILON {
            num / denom.sqrt()
        } else {
            1.0
        }
    }
}

/// Histogram correlation between two frames.
pub fn compare_frames(a: &RgbImage, b: &RgbImage) -> f64 {
    HsHistogram::from_image(a).correlation(&HsHistogram::from_image(b))
}

#[cfg(test)]
mod test {
    use super::*;

    fn solid(r: u8, g: u8, b: u8) -> RgbImage {
        RgbImage::from_pixel(32, 24, image::Rgb([r, g, b]))
    }

    // Left half one colour, right half another.
    fn split(left: [u8; 3], right: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(32, 24, |x, _| {
            if x < 16 {
                image::Rgb(left)
            } else {
                image::Rgb(right)
            }
        })
    }

    #[test]
    fn test_hue_saturation() {
        assert_eq!(rgb_to_hue_saturation(255, 0, 0), (0, 255));
        assert_eq!(rgb_to_hue_saturation(0, 255, 0), (60, 255));
        assert_eq!(rgb_to_hue_saturation(0, 0, 255), (120, 255));
        assert_eq!(rgb_to_hue_saturation(255, 255, 0), (30, 255));
        assert_eq!(rgb_to_hue_saturation(255, 0, 255), (150, 255));
        assert_eq!(rgb_to_hue_saturation(128, 128, 128), (0, 0));
        assert_eq!(rgb_to_hue_saturation(0, 0, 0), (0, 0));
        assert_eq!(rgb_to_hue_saturation(200, 100, 100), (0, 128));
    }

    #[test]
    fn test_histogram_is_normalized() {
        let histogram = HsHistogram::from_image(&split([255, 0, 0], [0, 0, 255]));
        let norm: f64 = histogram.bins.iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-9);
        assert_eq!(histogram.bins.iter().filter(|v| **v > 0.0).count(), 2);
    }

    #[test]
    fn test_identical_frames() {
        let frame = split([200, 30, 30], [20, 180, 40]);
        assert!((compare_frames(&frame, &frame) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_different_frames() {
        let red = solid(220, 20, 20);
        let blue = solid(20, 20, 220);
        assert!(compare_frames(&red, &blue) < 0.1);

        // Sharing half of their colours correlates partially.
        let half = compare_frames(&split([220, 20, 20], [20, 220, 20]), &red);
        assert!(half > 0.3 && half < 0.9);
    }

    #[test]
    fn test_brightness_change_keeps_similarity() {
        let bright = split([240, 40, 40], [40, 40, 240]);
        let dim = split([120, 20, 20], [20, 20, 120]);
        assert!(compare_frames(&bright, &dim) > 0.95);
    }
}
