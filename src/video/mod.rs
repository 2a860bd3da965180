//! Frame access and comparison backed by FFmpeg.

mod frames;
mod histogram;

pub use frames::{save_frame, FrameReader, HistogramComparator};
pub use histogram::{compare_frames, rgb_to_hue_saturation, HsHistogram};

/// Number of hue bins in a frame histogram.
pub const HUE_BINS: usize = 50;

/// Number of saturation bins in a frame histogram.
pub const SATURATION_BINS: usize = 60;
