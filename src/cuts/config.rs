use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Calibration constants used across the detection pipeline.
///
/// The defaults were hand-tuned against VHS and camcorder captures. They are not universal;
/// treat every field as a calibration parameter. Any subset can be overridden from JSON, missing
/// fields keep their default.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Tunables {
    pub noise_window: u32,
    pub noise_density: f64,
    pub noise_min_duration: f64,
    pub noise_merge_gap: f64,
    pub noise_boundary_margin: f64,
    pub min_peak_score: f64,
    pub audio_bonus_peak: f64,
    pub corroboration_window: i64,
    pub audio_only_step: f64,
    pub black_bypass: f64,
    pub audio_corroboration: f64,
    pub borderline_peak: f64,
    pub noise_margin: f64,
    pub same_scene_similarity: f64,
    pub flash_similarity: f64,
    pub flash_floor: f64,
    pub side_stability: bool,
    pub side_stability_similarity: f64,
    pub short_offset: f64,
    pub long_offset: f64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            noise_window: super::DEFAULT_NOISE_WINDOW,
            noise_density: super::DEFAULT_NOISE_DENSITY,
            noise_min_duration: super::DEFAULT_NOISE_MIN_DURATION,
            noise_merge_gap: super::DEFAULT_NOISE_MERGE_GAP,
            noise_boundary_margin: super::DEFAULT_NOISE_BOUNDARY_MARGIN,
            min_peak_score: super::DEFAULT_MIN_PEAK_SCORE,
            audio_bonus_peak: super::DEFAULT_AUDIO_BONUS_PEAK,
            corroboration_window: super::DEFAULT_CORROBORATION_WINDOW,
            audio_only_step: super::DEFAULT_AUDIO_ONLY_STEP,
            black_bypass: super::DEFAULT_BLACK_BYPASS,
            audio_corroboration: super::DEFAULT_AUDIO_CORROBORATION,
            borderline_peak: super::DEFAULT_BORDERLINE_PEAK,
            noise_margin: super::DEFAULT_NOISE_MARGIN,
            same_scene_similarity: super::DEFAULT_SAME_SCENE_SIMILARITY,
            flash_similarity: super::DEFAULT_FLASH_SIMILARITY,
            flash_floor: super::DEFAULT_FLASH_FLOOR,
            side_stability: false,
            side_stability_similarity: super::DEFAULT_SIDE_STABILITY_SIMILARITY,
            short_offset: super::DEFAULT_SHORT_OFFSET,
            long_offset: super::DEFAULT_LONG_OFFSET,
        }
    }
}

impl Tunables {
    /// Loads tunables from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(f)?)
    }

    /// Returns new [Tunables] with side stability checks switched on or off.
    pub fn with_side_stability(mut self, side_stability: bool) -> Self {
        self.side_stability = side_stability;
        self
    }
}
