mod builder;
mod config;
mod data;
mod detector;
mod index;
mod noise;
mod report;
mod selector;
mod verifier;

pub use builder::build_candidates;
pub use config::Tunables;
pub use data::{AudioSteps, BlackEvent, CutCandidate, NoiseZone, SceneEvent, Signals};
pub use detector::{Detection, Detector};
pub use index::{SceneCluster, SignalIndex};
pub use noise::{detect_noise_zones, suppress_noise_detections};
pub use report::{CandidateRecord, Decision, DetectionReport, Outcome, Reason, Verdict};
pub use selector::{select_candidates, Selection, SkipReason};
pub use verifier::{
    check_scene_stability, check_side_stability, verify_candidates, FrameComparator, Verified,
};

/// Default minimum confidence score for a candidate to be selected.
pub const DEFAULT_MIN_CONFIDENCE: u32 = 12;

/// Default minimum gap between two accepted cuts (seconds).
pub const DEFAULT_MIN_GAP: f64 = 1.0;

/// Default sliding window used to measure scene event density (seconds).
pub const DEFAULT_NOISE_WINDOW: u32 = 10;

/// Default average scene events per second at which a window counts as noise.
pub const DEFAULT_NOISE_DENSITY: f64 = 2.5;

/// Default minimum noise zone duration (seconds).
///
/// Shorter high-density runs are left alone so that a single busy cut is not mistaken
/// for tape noise.
pub const DEFAULT_NOISE_MIN_DURATION: f64 = 10.0;

/// Default gap (seconds) under which neighbouring noise zones are merged.
pub const DEFAULT_NOISE_MERGE_GAP: f64 = 5.0;

/// Default margin (seconds) inside each noise zone boundary where scene events survive suppression.
pub const DEFAULT_NOISE_BOUNDARY_MARGIN: f64 = 5.0;

/// Default minimum peak scene score for a per-second cluster to produce a candidate.
pub const DEFAULT_MIN_PEAK_SCORE: f64 = 8.0;

/// Default peak scene score required before an audio step may add to a candidate's score.
pub const DEFAULT_AUDIO_BONUS_PEAK: f64 = 10.0;

/// Default neighbourhood (seconds, either side) searched for black frames and audio steps.
pub const DEFAULT_CORROBORATION_WINDOW: i64 = 2;

/// Default audio step (dB) at which a second with no scene cluster becomes an audio-only candidate.
pub const DEFAULT_AUDIO_ONLY_STEP: f64 = 15.0;

/// Default black frame duration (seconds) that lets a candidate skip visual verification.
pub const DEFAULT_BLACK_BYPASS: f64 = 0.2;

/// Default audio step (dB) that counts as corroboration during verification.
pub const DEFAULT_AUDIO_CORROBORATION: f64 = 5.0;

/// Default peak scene score under which a scene-only candidate needs a histogram check.
pub const DEFAULT_BORDERLINE_PEAK: f64 = 10.0;

/// Default distance (seconds) from a noise zone within which candidates get extra scrutiny.
pub const DEFAULT_NOISE_MARGIN: f64 = 10.0;

/// Default histogram correlation at or above which the frames either side of a candidate are
/// considered the same scene.
pub const DEFAULT_SAME_SCENE_SIMILARITY: f64 = 0.7;

/// Default histogram correlation at or above which either horizon marks a flash.
pub const DEFAULT_FLASH_SIMILARITY: f64 = 0.955;

/// Default floor for the lower of the two horizon similarities when classifying a flash.
pub const DEFAULT_FLASH_FLOOR: f64 = 0.85;

/// Default histogram correlation at or above which one side of a candidate is considered stable.
pub const DEFAULT_SIDE_STABILITY_SIMILARITY: f64 = 0.7;

/// Default short comparison offset (seconds either side of a candidate).
pub const DEFAULT_SHORT_OFFSET: f64 = 0.5;

/// Default long comparison offset (seconds either side of a candidate).
pub const DEFAULT_LONG_OFFSET: f64 = 2.0;

/// Scene events below this score count towards noise zones but never seed or score a candidate.
pub const SCENE_SCORE_FLOOR: f64 = 5.0;

/// Black frame runs shorter than this (seconds) are dropped on input.
pub const BLACK_DURATION_FLOOR: f64 = 0.1;

/// Loudness steps (dB) at or below this are dropped when deriving steps from levels.
pub const AUDIO_STEP_FLOOR: f64 = 5.0;

/// Signals later than this (seconds) are dropped on input.
pub const MAX_SIGNAL_TIME: f64 = i32::MAX as f64;

static CUTS_FILE_EXT: &str = "cuts.json";
