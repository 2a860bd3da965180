use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// A scene detector firing: abrupt visual change at `time` with an unbounded `score`.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SceneEvent {
    pub time: f64,
    pub score: f64,
}

impl SceneEvent {
    pub fn new(time: f64, score: f64) -> Self {
        Self { time, score }
    }

    /// Whole second this event belongs to.
    #[inline]
    pub fn second(&self) -> i64 {
        self.time.floor() as i64
    }
}

/// A sustained near-black interval ending at `end_time`.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BlackEvent {
    pub end_time: f64,
    pub duration: f64,
}

impl BlackEvent {
    pub fn new(end_time: f64, duration: f64) -> Self {
        Self {
            end_time,
            duration,
        }
    }

    #[inline]
    pub fn second(&self) -> i64 {
        self.end_time.floor() as i64
    }
}

/// Loudness step changes (dB) keyed by whole second.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AudioSteps(BTreeMap<i64, f64>);

impl AudioSteps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives steps from a per-second loudness series (RMS level in dB).
    ///
    /// Each observed second is compared against the previous *observed* second, so silent
    /// (missing) samples are bridged. Only steps strictly above [AUDIO_STEP_FLOOR](super::AUDIO_STEP_FLOOR)
    /// are kept, keyed by the later second.
    pub fn from_levels(levels: &BTreeMap<i64, f64>) -> Self {
        let observed: Vec<(i64, f64)> = levels
            .iter()
            .filter(|(_, level)| level.is_finite())
            .map(|(t, level)| (*t, *level))
            .collect();

        let steps = observed
            .windows(2)
            .filter_map(|pair| {
                let ((_, prev), (t, level)) = (pair[0], pair[1]);
                let step = (level - prev).abs();
                (step > super::AUDIO_STEP_FLOOR).then(|| (t, step))
            })
            .collect();

        Self(steps)
    }

    pub fn get(&self, second: i64) -> Option<f64> {
        self.0.get(&second).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.0.iter().map(|(t, s)| (*t, *s))
    }

    /// Steps keyed within `seconds`, in order.
    pub fn range(&self, seconds: RangeInclusive<i64>) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.0.range(seconds).map(|(t, s)| (*t, *s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(i64, f64)> for AudioSteps {
    fn from_iter<I: IntoIterator<Item = (i64, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A sustained interval of elevated scene event density (analog noise rather than real cuts).
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NoiseZone {
    pub start: f64,
    pub end: f64,
    pub detection_count: usize,
}

impl NoiseZone {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Returns true if `time` is inside this zone and further than `margin` from both boundaries.
    #[inline]
    pub fn interior_contains(&self, time: f64, margin: f64) -> bool {
        self.start + margin < time && time < self.end - margin
    }

    /// Returns true if `time` is inside this zone or within `margin` of it.
    #[inline]
    pub fn is_near(&self, time: f64, margin: f64) -> bool {
        self.start - margin <= time && time <= self.end + margin
    }
}

/// A potential cut point.
///
/// Candidates are never modified once built: the confidence score and the signal summary are
/// derived from the stored components on demand.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct CutCandidate {
    time: f64,
    scene_score: f64,
    peak_score: f64,
    black_duration: f64,
    audio_step: f64,
}

impl CutCandidate {
    pub fn new(time: f64, scene_score: f64, black_duration: f64, audio_step: f64) -> Self {
        Self {
            time,
            scene_score,
            peak_score: 0.0,
            black_duration,
            audio_step,
        }
    }

    /// Returns a new [CutCandidate] with the strongest single scene score of its second.
    pub fn with_peak_score(mut self, peak_score: f64) -> Self {
        self.peak_score = peak_score;
        self
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Sum of all scene scores in the candidate's second.
    pub fn scene_score(&self) -> f64 {
        self.scene_score
    }

    /// Strongest single scene score in the candidate's second (0 for audio-only candidates).
    pub fn peak_score(&self) -> f64 {
        self.peak_score
    }

    pub fn black_duration(&self) -> f64 {
        self.black_duration
    }

    pub fn audio_step(&self) -> f64 {
        self.audio_step
    }

    /// Points contributed by each signal: (scene 0-40, black 0-35, audio 0-30).
    pub fn score_breakdown(&self) -> (u32, u32, u32) {
        let scene = match self.scene_score {
            s if s >= 25.0 => 40,
            s if s >= 15.0 => 25,
            s if s >= 10.0 => 15,
            s if s >= 6.0 => 5,
            _ => 0,
        };
        let black = match self.black_duration {
            d if d >= 1.0 => 35,
            d if d >= 0.5 => 25,
            d if d >= 0.2 => 15,
            _ => 0,
        };
        let audio = match self.audio_step {
            a if a >= 25.0 => 30,
            a if a >= 18.0 => 20,
            a if a >= 12.0 => 10,
            _ => 0,
        };
        (scene, black, audio)
    }

    pub fn confidence_score(&self) -> u32 {
        let (scene, black, audio) = self.score_breakdown();
        scene + black + audio
    }

    /// Short human-readable description of the signals behind this candidate.
    pub fn signal_summary(&self) -> String {
        let mut parts = Vec::new();
        if self.scene_score > 0.0 {
            parts.push(format!("scene:{:.1}", self.scene_score));
        }
        if self.black_duration > 0.0 {
            parts.push(format!("black:{:.2}s", self.black_duration));
        }
        if self.audio_step > 0.0 {
            parts.push(format!("audio:{:.1}dB", self.audio_step));
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Raw output of the three signal detectors for one video segment.
///
/// Loudness can be supplied either as precomputed `audio_steps` or as per-second
/// `audio_levels`, from which steps are derived.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Signals {
    pub scenes: Vec<SceneEvent>,
    pub blacks: Vec<BlackEvent>,
    pub audio_steps: AudioSteps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_levels: Option<BTreeMap<i64, f64>>,
}

impl Signals {
    pub fn new(scenes: Vec<SceneEvent>, blacks: Vec<BlackEvent>, audio_steps: AudioSteps) -> Self {
        Self {
            scenes,
            blacks,
            audio_steps,
            audio_levels: None,
        }
    }

    /// Loads signals from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(f)?)
    }

    /// Returns a copy with malformed entries dropped and the black frame floor applied.
    ///
    /// Events with non-finite or negative fields, or later than
    /// [MAX_SIGNAL_TIME](super::MAX_SIGNAL_TIME), are discarded rather than rejected. Scene events
    /// keep their score whatever it is, see [Signals::scoring_scenes]. If no steps were supplied
    /// but levels were, steps are derived from the levels.
    pub fn normalized(&self) -> Self {
        let scenes = self
            .scenes
            .iter()
            .filter(|e| is_valid_time(e.time) && e.score.is_finite())
            .copied()
            .collect();
        let blacks = self
            .blacks
            .iter()
            .filter(|e| is_valid_time(e.end_time))
            .filter(|e| e.duration.is_finite() && e.duration >= super::BLACK_DURATION_FLOOR)
            .copied()
            .collect();

        let max_second = super::MAX_SIGNAL_TIME as i64;
        let audio_steps = match &self.audio_levels {
            Some(levels) if self.audio_steps.is_empty() => {
                let levels = levels.range(0..=max_second).map(|(t, l)| (*t, *l)).collect();
                AudioSteps::from_levels(&levels)
            }
            _ => self
                .audio_steps
                .iter()
                .filter(|(t, step)| (0..=max_second).contains(t) && step.is_finite() && *step > 0.0)
                .collect(),
        };

        Self::new(scenes, blacks, audio_steps)
    }

    /// Scene events at or above [SCENE_SCORE_FLOOR](super::SCENE_SCORE_FLOOR).
    pub fn scoring_scenes(&self) -> Vec<SceneEvent> {
        self.scenes
            .iter()
            .filter(|e| e.score >= super::SCENE_SCORE_FLOOR)
            .copied()
            .collect()
    }
}

#[inline]
fn is_valid_time(time: f64) -> bool {
    time.is_finite() && (0.0..=super::MAX_SIGNAL_TIME).contains(&time)
}
