use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{CutCandidate, NoiseZone, SkipReason, Tunables};
use crate::util::format_time;
use crate::Result;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

/// The check that decided a candidate's fate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Corroborated by a sustained black frame, nothing else was checked.
    BlackFrame,
    /// Corroborated by an audio step and not a flash.
    Audio,
    /// Survived every visual check on scene evidence alone.
    SceneOnly,
    /// Near a noise zone and the frames either side look like the same scene.
    NoiseZone,
    /// Borderline scene change and the frames either side look like the same scene.
    SameScene,
    /// Near-identical at both horizons: a flash or brief flicker.
    Flash,
    /// Neither side of the candidate is internally stable.
    CameraMotion,
    /// A required frame comparison could not be made.
    Unverifiable,
}

impl Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Reason::BlackFrame => "black frame",
            Reason::Audio => "audio",
            Reason::SceneOnly => "scene",
            Reason::NoiseZone => "noise zone",
            Reason::SameScene => "same scene",
            Reason::Flash => "flash",
            Reason::CameraMotion => "camera motion",
            Reason::Unverifiable => "unverifiable",
        };
        write!(f, "{}", s)
    }
}

/// One entry of the verification decision log.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Decision {
    pub time: f64,
    pub verdict: Verdict,
    pub reason: Reason,
    pub peak_score: f64,
    /// Histogram correlation across the candidate (short horizon).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    /// Short and long horizon correlations from the flash check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<(f64, f64)>,
    /// Before and after side correlations from the side stability check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sides: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Decision {
    pub(crate) fn new(candidate: &CutCandidate) -> Self {
        Self {
            time: candidate.time(),
            verdict: Verdict::Fail,
            reason: Reason::Unverifiable,
            peak_score: candidate.peak_score(),
            similarity: None,
            stability: None,
            sides: None,
            error: None,
        }
    }

    pub(crate) fn pass(mut self, reason: Reason) -> Self {
        self.verdict = Verdict::Pass;
        self.reason = reason;
        self
    }

    pub(crate) fn fail(mut self, reason: Reason) -> Self {
        self.verdict = Verdict::Fail;
        self.reason = reason;
        self
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} max={:.1}", format_time(self.time), self.peak_score)?;
        if let Some(similarity) = self.similarity {
            write!(f, " hist={:.3}", similarity)?;
        }
        if let Some((short, long)) = self.stability {
            write!(f, " stab={:.2}/{:.2}", short, long)?;
        }
        if let Some((before, after)) = self.sides {
            write!(f, " sides={:.2}/{:.2}", before, after)?;
        }
        let verdict = match self.verdict {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        };
        write!(f, " -> {} ({})", verdict, self.reason)?;
        if let Some(error) = &self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

/// What the selector did with a candidate.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Selected,
    BelowConfidence,
    TooClose { claimed_by: f64 },
}

impl From<SkipReason> for Outcome {
    fn from(reason: SkipReason) -> Self {
        match reason {
            SkipReason::BelowConfidence => Outcome::BelowConfidence,
            SkipReason::TooClose { claimed_by } => Outcome::TooClose { claimed_by },
        }
    }
}

/// A built candidate with its score breakdown and what happened to it.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CandidateRecord {
    pub time: f64,
    pub confidence: u32,
    pub breakdown: (u32, u32, u32),
    pub summary: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
}

impl CandidateRecord {
    pub(crate) fn new(candidate: &CutCandidate, outcome: Outcome) -> Self {
        Self {
            time: candidate.time(),
            confidence: candidate.confidence_score(),
            breakdown: candidate.score_breakdown(),
            summary: candidate.signal_summary(),
            outcome,
            decision: None,
        }
    }
}

/// Everything a detection run produced, for tuning and regression checks.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct DetectionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<PathBuf>,
    /// MD5 of the video file header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    /// MD5 of the signals the run consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals_md5: Option<String>,
    pub min_confidence: u32,
    pub min_gap: f64,
    pub tunables: Tunables,
    pub num_scenes: usize,
    pub num_blacks: usize,
    pub num_audio_steps: usize,
    pub noise_zones: Vec<NoiseZone>,
    /// Every built candidate, chronological.
    pub candidates: Vec<CandidateRecord>,
    /// Final cut times, chronological.
    pub cuts: Vec<f64>,
}

impl DetectionReport {
    /// Path of the result file kept next to `video`.
    pub fn path_for(video: impl AsRef<Path>) -> PathBuf {
        video.as_ref().with_extension(super::CUTS_FILE_EXT)
    }

    /// Loads a report from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(f)?)
    }

    /// Writes this report as JSON.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut f = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(&mut f, self)?;
        Ok(())
    }

    /// Returns true if this report was produced from the same inputs and parameters.
    pub fn matches(
        &self,
        md5: &str,
        signals_md5: &str,
        min_confidence: u32,
        min_gap: f64,
        tunables: &Tunables,
    ) -> bool {
        self.md5.as_deref() == Some(md5)
            && self.signals_md5.as_deref() == Some(signals_md5)
            && self.min_confidence == min_confidence
            && self.min_gap == min_gap
            && &self.tunables == tunables
    }
}

impl Display for DetectionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Found {} scene changes, {} black frames, {} audio changes, {} noise zones",
            self.num_scenes,
            self.num_blacks,
            self.num_audio_steps,
            self.noise_zones.len()
        )?;
        for zone in &self.noise_zones {
            writeln!(
                f,
                "  noise {} - {} ({:.1}s, {} detections)",
                format_time(zone.start),
                format_time(zone.end),
                zone.duration(),
                zone.detection_count
            )?;
        }

        writeln!(f, "\nCandidates (scene 0-40 + black 0-35 + audio 0-30):")?;
        for record in &self.candidates {
            let (scene, black, audio) = record.breakdown;
            let status = match record.outcome {
                Outcome::Selected => "SELECTED".to_string(),
                Outcome::BelowConfidence => format!("skip (below {})", self.min_confidence),
                Outcome::TooClose { claimed_by } => {
                    format!("skip (too close to {})", format_time(claimed_by))
                }
            };
            writeln!(
                f,
                "  {} [{:3}={:2}+{:2}+{:2}] {:40} -> {}",
                format_time(record.time),
                record.confidence,
                scene,
                black,
                audio,
                record.summary,
                status
            )?;
            if let Some(decision) = &record.decision {
                writeln!(f, "      {}", decision)?;
            }
        }

        if self.cuts.is_empty() {
            writeln!(f, "\nNo cuts detected. Try lowering --min-confidence")
        } else {
            writeln!(f, "\nFound {} cut(s):", self.cuts.len())?;
            for cut in &self.cuts {
                writeln!(f, "  {}", format_time(*cut))?;
            }
            writeln!(f, "Will create {} segment(s)", self.cuts.len() + 1)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decision_display() {
        let candidate = CutCandidate::new(75.25, 9.0, 0.0, 0.0).with_peak_score(9.0);
        let mut decision = Decision::new(&candidate);
        decision.similarity = Some(0.8127);
        let decision = decision.fail(Reason::SameScene);
        insta::assert_snapshot!(
            decision.to_string(),
            @"00:01:15.250 max=9.0 hist=0.813 -> FAIL (same scene)"
        );
    }

    #[test]
    fn test_path_for() {
        assert_eq!(
            DetectionReport::path_for("/tapes/tape01.mp4"),
            PathBuf::from("/tapes/tape01.cuts.json")
        );
    }

    #[test]
    fn test_report_roundtrip_preserves_outcomes() {
        let candidate = CutCandidate::new(10.0, 30.0, 0.0, 0.0).with_peak_score(30.0);
        let mut record = CandidateRecord::new(&candidate, Outcome::Selected);
        record.decision = Some(Decision::new(&candidate).pass(Reason::SceneOnly));
        let report = DetectionReport {
            min_confidence: 12,
            min_gap: 1.0,
            candidates: vec![
                record,
                CandidateRecord::new(
                    &CutCandidate::new(10.5, 12.0, 0.0, 0.0),
                    Outcome::TooClose { claimed_by: 10.0 },
                ),
            ],
            cuts: vec![10.0],
            ..Default::default()
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""status":"too_close""#));
        let parsed: DetectionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
