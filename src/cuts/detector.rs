use super::{
    build_candidates, detect_noise_zones, select_candidates, suppress_noise_detections,
    verify_candidates, CandidateRecord, CutCandidate, DetectionReport, FrameComparator, NoiseZone,
    Outcome, Selection, SignalIndex, Signals, Tunables, Verified,
};

/// Finds recording boundaries in a set of detector signals.
///
/// A [Detector] runs the pipeline stage by stage: normalize the raw signals, find noise zones,
/// suppress the scene events inside them, build and score candidates, select greedily and finally
/// verify the selected candidates against the video frames. Every stage consumes its predecessor's
/// output and produces a new collection.
#[derive(Clone, Debug)]
pub struct Detector {
    min_confidence: u32,
    min_gap: f64,
    tunables: Tunables,
    threading: bool,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            min_confidence: super::DEFAULT_MIN_CONFIDENCE,
            min_gap: super::DEFAULT_MIN_GAP,
            tunables: Tunables::default(),
            threading: false,
        }
    }
}

impl Detector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new [Detector] with the provided confidence floor.
    pub fn with_min_confidence(mut self, min_confidence: u32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Returns a new [Detector] with the provided minimum gap between cuts (seconds).
    pub fn with_min_gap(mut self, min_gap: f64) -> Self {
        self.min_gap = min_gap;
        self
    }

    pub fn with_tunables(mut self, tunables: Tunables) -> Self {
        self.tunables = tunables;
        self
    }

    /// Returns a new [Detector] that verifies candidates in parallel.
    pub fn with_threading(mut self, threading: bool) -> Self {
        self.threading = threading;
        self
    }

    pub fn min_confidence(&self) -> u32 {
        self.min_confidence
    }

    pub fn min_gap(&self) -> f64 {
        self.min_gap
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    /// Runs every stage up to and including selection, without looking at any frames.
    pub fn candidates(&self, signals: &Signals) -> Detection {
        let span = tracing::span!(tracing::Level::TRACE, "candidates");
        let _enter = span.enter();

        let signals = signals.normalized();
        tracing::debug!(
            scenes = signals.scenes.len(),
            blacks = signals.blacks.len(),
            audio_steps = signals.audio_steps.len(),
            "normalized signals"
        );

        // Weak events still count towards noise density.
        let noise_zones = detect_noise_zones(&signals.scenes, &self.tunables);
        let scoring = signals.scoring_scenes();
        let scenes = suppress_noise_detections(&scoring, &noise_zones, &self.tunables);
        tracing::debug!(
            below_floor = signals.scenes.len() - scoring.len(),
            suppressed = scoring.len() - scenes.len(),
            "suppressed noise detections"
        );

        let index = SignalIndex::new(&scenes, &signals.blacks, &signals.audio_steps);
        let candidates = build_candidates(&index, &self.tunables);
        let selection = select_candidates(&candidates, self.min_confidence, self.min_gap);

        Detection {
            min_confidence: self.min_confidence,
            min_gap: self.min_gap,
            tunables: self.tunables.clone(),
            num_scenes: signals.scenes.len(),
            num_blacks: signals.blacks.len(),
            num_audio_steps: signals.audio_steps.len(),
            noise_zones,
            candidates,
            selection,
            verified: None,
        }
    }

    /// Runs the full pipeline, verifying selected candidates with `comparator`.
    pub fn run(&self, signals: &Signals, comparator: &dyn FrameComparator) -> Detection {
        let mut detection = self.candidates(signals);

        let verified = verify_candidates(
            &detection.selection.selected,
            &detection.noise_zones,
            comparator,
            &self.tunables,
            self.threading,
        );

        tracing::info!(
            candidates = detection.candidates.len(),
            selected = detection.selection.selected.len(),
            cuts = verified.cuts.len(),
            "finished cut detection"
        );

        detection.verified = Some(verified);
        detection
    }
}

/// Everything one pipeline run produced.
#[derive(Clone, Debug)]
pub struct Detection {
    min_confidence: u32,
    min_gap: f64,
    tunables: Tunables,
    num_scenes: usize,
    num_blacks: usize,
    num_audio_steps: usize,
    pub noise_zones: Vec<NoiseZone>,
    /// Every built candidate, in build order.
    pub candidates: Vec<CutCandidate>,
    pub selection: Selection,
    /// Only set if the run included verification.
    pub verified: Option<Verified>,
}

impl Detection {
    /// Final cut points, chronological.
    ///
    /// If this run was not verified, these are the selected candidates.
    pub fn cuts(&self) -> &[CutCandidate] {
        match &self.verified {
            Some(verified) => &verified.cuts,
            None => &self.selection.selected,
        }
    }

    pub fn cut_times(&self) -> Vec<f64> {
        self.cuts().iter().map(|c| c.time()).collect()
    }

    /// Builds the diagnostic report for this run.
    pub fn report(&self) -> DetectionReport {
        let decisions = self.verified.as_ref().map(|v| v.decisions.as_slice());

        let mut candidates: Vec<CandidateRecord> = self
            .selection
            .selected
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let mut record = CandidateRecord::new(c, Outcome::Selected);
                record.decision = decisions.and_then(|d| d.get(i)).cloned();
                record
            })
            .chain(
                self.selection
                    .skipped
                    .iter()
                    .map(|(c, reason)| CandidateRecord::new(c, Outcome::from(*reason))),
            )
            .collect();
        candidates.sort_by(|a, b| a.time.total_cmp(&b.time));

        DetectionReport {
            min_confidence: self.min_confidence,
            min_gap: self.min_gap,
            tunables: self.tunables.clone(),
            num_scenes: self.num_scenes,
            num_blacks: self.num_blacks,
            num_audio_steps: self.num_audio_steps,
            noise_zones: self.noise_zones.clone(),
            candidates,
            cuts: self.cut_times(),
            ..Default::default()
        }
    }
}
