//! Replays recorded signal fixtures through the full detection pipeline.
//!
//! Each fixture under `tests/golden/` holds the signals of one capture, the detection parameters
//! and a script for the frame comparator, along with the cut times the pipeline must produce.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use cutfinder::cuts::{Detector, FrameComparator, Signals, Tunables};
use cutfinder::{Error, Result};

fn default_min_confidence() -> u32 {
    cutfinder::cuts::DEFAULT_MIN_CONFIDENCE
}

fn default_min_gap() -> f64 {
    cutfinder::cuts::DEFAULT_MIN_GAP
}

#[derive(Debug, Deserialize)]
struct Step {
    /// Candidate time the comparison is centered on.
    at: f64,
    short: Option<f64>,
    long: Option<f64>,
    #[serde(default)]
    fail: bool,
}

#[derive(Debug, Deserialize)]
struct Golden {
    description: String,
    signals: Signals,
    #[serde(default = "default_min_confidence")]
    min_confidence: u32,
    #[serde(default = "default_min_gap")]
    min_gap: f64,
    #[serde(default)]
    tunables: Tunables,
    default_similarity: f64,
    #[serde(default)]
    script: Vec<Step>,
    expected_noise_zones: Option<usize>,
    expected_cuts: Vec<f64>,
}

/// Answers with scripted similarities for comparisons centered on a given time.
struct ScriptedComparator<'a> {
    default: f64,
    script: &'a [Step],
}

impl FrameComparator for ScriptedComparator<'_> {
    fn similarity(&self, before: f64, after: f64) -> Result<f64> {
        let center = (before + after) / 2.0;
        let is_long = after - before > 1.5;

        match self.script.iter().find(|s| (s.at - center).abs() < 1e-6) {
            Some(step) if step.fail => Err(Error::NoFrameAt { time: after }),
            Some(step) => {
                let value = if is_long { step.long } else { step.short };
                Ok(value.unwrap_or(self.default))
            }
            None => Ok(self.default),
        }
    }
}

fn golden_files() -> Vec<PathBuf> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("golden");
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
        .collect();
    files.sort();
    files
}

fn load(path: &Path) -> Golden {
    let f = std::fs::File::open(path).unwrap();
    serde_json::from_reader(f).unwrap()
}

#[test]
fn test_golden_cuts() {
    let files = golden_files();
    assert!(!files.is_empty());

    for path in files {
        let golden = load(&path);
        let comparator = ScriptedComparator {
            default: golden.default_similarity,
            script: &golden.script,
        };
        let detector = Detector::new()
            .with_min_confidence(golden.min_confidence)
            .with_min_gap(golden.min_gap)
            .with_tunables(golden.tunables.clone());

        let detection = detector.run(&golden.signals, &comparator);
        assert_eq!(
            detection.cut_times(),
            golden.expected_cuts,
            "{}: {}",
            path.display(),
            golden.description
        );

        if let Some(expected) = golden.expected_noise_zones {
            assert_eq!(detection.noise_zones.len(), expected, "{}", path.display());
        }

        // Parallel verification must not change anything.
        let threaded = detector
            .clone()
            .with_threading(true)
            .run(&golden.signals, &comparator);
        assert_eq!(threaded.cut_times(), golden.expected_cuts, "{}", path.display());
        assert_eq!(threaded.report(), detection.report(), "{}", path.display());
    }
}

#[test]
fn test_golden_invariants() {
    for path in golden_files() {
        let golden = load(&path);
        let detection = Detector::new()
            .with_min_confidence(golden.min_confidence)
            .with_min_gap(golden.min_gap)
            .with_tunables(golden.tunables.clone())
            .candidates(&golden.signals);

        let selected = &detection.selection.selected;
        assert!(selected
            .iter()
            .all(|c| c.confidence_score() >= golden.min_confidence));
        for (i, a) in selected.iter().enumerate() {
            for b in &selected[i + 1..] {
                assert!(a.time() < b.time(), "{}", path.display());
                assert!(b.time() - a.time() >= golden.min_gap, "{}", path.display());
            }
        }

        // Every expected cut was selected before verification.
        for cut in &golden.expected_cuts {
            assert!(
                selected.iter().any(|c| c.time() == *cut),
                "{}: {} not selected",
                path.display(),
                cut
            );
        }

        let report = detection.report();
        assert_eq!(report.candidates.len(), detection.candidates.len());
        assert!(report
            .candidates
            .windows(2)
            .all(|w| w[0].time <= w[1].time));
    }
}
