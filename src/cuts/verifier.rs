#[cfg(feature = "rayon")]
extern crate rayon;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{CutCandidate, Decision, NoiseZone, Reason, Tunables};
use crate::util::format_time;
use crate::Result;

/// Compares the frames of a video at two timestamps.
///
/// Implementations return a colour histogram correlation, where 1.0 means identical
/// distributions and values near zero mean unrelated frames. Comparisons for different candidates
/// may run concurrently.
pub trait FrameComparator: Sync {
    fn similarity(&self, before: f64, after: f64) -> Result<f64>;
}

impl<F> FrameComparator for F
where
    F: Fn(f64, f64) -> Result<f64> + Sync,
{
    fn similarity(&self, before: f64, after: f64) -> Result<f64> {
        self(before, after)
    }
}

/// Output of the verification cascade.
#[derive(Clone, Debug, Default)]
pub struct Verified {
    /// Candidates that passed, in input order.
    pub cuts: Vec<CutCandidate>,
    /// One decision per input candidate, in input order.
    pub decisions: Vec<Decision>,
}

// Correlation between the frames `offset` seconds either side of `time`.
fn similarity_across(
    comparator: &dyn FrameComparator,
    time: f64,
    offset: f64,
) -> Result<f64> {
    comparator.similarity(f64::max(0.0, time - offset), time + offset)
}

/// Checks whether a candidate looks like a flash rather than a cut.
///
/// Frames are compared across the candidate at a short and a long horizon. Returns
/// `(is_flash, short, long)`: a flash is near-identical at either horizon while both horizons stay
/// at least moderately similar. Real cuts rarely look the same at both distances.
pub fn check_scene_stability(
    comparator: &dyn FrameComparator,
    time: f64,
    tunables: &Tunables,
) -> Result<(bool, f64, f64)> {
    let short = similarity_across(comparator, time, tunables.short_offset)?;
    let long = similarity_across(comparator, time, tunables.long_offset)?;

    let is_flash = (short >= tunables.flash_similarity || long >= tunables.flash_similarity)
        && f64::min(short, long) >= tunables.flash_floor;

    Ok((is_flash, short, long))
}

/// Checks whether at least one side of a candidate is internally consistent.
///
/// The far and near frames before the candidate are compared, and likewise after it. Returns
/// `(has_stable_side, before, after)`. A real cut usually has one steady side, while camera motion
/// is unsteady on both.
pub fn check_side_stability(
    comparator: &dyn FrameComparator,
    time: f64,
    tunables: &Tunables,
) -> Result<(bool, f64, f64)> {
    let before = comparator.similarity(
        f64::max(0.0, time - tunables.long_offset),
        f64::max(0.0, time - tunables.short_offset),
    )?;
    let after = comparator.similarity(time + tunables.short_offset, time + tunables.long_offset)?;

    let threshold = tunables.side_stability_similarity;
    Ok((before >= threshold || after >= threshold, before, after))
}

// Runs the cascade for one candidate. The first decisive check wins.
fn decide(
    candidate: &CutCandidate,
    noise_zones: &[NoiseZone],
    comparator: &dyn FrameComparator,
    tunables: &Tunables,
    decision: &mut Decision,
) -> Result<Reason> {
    let time = candidate.time();

    if candidate.black_duration() >= tunables.black_bypass {
        return Ok(Reason::BlackFrame);
    }

    let near_noise = noise_zones
        .iter()
        .any(|z| z.is_near(time, tunables.noise_margin));
    if near_noise {
        let similarity = similarity_across(comparator, time, tunables.short_offset)?;
        decision.similarity = Some(similarity);
        if similarity >= tunables.same_scene_similarity {
            return Ok(Reason::NoiseZone);
        }
    }

    // An audible event is already evidence, so only rule out flashes.
    if candidate.audio_step() >= tunables.audio_corroboration {
        let (is_flash, short, long) = check_scene_stability(comparator, time, tunables)?;
        decision.stability = Some((short, long));
        return Ok(if is_flash { Reason::Flash } else { Reason::Audio });
    }

    if candidate.peak_score() < tunables.borderline_peak {
        let similarity = match decision.similarity {
            Some(similarity) => similarity,
            None => similarity_across(comparator, time, tunables.short_offset)?,
        };
        decision.similarity = Some(similarity);
        if similarity >= tunables.same_scene_similarity {
            return Ok(Reason::SameScene);
        }
    }

    let (is_flash, short, long) = check_scene_stability(comparator, time, tunables)?;
    decision.stability = Some((short, long));
    if is_flash {
        return Ok(Reason::Flash);
    }

    if tunables.side_stability {
        let (has_stable_side, before, after) = check_side_stability(comparator, time, tunables)?;
        decision.sides = Some((before, after));
        if !has_stable_side {
            return Ok(Reason::CameraMotion);
        }
    }

    Ok(Reason::SceneOnly)
}

fn verify_one(
    candidate: &CutCandidate,
    noise_zones: &[NoiseZone],
    comparator: &dyn FrameComparator,
    tunables: &Tunables,
) -> Decision {
    let mut decision = Decision::new(candidate);

    let decision = match decide(candidate, noise_zones, comparator, tunables, &mut decision) {
        Ok(reason @ (Reason::BlackFrame | Reason::Audio | Reason::SceneOnly)) => {
            decision.pass(reason)
        }
        Ok(reason) => decision.fail(reason),
        // A check we had to run could not be made, so err on the side of no cut.
        Err(e) => {
            tracing::warn!(
                time = %format_time(candidate.time()),
                error = %e,
                "frame comparison failed"
            );
            decision.error = Some(e.to_string());
            decision.fail(Reason::Unverifiable)
        }
    };

    tracing::debug!("{}", decision);

    decision
}

/// Runs the verification cascade over selected candidates.
///
/// Each candidate is checked independently, so if `threading` is set (and the `rayon` feature is
/// enabled) candidates are verified in parallel. The output preserves the input order either way.
/// Comparator failures only affect the candidate that hit them.
pub fn verify_candidates(
    candidates: &[CutCandidate],
    noise_zones: &[NoiseZone],
    comparator: &dyn FrameComparator,
    tunables: &Tunables,
    threading: bool,
) -> Verified {
    let span = tracing::span!(tracing::Level::TRACE, "verify_candidates");
    let _enter = span.enter();

    tracing::debug!(num_candidates = candidates.len(), "verifying candidates");

    let mut decisions = Vec::new();

    if cfg!(feature = "rayon") && threading {
        #[cfg(feature = "rayon")]
        {
            decisions = candidates
                .par_iter()
                .map(|c| verify_one(c, noise_zones, comparator, tunables))
                .collect::<Vec<_>>();
        }
    } else {
        decisions.extend(
            candidates
                .iter()
                .map(|c| verify_one(c, noise_zones, comparator, tunables)),
        );
    }

    let cuts: Vec<CutCandidate> = candidates
        .iter()
        .zip(&decisions)
        .filter(|(_, d)| d.passed())
        .map(|(c, _)| *c)
        .collect();

    tracing::debug!(
        "verified: {}/{} candidates passed",
        cuts.len(),
        candidates.len()
    );

    Verified { cuts, decisions }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cuts::Verdict;
    use crate::Error;

    fn constant(value: f64) -> impl Fn(f64, f64) -> Result<f64> + Sync {
        move |_, _| Ok(value)
    }

    // Similarity depends only on how far apart the two frames are.
    fn by_distance(short: f64, long: f64) -> impl Fn(f64, f64) -> Result<f64> + Sync {
        move |before, after| {
            if after - before > 2.0 {
                Ok(long)
            } else {
                Ok(short)
            }
        }
    }

    fn failing(_: f64, _: f64) -> Result<f64> {
        Err(Error::NoFrameAt { time: 0.0 })
    }

    fn scene(time: f64, peak: f64) -> CutCandidate {
        CutCandidate::new(time, peak, 0.0, 0.0).with_peak_score(peak)
    }

    fn zone(start: f64, end: f64) -> NoiseZone {
        NoiseZone {
            start,
            end,
            detection_count: 100,
        }
    }

    fn verify(
        candidates: &[CutCandidate],
        zones: &[NoiseZone],
        comparator: &dyn FrameComparator,
    ) -> Verified {
        verify_candidates(candidates, zones, comparator, &Tunables::default(), false)
    }

    #[test]
    fn test_strong_scene_with_neutral_frames_passes() {
        let verified = verify(&[scene(10.0, 30.0)], &[], &constant(0.5));
        assert_eq!(verified.cuts.len(), 1);
        assert_eq!(verified.cuts[0].time(), 10.0);
        assert_eq!(verified.decisions[0].reason, Reason::SceneOnly);
        assert_eq!(verified.decisions[0].stability, Some((0.5, 0.5)));
        // Strong peak: no same-scene histogram check.
        assert_eq!(verified.decisions[0].similarity, None);
    }

    #[test]
    fn test_black_frame_bypasses_comparator() {
        let calls = AtomicUsize::new(0);
        let comparator = |_: f64, _: f64| -> Result<f64> {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::NoFrameAt { time: 0.0 })
        };
        let candidate = CutCandidate::new(40.0, 7.0, 0.2, 0.0).with_peak_score(7.0);
        let verified = verify(&[candidate], &[zone(30.0, 60.0)], &comparator);

        assert_eq!(verified.cuts.len(), 1);
        assert_eq!(verified.decisions[0].reason, Reason::BlackFrame);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_noise_zone_same_scene_fails() {
        let zones = [zone(100.0, 140.0)];
        // Within the 10s margin after the zone.
        let verified = verify(&[scene(148.0, 30.0)], &zones, &constant(0.7));
        assert!(verified.cuts.is_empty());
        assert_eq!(verified.decisions[0].reason, Reason::NoiseZone);

        // Far from the zone the same frames are fine.
        let verified = verify(&[scene(170.0, 30.0)], &zones, &constant(0.7));
        assert_eq!(verified.cuts.len(), 1);
    }

    #[test]
    fn test_audio_corroboration_skips_histogram() {
        let candidate = CutCandidate::new(20.0, 12.0, 0.0, 5.0).with_peak_score(8.5);
        let verified = verify(&[candidate], &[], &constant(0.9));
        assert_eq!(verified.cuts.len(), 1);
        assert_eq!(verified.decisions[0].reason, Reason::Audio);
        assert_eq!(verified.decisions[0].similarity, None);

        let verified = verify(&[candidate], &[], &constant(0.96));
        assert!(verified.cuts.is_empty());
        assert_eq!(verified.decisions[0].reason, Reason::Flash);
    }

    #[test]
    fn test_borderline_scene_same_scene_fails() {
        let verified = verify(&[scene(20.0, 9.5)], &[], &constant(0.75));
        assert!(verified.cuts.is_empty());
        assert_eq!(verified.decisions[0].reason, Reason::SameScene);
        assert_eq!(verified.decisions[0].similarity, Some(0.75));

        let verified = verify(&[scene(20.0, 9.5)], &[], &constant(0.3));
        assert_eq!(verified.cuts.len(), 1);
    }

    #[test]
    fn test_flash_requires_both_horizons() {
        // Very similar at the short horizon, very different at the long one: a real cut.
        let verified = verify(&[scene(20.0, 30.0)], &[], &by_distance(0.97, 0.4));
        assert_eq!(verified.cuts.len(), 1);

        // Similar at both horizons: a flash.
        let verified = verify(&[scene(20.0, 30.0)], &[], &by_distance(0.86, 0.96));
        assert!(verified.cuts.is_empty());
        assert_eq!(verified.decisions[0].reason, Reason::Flash);
        assert_eq!(verified.decisions[0].stability, Some((0.86, 0.96)));

        // Moderately similar at both, but neither is near-identical.
        let verified = verify(&[scene(20.0, 30.0)], &[], &by_distance(0.9, 0.9));
        assert_eq!(verified.cuts.len(), 1);
    }

    #[test]
    fn test_side_stability() {
        let tunables = Tunables::default().with_side_stability(true);
        let candidates = [scene(20.0, 30.0)];

        // Every pair is dissimilar, so neither side is stable.
        let verified = verify_candidates(&candidates, &[], &constant(0.2), &tunables, false);
        assert!(verified.cuts.is_empty());
        assert_eq!(verified.decisions[0].reason, Reason::CameraMotion);

        // Frames after the cut agree with each other.
        let comparator = |before: f64, _: f64| -> Result<f64> {
            Ok(if before >= 20.0 { 0.8 } else { 0.2 })
        };
        let verified = verify_candidates(&candidates, &[], &comparator, &tunables, false);
        assert_eq!(verified.cuts.len(), 1);
        assert_eq!(verified.decisions[0].sides, Some((0.2, 0.8)));
    }

    #[test]
    fn test_comparator_failure_fails_closed() {
        let candidates = [
            scene(10.0, 30.0),
            CutCandidate::new(30.0, 30.0, 1.0, 0.0).with_peak_score(30.0),
            scene(50.0, 30.0),
        ];
        let verified = verify(&candidates, &[], &failing);

        assert_eq!(verified.decisions.len(), 3);
        assert_eq!(verified.decisions[0].reason, Reason::Unverifiable);
        assert!(verified.decisions[0].error.is_some());
        assert_eq!(verified.decisions[1].verdict, Verdict::Pass);
        assert_eq!(verified.decisions[2].reason, Reason::Unverifiable);
        assert_eq!(verified.cuts.len(), 1);
        assert_eq!(verified.cuts[0].time(), 30.0);
    }

    #[test]
    fn test_before_time_is_clamped() {
        let comparator = |before: f64, _: f64| -> Result<f64> {
            assert!(before >= 0.0);
            Ok(0.1)
        };
        let verified = verify(&[scene(0.3, 9.0)], &[], &comparator);
        assert_eq!(verified.cuts.len(), 1);
    }

    #[test]
    fn test_threaded_preserves_order() {
        let candidates: Vec<_> = (0..64)
            .map(|i| scene(i as f64 * 5.0, if i % 3 == 0 { 9.0 } else { 30.0 }))
            .collect();
        // Borderline candidates fail the same-scene check, the rest pass.
        let comparator = constant(0.8);

        let sequential =
            verify_candidates(&candidates, &[], &comparator, &Tunables::default(), false);
        let threaded =
            verify_candidates(&candidates, &[], &comparator, &Tunables::default(), true);

        assert_eq!(sequential.decisions, threaded.decisions);
        assert_eq!(sequential.cuts, threaded.cuts);
        assert!(threaded
            .cuts
            .windows(2)
            .all(|w| w[0].time() < w[1].time()));
        assert_eq!(threaded.cuts.len(), 42);
    }
}
