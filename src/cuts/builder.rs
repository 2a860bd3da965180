use super::{CutCandidate, SignalIndex, Tunables};

/// Builds cut candidates from an index of (noise-suppressed) signals.
///
/// Each scene cluster becomes one candidate anchored at its strongest event and scored with the
/// cluster total, provided that its peak reaches `min_peak_score`. Nearby black frames always
/// corroborate; nearby audio steps only count once the peak also reaches `audio_bonus_peak`, since
/// loudness jumps around a weak visual change are mostly hum or noise.
///
/// Seconds with a large audio step (`audio_only_step`) and no scene cluster at all become
/// audio-only candidates.
pub fn build_candidates(index: &SignalIndex, tunables: &Tunables) -> Vec<CutCandidate> {
    let span = tracing::span!(tracing::Level::TRACE, "build_candidates");
    let _enter = span.enter();

    let window = tunables.corroboration_window;
    let mut candidates = Vec::new();
    let mut weak_clusters = 0;

    for (second, cluster) in index.clusters() {
        if cluster.peak < tunables.min_peak_score {
            weak_clusters += 1;
            continue;
        }

        let black_duration = index.black_near(second, window);
        let audio_step = if cluster.peak >= tunables.audio_bonus_peak {
            index.audio_near(second, window)
        } else {
            0.0
        };

        candidates.push(
            CutCandidate::new(cluster.peak_time, cluster.total, black_duration, audio_step)
                .with_peak_score(cluster.peak),
        );
    }

    let num_scene_candidates = candidates.len();

    for (second, step) in index.audio_steps() {
        if step >= tunables.audio_only_step && index.cluster(second).is_none() {
            candidates.push(CutCandidate::new(
                second as f64,
                0.0,
                index.black_at(second),
                step,
            ));
        }
    }

    tracing::debug!(
        scene = num_scene_candidates,
        audio_only = candidates.len() - num_scene_candidates,
        weak_clusters,
        "built cut candidates"
    );

    candidates
}
