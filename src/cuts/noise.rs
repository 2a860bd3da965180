use std::collections::{BTreeMap, BTreeSet};

use super::{NoiseZone, SceneEvent, Tunables};

// Sums per-second counts over `[start, start + len)`.
fn count_in(per_second: &BTreeMap<i64, usize>, start: i64, len: i64) -> usize {
    per_second
        .range(start..start.saturating_add(len))
        .map(|(_, n)| *n)
        .sum()
}

/// Finds sustained regions of high scene event density.
///
/// A window of `noise_window` seconds slides one second at a time across the observed range,
/// visiting only the starts whose window covers at least one event. Every window start whose average rate reaches `noise_density` is marked, consecutive marked
/// starts are grouped into a zone ending one window past its last start, zones shorter than
/// `noise_min_duration` are dropped, and zones at most `noise_merge_gap` apart are merged.
///
/// The returned zones are chronological and non-overlapping.
pub fn detect_noise_zones(scenes: &[SceneEvent], tunables: &Tunables) -> Vec<NoiseZone> {
    let span = tracing::span!(tracing::Level::TRACE, "detect_noise_zones");
    let _enter = span.enter();

    let mut per_second: BTreeMap<i64, usize> = BTreeMap::new();
    for event in scenes {
        *per_second.entry(event.second()).or_default() += 1;
    }

    let (min_t, max_t) = match (per_second.keys().next(), per_second.keys().next_back()) {
        (Some(min_t), Some(max_t)) => (*min_t, *max_t),
        _ => return Vec::new(),
    };

    let window = i64::from(tunables.noise_window.max(1));
    let last_start = max_t.saturating_sub(window - 1);

    // Windows holding no event have zero density, so only starts near an event are evaluated.
    let starts: BTreeSet<i64> = per_second
        .keys()
        .flat_map(|&t| t.saturating_sub(window - 1).max(min_t)..=t.min(last_start))
        .collect();
    let high_density: Vec<i64> = starts
        .into_iter()
        .filter(|&t| {
            let avg = count_in(&per_second, t, window) as f64 / window as f64;
            avg >= tunables.noise_density
        })
        .collect();

    // Group consecutive starts into runs.
    let mut runs: Vec<(i64, i64)> = Vec::new();
    for t in high_density {
        match runs.last_mut() {
            Some((_, end)) if t <= end.saturating_add(1) => *end = t,
            _ => runs.push((t, t)),
        }
    }

    let zones = runs.into_iter().filter_map(|(start, last)| {
        let duration = last.saturating_sub(start).saturating_add(window);
        if (duration as f64) < tunables.noise_min_duration {
            return None;
        }
        Some(NoiseZone {
            start: start as f64,
            end: start.saturating_add(duration) as f64,
            detection_count: count_in(&per_second, start, duration),
        })
    });

    let mut merged: Vec<NoiseZone> = Vec::new();
    for zone in zones {
        match merged.last_mut() {
            Some(prev) if zone.start - prev.end <= tunables.noise_merge_gap => {
                prev.end = zone.end;
                prev.detection_count += zone.detection_count;
            }
            _ => merged.push(zone),
        }
    }

    tracing::debug!(num_zones = merged.len(), "finished noise zone detection");

    merged
}

/// Removes scene events from the interior of each noise zone.
///
/// Events within `noise_boundary_margin` of a zone's start or end are kept: the onset and the
/// end of tape noise are where a real recording boundary is most likely to sit.
pub fn suppress_noise_detections(
    scenes: &[SceneEvent],
    zones: &[NoiseZone],
    tunables: &Tunables,
) -> Vec<SceneEvent> {
    let margin = tunables.noise_boundary_margin;
    scenes
        .iter()
        .filter(|e| !zones.iter().any(|z| z.interior_contains(e.time, margin)))
        .copied()
        .collect()
}
