use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use super::{AudioSteps, BlackEvent, SceneEvent};

/// All scene events that fell in one whole second.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SceneCluster {
    /// Sum of every score in the second.
    pub total: f64,
    /// Strongest single score in the second.
    pub peak: f64,
    /// Time of the strongest event. The first one wins on ties.
    pub peak_time: f64,
    pub count: usize,
}

/// Per-second view of the three signal channels.
#[derive(Clone, Debug, Default)]
pub struct SignalIndex {
    clusters: BTreeMap<i64, SceneCluster>,
    blacks: BTreeMap<i64, BlackEvent>,
    audio: AudioSteps,
}

impl SignalIndex {
    pub fn new(scenes: &[SceneEvent], blacks: &[BlackEvent], audio: &AudioSteps) -> Self {
        let mut clusters: BTreeMap<i64, SceneCluster> = BTreeMap::new();
        for event in scenes {
            clusters
                .entry(event.second())
                .and_modify(|c| {
                    c.total += event.score;
                    c.count += 1;
                    if event.score > c.peak {
                        c.peak = event.score;
                        c.peak_time = event.time;
                    }
                })
                .or_insert(SceneCluster {
                    total: event.score,
                    peak: event.score,
                    peak_time: event.time,
                    count: 1,
                });
        }

        // Keep only the longest black run ending in each second.
        let mut black_map: BTreeMap<i64, BlackEvent> = BTreeMap::new();
        for event in blacks {
            let longest = black_map.entry(event.second()).or_insert(*event);
            if event.duration > longest.duration {
                *longest = *event;
            }
        }

        Self {
            clusters,
            blacks: black_map,
            audio: audio.clone(),
        }
    }

    /// Scene clusters in chronological order.
    pub fn clusters(&self) -> impl Iterator<Item = (i64, &SceneCluster)> + '_ {
        self.clusters.iter().map(|(t, c)| (*t, c))
    }

    pub fn cluster(&self, second: i64) -> Option<&SceneCluster> {
        self.clusters.get(&second)
    }

    pub fn audio_steps(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.audio.iter()
    }

    /// Duration of the longest black run ending in exactly this second, or 0.
    pub fn black_at(&self, second: i64) -> f64 {
        self.blacks.get(&second).map_or(0.0, |b| b.duration)
    }

    /// Longest black run ending within `window` seconds of `second`, or 0.
    pub fn black_near(&self, second: i64, window: i64) -> f64 {
        self.blacks
            .range(neighbourhood(second, window))
            .map(|(_, b)| b.duration)
            .fold(0.0, f64::max)
    }

    /// Largest audio step within `window` seconds of `second`, or 0.
    pub fn audio_near(&self, second: i64, window: i64) -> f64 {
        self.audio
            .range(neighbourhood(second, window))
            .map(|(_, step)| step)
            .fold(0.0, f64::max)
    }
}

// Negative windows are treated as zero.
fn neighbourhood(second: i64, window: i64) -> RangeInclusive<i64> {
    let window = window.max(0);
    second.saturating_sub(window)..=second.saturating_add(window)
}
