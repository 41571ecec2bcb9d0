//! Pure derivations from a snapshot to what the table shows.

use std::collections::HashSet;

use shared::domain::{Estado, EventRecord};

/// Distinct `track` values, each once, in the order they first appear.
pub fn distinct_tracks(records: &[EventRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tracks = Vec::new();
    for record in records {
        if seen.insert(record.track()) {
            tracks.push(record.track().to_string());
        }
    }
    tracks
}

/// Filters by `selected_track` (all records when `None`) and moves every
/// in-progress record ahead of the rest. Both partitions keep snapshot order;
/// nothing else is sorted.
pub fn derive_view(records: &[EventRecord], selected_track: Option<&str>) -> Vec<EventRecord> {
    let mut view: Vec<EventRecord> = records
        .iter()
        .filter(|record| selected_track.map_or(true, |track| record.track() == track))
        .cloned()
        .collect();
    // `sort_by_key` is stable and `false < true`.
    view.sort_by_key(|record| record.estado() != Estado::InProgress);
    view
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
