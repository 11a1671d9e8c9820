use crate::models::{ExtractedSlice, StationId};
use std::collections::BTreeMap;

/// Per-station series collected across many archive files.
///
/// Append-only. Partitions built by separate work units are combined with
/// [`SeriesAccumulator::merge`]; duplicates are left for the reassembler.
#[derive(Debug, Clone, Default)]
pub struct SeriesAccumulator {
    entries: BTreeMap<StationId, Vec<ExtractedSlice>>,
}

impl SeriesAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, station: StationId, slice: ExtractedSlice) {
        self.entries.entry(station).or_default().push(slice);
    }

    pub fn all(&self) -> &BTreeMap<StationId, Vec<ExtractedSlice>> {
        &self.entries
    }

    /// Append every sequence of `other` after this partition's.
    pub fn merge(&mut self, other: SeriesAccumulator) {
        for (station, slices) in other.entries {
            self.entries.entry(station).or_default().extend(slices);
        }
    }

    /// Number of stations with at least one slice.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.entries
            .values()
            .flat_map(|slices| slices.iter())
            .map(|s| s.len())
            .sum()
    }
}
