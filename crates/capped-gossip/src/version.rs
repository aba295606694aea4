//! Version vectors
//!
//! Every replica stamps the operations it originates with a per-origin
//! counter. A version vector records, for each origin, exactly which stamps
//! a replica has applied, as sorted ranges. Exchanging vectors is how two
//! replicas learn which operations the other is missing.
//!
//! Stamps may arrive with gaps: a relay that pruned an origin's older
//! records only replays the newer ones. The gap stays open until a replica
//! that still holds the missing operations fills it.

use std::collections::HashMap;

use capped_core::PeerIdentity;
use serde::{Deserialize, Serialize};

/// Applied stamps per origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity")]
pub struct VersionVector<I: PeerIdentity> {
    /// Sorted, disjoint, non-adjacent inclusive ranges
    entries: HashMap<I, Vec<(u64, u64)>>,
}

impl<I: PeerIdentity> VersionVector<I> {
    /// Create an empty vector
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Highest stamp seen from `origin` (0 when nothing was seen)
    pub fn get(&self, origin: &I) -> u64 {
        self.entries
            .get(origin)
            .and_then(|ranges| ranges.last())
            .map_or(0, |&(_, end)| end)
    }

    /// Whether an operation with this stamp is already covered
    pub fn contains(&self, origin: &I, stamp: u64) -> bool {
        let Some(ranges) = self.entries.get(origin) else {
            return false;
        };
        let i = ranges.partition_point(|&(_, end)| end < stamp);
        ranges.get(i).is_some_and(|&(start, _)| start <= stamp)
    }

    /// Record a stamp from `origin`
    ///
    /// Returns `false` (and leaves the vector untouched) when the stamp is
    /// already covered.
    pub fn observe(&mut self, origin: &I, stamp: u64) -> bool {
        if self.contains(origin, stamp) {
            return false;
        }
        insert_range(self.entries.entry(origin.clone()).or_default(), stamp, stamp);
        true
    }

    /// Take the union with another vector
    pub fn merge(&mut self, other: &VersionVector<I>) {
        for (origin, ranges) in &other.entries {
            let mine = self.entries.entry(origin.clone()).or_default();
            for &(start, end) in ranges {
                insert_range(mine, start, end);
            }
        }
    }

    /// Stamps below the highest one that are still missing from `origin`
    pub fn gaps(&self, origin: &I) -> Vec<(u64, u64)> {
        let Some(ranges) = self.entries.get(origin) else {
            return Vec::new();
        };
        let mut gaps = Vec::new();
        let mut next = 1;
        for &(start, end) in ranges {
            if start > next {
                gaps.push((next, start - 1));
            }
            next = end.saturating_add(1);
        }
        gaps
    }

    /// Iterate over (origin, highest stamp)
    pub fn iter(&self) -> impl Iterator<Item = (&I, u64)> {
        self.entries
            .iter()
            .filter_map(|(origin, ranges)| ranges.last().map(|&(_, end)| (origin, end)))
    }

    /// Number of origins seen
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been seen yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<I: PeerIdentity> Default for VersionVector<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Add `start..=end`, coalescing with touching ranges
fn insert_range(ranges: &mut Vec<(u64, u64)>, start: u64, end: u64) {
    let lo = ranges.partition_point(|&(_, e)| e.saturating_add(1) < start);
    let hi = ranges.partition_point(|&(s, _)| s <= end.saturating_add(1));
    if lo == hi {
        ranges.insert(lo, (start, end));
        return;
    }
    let merged = (ranges[lo].0.min(start), ranges[hi - 1].1.max(end));
    ranges.splice(lo..hi, std::iter::once(merged));
}
