//! Interest ranges held by a broker

use std::collections::BTreeMap;
use std::time::Duration;

use grouper_core::{InterestRange, PeerIdentity, SimTime};

/// Every range a broker has been told about, tagged with its owner
///
/// Re-submitting the same range refreshes its timestamp instead of adding a
/// duplicate, so repeated deliveries of one Filters payload stay idempotent.
#[derive(Debug, Clone)]
pub struct InterestTable<I: PeerIdentity> {
    entries: BTreeMap<(I, InterestRange), SimTime>,
}

impl<I: PeerIdentity> Default for InterestTable<I> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<I: PeerIdentity> InterestTable<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `ranges` for `owner`, returning how many were new
    pub fn submit(&mut self, owner: &I, ranges: &[InterestRange], now: SimTime) -> usize {
        let mut added = 0;
        for range in ranges {
            if self.entries.insert((owner.clone(), *range), now).is_none() {
                added += 1;
            }
        }
        added
    }

    /// Drop every range of `owner`
    pub fn retract(&mut self, owner: &I) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(o, _), _| o != owner);
        before - self.entries.len()
    }

    /// Drop ranges submitted at least `ttl` ago
    pub fn evict_expired(&mut self, now: SimTime, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, submitted_at| !now.has_expired(*submitted_at, ttl));
        before - self.entries.len()
    }

    /// Snapshot in the shape the merge engine consumes
    pub fn ranges(&self) -> Vec<(InterestRange, I)> {
        self.entries
            .keys()
            .map(|(owner, range)| (*range, owner.clone()))
            .collect()
    }

    pub fn owners(&self) -> impl Iterator<Item = &I> {
        let mut last: Option<&I> = None;
        self.entries.keys().filter_map(move |(owner, _)| {
            if last == Some(owner) {
                None
            } else {
                last = Some(owner);
                Some(owner)
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
