//! Random interest and event generation
//!
//! Range starts and event values are drawn from `[DOMAIN_MIN, DOMAIN_MAX)`;
//! a range end is drawn from `(start, DOMAIN_MAX]`.

use std::collections::BTreeSet;

use grouper_core::{DOMAIN_MAX, DOMAIN_MIN, EventPoint, InterestRange};
use rand::Rng;

const SPAN: usize = (DOMAIN_MAX - DOMAIN_MIN) as usize;

/// Number of distinct ranges the generator can produce
pub const MAX_DISTINCT_FILTERS: usize = 2 * SPAN * (SPAN + 1) / 2;

/// Number of distinct points the generator can produce
pub const MAX_DISTINCT_EVENTS: usize = 2 * SPAN;

/// Draw `count` distinct interest ranges
pub fn generate_filters<R: Rng>(rng: &mut R, count: usize) -> Vec<InterestRange> {
    let count = count.min(MAX_DISTINCT_FILTERS);
    let mut filters = BTreeSet::new();

    while filters.len() < count {
        let topic = rng.random::<bool>();
        let start = rng.random_range(DOMAIN_MIN..DOMAIN_MAX);
        let end = rng.random_range(start + 1..=DOMAIN_MAX);
        if let Ok(range) = InterestRange::new(topic, start, end) {
            filters.insert(range);
        }
    }

    filters.into_iter().collect()
}

/// Draw `count` distinct event points
pub fn generate_events<R: Rng>(rng: &mut R, count: usize) -> Vec<EventPoint> {
    let count = count.min(MAX_DISTINCT_EVENTS);
    let mut events = BTreeSet::new();

    while events.len() < count {
        let topic = rng.random::<bool>();
        let value = rng.random_range(DOMAIN_MIN..DOMAIN_MAX);
        if let Ok(event) = EventPoint::new(topic, value) {
            events.insert(event);
        }
    }

    events.into_iter().collect()
}
