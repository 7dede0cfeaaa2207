//! Interval Merge Engine
//!
//! Partitions the interest ranges held by a broker into segments: maximal
//! contiguous sub-ranges of one topic over which the exact set of interested
//! owners does not change.
//!
//! The merge is a pure function of its input and always recomputes from
//! scratch. Per topic it sweeps a sorted list of boundary events:
//!
//! - at equal coordinates, start events are applied before end events
//! - when the coordinate advances with a non-empty active set, the interval
//!   `[previous, current)` is emitted with the set as it was before the event
//! - zero-width and empty intervals are never emitted
//! - an interval that touches the previous one with the same owners extends it
//!
//! Active owners are counted, so two overlapping ranges from the same owner do
//! not cancel each other when the first one ends.

use std::collections::BTreeMap;

use grouper_core::{InterestRange, MemberSet, PeerIdentity, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Edge {
    // Declaration order is the tie-break order at equal coordinates
    Start,
    End,
}

/// Merge `(range, owner)` pairs into segments
///
/// Output is sorted by `(start, topic, end)`.
pub fn merge<I: PeerIdentity>(ranges: &[(InterestRange, I)]) -> Vec<Segment<I>> {
    let mut segments = Vec::new();
    for topic in [false, true] {
        segments.extend(merge_topic(
            topic,
            ranges.iter().filter(|(r, _)| r.topic() == topic),
        ));
    }
    segments.sort_by(|a, b| (a.start, a.topic, a.end).cmp(&(b.start, b.topic, b.end)));
    segments
}

fn merge_topic<'a, I: PeerIdentity>(
    topic: bool,
    ranges: impl Iterator<Item = &'a (InterestRange, I)>,
) -> Vec<Segment<I>> {
    let mut edges: Vec<(u8, Edge, &I)> = Vec::new();
    for (range, owner) in ranges {
        edges.push((range.start(), Edge::Start, owner));
        edges.push((range.end(), Edge::End, owner));
    }
    edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    let mut out: Vec<Segment<I>> = Vec::new();
    let mut active: BTreeMap<&I, usize> = BTreeMap::new();
    let mut previous: Option<u8> = None;

    for (coord, edge, owner) in edges {
        if let Some(prev) = previous {
            if coord > prev && !active.is_empty() {
                let members: MemberSet<I> = active.keys().map(|m| (*m).clone()).collect();
                emit(&mut out, topic, prev, coord, members);
            }
        }

        match edge {
            Edge::Start => *active.entry(owner).or_insert(0) += 1,
            Edge::End => {
                if let Some(count) = active.get_mut(owner) {
                    *count -= 1;
                    if *count == 0 {
                        active.remove(owner);
                    }
                }
            }
        }
        previous = Some(coord);
    }

    out
}

fn emit<I: PeerIdentity>(
    out: &mut Vec<Segment<I>>,
    topic: bool,
    start: u8,
    end: u8,
    members: MemberSet<I>,
) {
    if let Some(last) = out.last_mut() {
        if last.end == start && last.members == members {
            last.end = end;
            return;
        }
    }
    out.push(Segment::new(topic, start, end, members));
}
