//! Interval model: interest ranges, event points and merged segments
//!
//! All coordinates live on the integer attribute domain `[0, 30]`.
//! A topic is a boolean attribute; ranges and events only ever interact
//! with values of the same topic.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IntervalError;
use crate::identity::PeerIdentity;

/// Lowest coordinate of the attribute domain
pub const DOMAIN_MIN: u8 = 0;

/// Highest coordinate of the attribute domain
pub const DOMAIN_MAX: u8 = 30;

/// Canonical set of peers sharing a segment
///
/// Ordered so equality and hashing depend only on membership.
pub type MemberSet<I> = BTreeSet<I>;

/// A subscriber's range of interest on one topic
///
/// Invariant: `start < end`, `start ∈ [0, 30)`, `end ∈ (0, 30]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange", into = "RawRange")]
pub struct InterestRange {
    topic: bool,
    start: u8,
    end: u8,
}

impl InterestRange {
    /// Build a validated range
    pub fn new(topic: bool, start: u8, end: u8) -> Result<Self, IntervalError> {
        if start >= DOMAIN_MAX {
            return Err(IntervalError::StartOutOfDomain {
                start,
                max: DOMAIN_MAX,
            });
        }
        if end > DOMAIN_MAX || end == DOMAIN_MIN {
            return Err(IntervalError::EndOutOfDomain {
                end,
                max: DOMAIN_MAX,
            });
        }
        if start >= end {
            return Err(IntervalError::EmptyRange { start, end });
        }
        Ok(Self { topic, start, end })
    }

    pub fn topic(&self) -> bool {
        self.topic
    }

    pub fn start(&self) -> u8 {
        self.start
    }

    pub fn end(&self) -> u8 {
        self.end
    }

    /// Inclusive containment test
    pub fn contains(&self, point: &EventPoint) -> bool {
        point.topic == self.topic && point.value >= self.start && point.value <= self.end
    }
}

impl fmt::Display for InterestRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{},{}]", self.topic, self.start, self.end)
    }
}

#[derive(Serialize, Deserialize)]
struct RawRange {
    topic: bool,
    start: u8,
    end: u8,
}

impl TryFrom<RawRange> for InterestRange {
    type Error = IntervalError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        InterestRange::new(raw.topic, raw.start, raw.end)
    }
}

impl From<InterestRange> for RawRange {
    fn from(range: InterestRange) -> Self {
        RawRange {
            topic: range.topic,
            start: range.start,
            end: range.end,
        }
    }
}

/// A published event: one value on one topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPoint", into = "RawPoint")]
pub struct EventPoint {
    topic: bool,
    value: u8,
}

impl EventPoint {
    /// Build a validated event point
    pub fn new(topic: bool, value: u8) -> Result<Self, IntervalError> {
        if value > DOMAIN_MAX {
            return Err(IntervalError::ValueOutOfDomain {
                value,
                max: DOMAIN_MAX,
            });
        }
        Ok(Self { topic, value })
    }

    pub fn topic(&self) -> bool {
        self.topic
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}

impl fmt::Display for EventPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.topic, self.value)
    }
}

#[derive(Serialize, Deserialize)]
struct RawPoint {
    topic: bool,
    value: u8,
}

impl TryFrom<RawPoint> for EventPoint {
    type Error = IntervalError;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        EventPoint::new(raw.topic, raw.value)
    }
}

impl From<EventPoint> for RawPoint {
    fn from(point: EventPoint) -> Self {
        RawPoint {
            topic: point.topic,
            value: point.value,
        }
    }
}

/// A maximal sub-range of one topic with a fixed set of interested peers
///
/// Segments are value objects: they are recomputed wholesale whenever the
/// interest data changes and carry no identity of their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity")]
pub struct Segment<I: PeerIdentity> {
    pub start: u8,
    pub end: u8,
    pub topic: bool,
    pub members: MemberSet<I>,
}

impl<I: PeerIdentity> Segment<I> {
    pub fn new(topic: bool, start: u8, end: u8, members: MemberSet<I>) -> Self {
        Self {
            start,
            end,
            topic,
            members,
        }
    }

    /// Event matching uses inclusive bounds on both ends
    pub fn matches(&self, event: &EventPoint) -> bool {
        event.topic == self.topic && event.value >= self.start && event.value <= self.end
    }

    /// Width of the half-open sweep interval `[start, end)`
    pub fn width(&self) -> u8 {
        self.end - self.start
    }
}

impl<I: PeerIdentity> fmt::Display for Segment<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.members.iter().map(|m| m.to_string()).collect();
        write!(
            f,
            "G{}({},{})<{}>",
            if self.topic { "+" } else { "-" },
            self.start,
            self.end,
            names.join(",")
        )
    }
}
