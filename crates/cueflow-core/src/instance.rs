//! Instances and references
//!
//! An [`Instance`] is one concrete `[start, end)` interval during which an
//! object is active. Instances keep their pre-truncation bounds
//! (`original_start`/`original_end`) so that expressions referencing an
//! object see its intended span even after a higher-priority competitor
//! truncated it on the layer.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Time;

/// A reference target recorded during expression evaluation, consumed by
/// the cache invalidation handler.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Reference {
    /// `#objId`
    Object(String),
    /// `.className`
    Class(String),
    /// `$layerName`
    Layer(String),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Object(id) => write!(f, "#{id}"),
            Reference::Class(name) => write!(f, ".{name}"),
            Reference::Layer(name) => write!(f, "${name}"),
        }
    }
}

/// A concrete `[start, end)` interval during which an object is active.
///
/// `end == None` means open-ended. Invariant: `end >= start` whenever the
/// end is finite; negative spans are normalized to zero length before an
/// instance is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Stable, globally unique id (`@objId_n` convention).
    pub id: String,
    pub start: Time,
    pub end: Option<Time>,
    /// Start before any capping or priority truncation.
    pub original_start: Time,
    /// End before any capping or priority truncation (`None` = open).
    pub original_end: Option<Time>,
    /// References that contributed to this instance.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub references: BTreeSet<Reference>,
}

impl Instance {
    /// Build an instance whose original bounds equal its bounds.
    pub fn new(id: impl Into<String>, start: Time, end: Option<Time>) -> Self {
        Instance {
            id: id.into(),
            start,
            end,
            original_start: start,
            original_end: end,
            references: BTreeSet::new(),
        }
    }

    pub fn with_references(mut self, references: BTreeSet<Reference>) -> Self {
        self.references = references;
        self
    }

    /// Is the instance active at `time`? Zero-length instances are never
    /// active at any instant (`start <= t < end`).
    #[inline]
    pub fn contains(&self, time: Time) -> bool {
        self.start <= time && self.end.map_or(true, |end| time < end)
    }

    /// Duration in milliseconds, `None` when open-ended.
    #[inline]
    pub fn duration(&self) -> Option<i64> {
        self.end.map(|end| end - self.start)
    }

    #[inline]
    pub fn is_zero_length(&self) -> bool {
        self.end == Some(self.start)
    }

    /// Do two instances share any time, treating touching ends as shared?
    pub fn touches(&self, other: &Instance) -> bool {
        let self_ends_before = match self.end {
            Some(end) => end < other.start,
            None => false,
        };
        let other_ends_before = match other.end {
            Some(end) => end < self.start,
            None => false,
        };
        !self_ends_before && !other_ends_before
    }
}
