//! Upcoming-event list entries
//!
//! Every instance boundary of a layer-bearing object becomes one event;
//! keyframe instance boundaries become keyframe events. The list is sorted
//! by the strict total order `(time, kind, obj_id)` so output is
//! deterministic regardless of input order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::Time;

/// What happens at an event boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Start,
    End,
    KeyFrame,
}

/// One upcoming instance boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextEvent {
    pub kind: EventKind,
    pub time: Time,
    pub obj_id: String,
}

impl NextEvent {
    pub fn new(kind: EventKind, time: Time, obj_id: impl Into<String>) -> Self {
        NextEvent {
            kind,
            time,
            obj_id: obj_id.into(),
        }
    }
}

impl Ord for NextEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.kind.cmp(&other.kind))
            .then_with(|| self.obj_id.cmp(&other.obj_id))
    }
}

impl PartialOrd for NextEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
