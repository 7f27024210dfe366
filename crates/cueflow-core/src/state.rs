//! Point-in-time state types
//!
//! Output of the state handler: for one query instant, the single occupant
//! of every layer (content possibly keyframe-merged) and the strictly
//! future portion of the event list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Instance, NextEvent, ResolvedTimelineObject, Time};

/// An object together with the instance that makes it active right now.
/// The embedded object's `content` has keyframe content merged in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateObjectInstance {
    pub object: ResolvedTimelineObject,
    pub instance: Instance,
}

/// The state of the timeline at one instant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineState {
    pub time: Time,
    /// Occupant per layer. Layers with no active object are absent.
    pub layers: BTreeMap<String, StateObjectInstance>,
    /// Strictly future events, optionally truncated to the caller's limit.
    pub next_events: Vec<NextEvent>,
}

impl TimelineState {
    /// Occupant of a layer, if any.
    pub fn layer(&self, layer: &str) -> Option<&StateObjectInstance> {
        self.layers.get(layer)
    }
}
