//! Resolved timeline types
//!
//! Output of the resolution orchestrator: every object (groups, children
//! and keyframes flattened into one id-indexed map) together with its
//! concrete instances, plus global statistics and the upcoming-event list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Instance, NextEvent, Reference, Time, TimelineObject};

/// Per-object resolution result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineResolveInfo {
    /// Concrete intervals during which the object is active, in time order.
    pub instances: Vec<Instance>,
    /// True for entries that came from a parent object's `keyframes`.
    pub is_keyframe: bool,
    /// Owning group (for children) or owning object (for keyframes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Every reference touched while evaluating this object's triggers,
    /// sorted for deterministic output. Consumed by the cache handler.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub direct_references: Vec<Reference>,
    /// Whether resolution completed for this object.
    pub resolved_references: bool,
    /// The object references its own layer or class.
    pub is_self_referencing: bool,
}

/// A timeline object together with its resolution result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTimelineObject {
    pub object: TimelineObject,
    pub resolved: TimelineResolveInfo,
}

impl ResolvedTimelineObject {
    /// Instance active at `time`, if any.
    pub fn instance_at(&self, time: Time) -> Option<&Instance> {
        self.resolved.instances.iter().find(|i| i.contains(time))
    }
}

/// Resolution counters. All-zero when statistics are skipped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveStatistics {
    /// Entries in the object map (groups, children and keyframes included).
    pub total_count: u32,
    /// Entries actually resolved during this call (cache misses).
    pub resolving_count: u32,
    /// Same as `resolving_count`, keyframes excluded.
    pub resolving_object_count: u32,
    /// Resolved plain objects (neither groups nor keyframes).
    pub resolved_object_count: u32,
    /// Resolved groups.
    pub resolved_group_count: u32,
    /// Resolved keyframes.
    pub resolved_keyframe_count: u32,
    /// Entries left unresolved (circular or failed).
    pub unresolved_count: u32,
}

/// A fully resolved timeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTimeline {
    /// All objects, flattened and keyed by id. `BTreeMap` so iteration and
    /// serialization order never depend on input order.
    pub objects: BTreeMap<String, ResolvedTimelineObject>,
    pub statistics: ResolveStatistics,
    /// Globally sorted, de-duplicated instance boundary events.
    pub next_events: Vec<NextEvent>,
    /// Set instead of returning `Err` when the caller opted into
    /// `dont_throw_on_error` and a recoverable resolution error occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolvedTimeline {
    pub fn get(&self, id: &str) -> Option<&ResolvedTimelineObject> {
        self.objects.get(id)
    }

    /// Instances of an object, empty slice when unknown.
    pub fn instances_of(&self, id: &str) -> &[Instance] {
        self.objects
            .get(id)
            .map(|obj| obj.resolved.instances.as_slice())
            .unwrap_or(&[])
    }
}
