//! Incremental resolution cache
//!
//! Caller-owned store of per-object timing hashes and raw (pre-occupancy)
//! resolution results. On a repeated call, objects whose timing-relevant
//! fields did not change and whose recorded references were not touched
//! by any change are reused verbatim instead of re-resolved.
//!
//! The hash covers an enumerated field tuple only; `content` is
//! deliberately excluded since content changes never affect timing.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::debug;

use cueflow_core::{Reference, ResolvedTimelineObject};

use crate::resolve::Arena;

/// Persisted resolution state, passed by `&mut` across resolve calls.
/// Single-writer: the caller must not share one cache between overlapping
/// calls.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResolverCache {
    /// Timing hash per object id, from the previous call.
    pub obj_hashes: BTreeMap<String, u64>,
    /// Raw resolution results from the previous call.
    pub objects: BTreeMap<String, ResolvedTimelineObject>,
    /// False until the first `persist`; an empty cache reuses nothing.
    pub has_old_data: bool,
}

impl ResolverCache {
    pub fn new() -> Self {
        ResolverCache::default()
    }

    /// Ids whose previous resolution result can be reused: timing hash
    /// unchanged and no recorded reference touched by any changed, added
    /// or removed object, transitively.
    pub(crate) fn still_valid(
        &self,
        arena: &Arena,
        new_hashes: &BTreeMap<String, u64>,
    ) -> HashSet<String> {
        if !self.has_old_data {
            return HashSet::new();
        }

        let mut changed_refs: BTreeSet<Reference> = BTreeSet::new();
        for (id, hash) in new_hashes {
            if self.obj_hashes.get(id) != Some(hash) {
                mark_affected(&arena.objects[id], &mut changed_refs);
            }
        }
        for (id, cached) in &self.objects {
            if !new_hashes.contains_key(id) {
                // Removed objects invalidate whatever referenced them.
                mark_affected(cached, &mut changed_refs);
            }
        }

        let mut valid: BTreeSet<String> = new_hashes
            .keys()
            .filter(|id| {
                self.obj_hashes.get(*id) == new_hashes.get(*id)
                    && self
                        .objects
                        .get(*id)
                        .map_or(false, |cached| cached.resolved.resolved_references)
            })
            .cloned()
            .collect();

        // Transitive invalidation over the recorded reference graph.
        // Cycle-safe: the valid set only ever shrinks.
        loop {
            let mut progressed = false;
            for id in valid.clone() {
                let cached = &self.objects[&id];
                let invalidated = changed_refs.contains(&Reference::Object(id.clone()))
                    || cached
                        .resolved
                        .direct_references
                        .iter()
                        .any(|reference| changed_refs.contains(reference));
                if invalidated {
                    valid.remove(&id);
                    mark_affected(cached, &mut changed_refs);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        debug!(
            changed_refs = changed_refs.len(),
            valid = valid.len(),
            "cache invalidation complete"
        );
        valid.into_iter().collect()
    }

    /// Snapshot the new object map for the next call.
    pub(crate) fn persist(
        &mut self,
        objects: &BTreeMap<String, ResolvedTimelineObject>,
        hashes: BTreeMap<String, u64>,
    ) {
        self.objects = objects.clone();
        self.obj_hashes = hashes;
        self.has_old_data = true;
    }
}

/// References affected by a change to this object: its own id, every
/// class it carries, its layer, and the ids of its children and
/// keyframes (their capping depends on it).
fn mark_affected(entry: &ResolvedTimelineObject, refs: &mut BTreeSet<Reference>) {
    refs.insert(Reference::Object(entry.object.id.clone()));
    for class in &entry.object.classes {
        refs.insert(Reference::Class(class.clone()));
    }
    if entry.object.has_layer() {
        refs.insert(Reference::Layer(entry.object.layer.clone()));
    }
    if let Some(children) = &entry.object.children {
        for child in children {
            refs.insert(Reference::Object(child.id.clone()));
        }
    }
    for keyframe in &entry.object.keyframes {
        refs.insert(Reference::Object(keyframe.id.clone()));
    }
}

/// Structural hash over the fixed tuple of timing-relevant fields.
pub(crate) fn timing_hash(entry: &ResolvedTimelineObject) -> u64 {
    let mut hasher = DefaultHasher::new();
    entry.object.enable.hash(&mut hasher);
    entry.object.disabled.hash(&mut hasher);
    entry.object.priority.hash(&mut hasher);
    entry.resolved.parent_id.hash(&mut hasher);
    entry.resolved.is_keyframe.hash(&mut hasher);
    entry.object.classes.hash(&mut hasher);
    entry.object.layer.hash(&mut hasher);
    entry.object.seamless.hash(&mut hasher);
    hasher.finish()
}
