//! Resolution orchestrator
//!
//! Iterative fixed-point engine over an id-indexed arena of objects.
//! Each sweep attempts to evaluate every still-unresolved object's
//! triggers; an object whose dependencies are all resolved gets its
//! instances computed (repetition expanded, capped to its parent) and
//! moves to `Resolved`. Sweeps repeat while progress is made; a leftover
//! cluster is mutually circular.
//!
//! Groups and keyframes are flattened into the arena with an explicit
//! `parent_id`; all tree walks go through id lookups, never embedded
//! pointers.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, trace};

use cueflow_core::{
    EventKind, Instance, Keyframe, NextEvent, Reference, ResolveStatistics, ResolvedTimeline,
    ResolvedTimelineObject, Time, TimelineObject, TimelineResolveInfo,
};

use crate::algebra::{self, InstanceIdGen};
use crate::cache::{self, ResolverCache};
use crate::error::{ResolveError, ResolveResult, ValidationError};
use crate::lookup::{self, EvalCtx, RefLog, ScalarValue, SetValue};
use crate::occupancy;
use crate::validate;
use crate::{ResolveOptions, DEFAULT_LIMIT_COUNT, DEFAULT_LIMIT_TIME_WINDOW};

/// Per-object resolution state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ObjStatus {
    Unresolved,
    Resolving,
    Resolved,
    Failed,
}

/// Id-indexed object arena plus the lookup tables built from it.
pub(crate) struct Arena {
    pub objects: BTreeMap<String, ResolvedTimelineObject>,
    /// Ids in input (flatten) order: sweep order and occupancy tie-break.
    pub order: Vec<String>,
    pub order_index: HashMap<String, usize>,
    /// Class name -> member ids, in input order.
    pub class_members: HashMap<String, Vec<String>>,
    /// Layer name -> member ids (layer-bearing non-keyframes), input order.
    pub layer_members: BTreeMap<String, Vec<String>>,
}

impl Arena {
    pub fn build(timeline: &[TimelineObject]) -> ResolveResult<Arena> {
        let mut arena = Arena {
            objects: BTreeMap::new(),
            order: Vec::new(),
            order_index: HashMap::new(),
            class_members: HashMap::new(),
            layer_members: BTreeMap::new(),
        };
        for obj in timeline {
            arena.insert_object(obj.clone(), None)?;
        }
        for id in &arena.order {
            let entry = &arena.objects[id];
            for class in &entry.object.classes {
                arena
                    .class_members
                    .entry(class.clone())
                    .or_default()
                    .push(id.clone());
            }
            if !entry.resolved.is_keyframe && entry.object.has_layer() {
                arena
                    .layer_members
                    .entry(entry.object.layer.clone())
                    .or_default()
                    .push(id.clone());
            }
        }
        Ok(arena)
    }

    fn insert_object(
        &mut self,
        obj: TimelineObject,
        parent_id: Option<&str>,
    ) -> ResolveResult<()> {
        if obj.id.is_empty() {
            return Err(ValidationError::EmptyName { field: "object id" }.into());
        }
        if self.objects.contains_key(&obj.id) {
            return Err(ValidationError::DuplicateId(obj.id).into());
        }
        let id = obj.id.clone();
        let keyframes = obj.keyframes.clone();
        let children = obj.children.clone();

        self.order_index.insert(id.clone(), self.order.len());
        self.order.push(id.clone());
        self.objects.insert(
            id.clone(),
            ResolvedTimelineObject {
                object: obj,
                resolved: TimelineResolveInfo {
                    parent_id: parent_id.map(str::to_string),
                    ..TimelineResolveInfo::default()
                },
            },
        );

        for keyframe in keyframes {
            self.insert_keyframe(keyframe, &id)?;
        }
        if let Some(children) = children {
            for child in children {
                self.insert_object(child, Some(&id))?;
            }
        }
        Ok(())
    }

    fn insert_keyframe(&mut self, keyframe: Keyframe, parent_id: &str) -> ResolveResult<()> {
        if keyframe.id.is_empty() {
            return Err(ValidationError::EmptyName {
                field: "keyframe id",
            }
            .into());
        }
        if self.objects.contains_key(&keyframe.id) {
            return Err(ValidationError::DuplicateId(keyframe.id).into());
        }
        let id = keyframe.id.clone();
        self.order_index.insert(id.clone(), self.order.len());
        self.order.push(id.clone());
        self.objects.insert(
            id,
            ResolvedTimelineObject {
                object: TimelineObject {
                    id: keyframe.id,
                    enable: keyframe.enable,
                    layer: String::new(),
                    priority: keyframe.priority,
                    classes: keyframe.classes,
                    content: keyframe.content,
                    ..TimelineObject::default()
                },
                resolved: TimelineResolveInfo {
                    is_keyframe: true,
                    parent_id: Some(parent_id.to_string()),
                    ..TimelineResolveInfo::default()
                },
            },
        );
        Ok(())
    }
}

/// Resolve a timeline into concrete instances. See [`crate::resolve`].
pub(crate) fn resolve_timeline(
    timeline: &[TimelineObject],
    options: &ResolveOptions,
    mut cache: Option<&mut ResolverCache>,
) -> ResolveResult<ResolvedTimeline> {
    if !options.skip_validation {
        validate::validate_timeline(timeline)?;
    }

    let mut arena = Arena::build(timeline)?;
    let mut idgen = InstanceIdGen::new();
    let mut statuses: HashMap<String, ObjStatus> = arena
        .order
        .iter()
        .map(|id| (id.clone(), ObjStatus::Unresolved))
        .collect();
    let new_hashes: BTreeMap<String, u64> = arena
        .objects
        .iter()
        .map(|(id, entry)| (id.clone(), cache::timing_hash(entry)))
        .collect();
    let mut fresh: HashSet<String> = HashSet::new();

    if let Some(cache) = cache.as_deref() {
        let valid = cache.still_valid(&arena, &new_hashes);
        for id in &valid {
            let cached = cache.objects[id].resolved.clone();
            idgen.seed(id, cached.instances.len() as u32);
            arena.objects.get_mut(id).expect("cached id in arena").resolved = cached;
            statuses.insert(id.clone(), ObjStatus::Resolved);
        }
        debug!(
            reused = valid.len(),
            total = arena.order.len(),
            "reusing cached resolution results"
        );
    }

    // Fixed-point sweeps over the unresolved worklist.
    let mut errors: Vec<String> = Vec::new();
    let order = arena.order.clone();
    let mut sweeps = 0usize;
    loop {
        sweeps += 1;
        let mut progress = false;
        for id in &order {
            if statuses[id] != ObjStatus::Unresolved {
                continue;
            }
            statuses.insert(id.clone(), ObjStatus::Resolving);
            match resolve_object(&arena, &statuses, options, id) {
                Ok(Some((mut instances, log))) => {
                    for instance in &mut instances {
                        instance.id = idgen.next(id);
                    }
                    trace!(obj = %id, count = instances.len(), "resolved");
                    let entry = arena.objects.get_mut(id).expect("id in arena");
                    entry.resolved.instances = instances;
                    entry.resolved.direct_references = log.references.into_iter().collect();
                    entry.resolved.resolved_references = true;
                    entry.resolved.is_self_referencing = log.is_self_referencing;
                    statuses.insert(id.clone(), ObjStatus::Resolved);
                    fresh.insert(id.clone());
                    progress = true;
                }
                Ok(None) => {
                    statuses.insert(id.clone(), ObjStatus::Unresolved);
                }
                Err(err) if err.is_recoverable() && options.dont_throw_on_error => {
                    statuses.insert(id.clone(), ObjStatus::Failed);
                    errors.push(err.to_string());
                    progress = true;
                }
                Err(err) => return Err(err),
            }
        }
        if !progress {
            break;
        }
    }
    debug!(sweeps, resolving = fresh.len(), "fixed point reached");

    let unresolved: Vec<String> = order
        .iter()
        .filter(|id| statuses[*id] == ObjStatus::Unresolved)
        .cloned()
        .collect();
    if !unresolved.is_empty() {
        let err = ResolveError::CircularReference(unresolved.clone());
        if options.dont_throw_on_error {
            errors.push(err.to_string());
            for id in &unresolved {
                statuses.insert(id.clone(), ObjStatus::Failed);
            }
        } else {
            return Err(err);
        }
    }

    // Snapshot raw (pre-occupancy) results; the occupancy sweep, keyframe
    // capping and event assembly are recomputed every call.
    if let Some(cache) = cache.as_deref_mut() {
        cache.persist(&arena.objects, new_hashes);
    }

    let statistics = if options.skip_statistics {
        ResolveStatistics::default()
    } else {
        build_statistics(&arena, &statuses, &fresh)
    };

    occupancy::resolve_layers(&mut arena, &mut idgen);
    cap_keyframes(&mut arena, &mut idgen);
    let next_events = build_events(&arena);

    Ok(ResolvedTimeline {
        objects: arena.objects,
        statistics,
        next_events,
        error: if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        },
    })
}

/// Attempt to resolve one object. `Ok(None)` means a dependency is not
/// resolved yet; retry in a later sweep.
fn resolve_object(
    arena: &Arena,
    statuses: &HashMap<String, ObjStatus>,
    options: &ResolveOptions,
    id: &str,
) -> ResolveResult<Option<(Vec<Instance>, RefLog)>> {
    let entry = &arena.objects[id];
    let obj = &entry.object;
    let mut log = RefLog::default();

    if obj.disabled {
        return Ok(Some((Vec::new(), log)));
    }

    let parent_instances: Option<Vec<Instance>> = match &entry.resolved.parent_id {
        Some(parent_id) => {
            log.references.insert(Reference::Object(parent_id.clone()));
            match statuses.get(parent_id) {
                Some(ObjStatus::Resolved) => {
                    Some(arena.objects[parent_id].resolved.instances.clone())
                }
                // A child of a failed object stays unresolved.
                _ => return Ok(None),
            }
        }
        None => None,
    };

    let ctx = EvalCtx {
        arena,
        statuses,
        obj_id: id,
    };
    let mut instances: Vec<Instance> = Vec::new();
    for enable in &obj.enable {
        match resolve_enable_entry(&ctx, enable, parent_instances.as_deref(), options, &mut log)? {
            None => return Ok(None),
            Some(entry_instances) => instances.extend(entry_instances),
        }
    }
    instances.sort_by_key(|i| (i.start, i.end.unwrap_or(Time::MAX)));
    if obj.seamless {
        instances = algebra::union_all(instances);
    }
    Ok(Some((instances, log)))
}

/// How an entry's end is determined.
enum EndSpec {
    Open,
    End { values: Vec<Option<i64>>, constant: bool },
    Duration { values: Vec<Option<i64>> },
}

/// Resolve one enable entry into instances: evaluate its triggers, expand
/// repetition, cap to the parent.
fn resolve_enable_entry(
    ctx: &EvalCtx<'_>,
    enable: &cueflow_core::Enable,
    parent_instances: Option<&[Instance]>,
    options: &ResolveOptions,
    log: &mut RefLog,
) -> ResolveResult<Option<Vec<Instance>>> {
    // Repeat period first: shared by both trigger forms.
    let repeating: Option<i64> = match &enable.repeating {
        None => None,
        Some(expr) => {
            let ast = lookup::interpret(expr)?;
            match lookup::eval_scalar(ctx, &ast, log)? {
                ScalarValue::Unresolved => return Ok(None),
                ScalarValue::Values(values) => match values.first().copied().flatten() {
                    Some(period) if period > 0 => Some(period),
                    Some(period) => {
                        return Err(ResolveError::InvalidExpression {
                            obj: ctx.obj_id.to_string(),
                            reason: format!("repeat period must be positive, got {period}"),
                        })
                    }
                    None => None,
                },
            }
        }
    };

    let mut spans: Vec<Instance>;
    let mut skip_parent_cap = false;
    if let Some(while_expr) = &enable.while_active {
        let ast = lookup::interpret(while_expr)?;
        let set = match lookup::eval_set(ctx, &ast, log)? {
            SetValue::Unresolved => return Ok(None),
            SetValue::Instances(set) => set,
        };
        // A constant-true `while` inside a group means "while the parent";
        // the spans already are the parent instances, capping them again
        // would only manufacture boundary artifacts.
        spans = match (parent_instances, ast.is_constant()) {
            (Some(parents), true) if !set.is_empty() => {
                skip_parent_cap = repeating.is_none();
                parents.to_vec()
            }
            _ => set,
        };
    } else {
        let Some(start_expr) = &enable.start else {
            // Shape normally guaranteed by validation; an entry without a
            // trigger yields nothing when validation was skipped.
            return Ok(Some(Vec::new()));
        };
        let start_ast = lookup::interpret(start_expr)?;
        let start_values = match lookup::eval_scalar(ctx, &start_ast, log)? {
            ScalarValue::Unresolved => return Ok(None),
            ScalarValue::Values(values) => values,
        };

        let end_spec = if let Some(end_expr) = &enable.end {
            let ast = lookup::interpret(end_expr)?;
            match lookup::eval_scalar(ctx, &ast, log)? {
                ScalarValue::Unresolved => return Ok(None),
                ScalarValue::Values(values) => EndSpec::End {
                    values,
                    constant: ast.is_constant(),
                },
            }
        } else if let Some(duration_expr) = &enable.duration {
            let ast = lookup::interpret(duration_expr)?;
            match lookup::eval_scalar(ctx, &ast, log)? {
                ScalarValue::Unresolved => return Ok(None),
                ScalarValue::Values(values) => EndSpec::Duration { values },
            }
        } else {
            EndSpec::Open
        };

        // A constant start inside a group is in group-local time: one
        // batch per parent instance, offset by that instance's start.
        // Expression starts are absolute.
        spans = Vec::new();
        match parent_instances {
            Some(parents) if start_ast.is_constant() => {
                for parent in parents {
                    build_spans(&mut spans, &start_values, &end_spec, Some(parent.start.0));
                }
            }
            _ => build_spans(&mut spans, &start_values, &end_spec, None),
        }
    }

    if let Some(period) = repeating {
        spans = repeat_spans(spans, period, options);
    }
    if let Some(parents) = parent_instances {
        if !skip_parent_cap {
            spans = algebra::cap_instances(&spans, parents);
        }
    }
    for instance in &mut spans {
        instance.references.extend(log.references.iter().cloned());
    }
    Ok(Some(spans))
}

/// Build spans from start/end value lists. `offset` is the group-local
/// frame origin for constant triggers.
fn build_spans(
    out: &mut Vec<Instance>,
    start_values: &[Option<i64>],
    end_spec: &EndSpec,
    offset: Option<i64>,
) {
    let origin = offset.unwrap_or(0);
    for (index, start_value) in start_values.iter().enumerate() {
        let Some(start) = *start_value else { continue };
        let start = start + origin;
        let end: Option<i64> = match end_spec {
            EndSpec::Open => None,
            EndSpec::End { values, constant } => {
                pick_value(values, index).map(|end| if *constant { end + origin } else { end })
            }
            EndSpec::Duration { values } => pick_value(values, index).map(|d| start + d),
        };
        // Zero/negative-length normalization: never end before start.
        let end = end.map(|end| end.max(start));
        out.push(Instance::new("", Time(start), end.map(Time)));
    }
}

/// Broadcast a single value, otherwise pair by index.
fn pick_value(values: &[Option<i64>], index: usize) -> Option<i64> {
    if values.len() == 1 {
        values[0]
    } else {
        values.get(index).copied().flatten()
    }
}

/// Expand a repeat period into successive occurrences, bounded by the
/// count and time limits. An occurrence never overlaps the next one; its
/// original end is preserved.
fn repeat_spans(spans: Vec<Instance>, period: i64, options: &ResolveOptions) -> Vec<Instance> {
    let limit_count = options.limit_count.unwrap_or(DEFAULT_LIMIT_COUNT);
    let limit_time = options
        .limit_time
        .unwrap_or(options.time + DEFAULT_LIMIT_TIME_WINDOW);

    let mut result = Vec::new();
    for span in spans {
        for k in 0..limit_count as i64 {
            let start = span.start + k * period;
            if start >= limit_time {
                break;
            }
            let end = span.end.map(|e| e + k * period);
            let next_start = span.start + (k + 1) * period;
            let has_next = (k + 1) < limit_count as i64 && next_start < limit_time;
            let capped_end = if has_next {
                Some(match end {
                    Some(end) => end.min(next_start),
                    None => next_start,
                })
            } else {
                end
            };
            result.push(Instance {
                id: String::new(),
                start,
                end: capped_end,
                original_start: start,
                original_end: end,
                references: span.references.clone(),
            });
        }
    }
    result
}

fn build_statistics(
    arena: &Arena,
    statuses: &HashMap<String, ObjStatus>,
    fresh: &HashSet<String>,
) -> ResolveStatistics {
    let mut stats = ResolveStatistics {
        total_count: arena.order.len() as u32,
        ..ResolveStatistics::default()
    };
    for id in &arena.order {
        let entry = &arena.objects[id];
        let is_keyframe = entry.resolved.is_keyframe;
        if fresh.contains(id) {
            stats.resolving_count += 1;
            if !is_keyframe {
                stats.resolving_object_count += 1;
            }
        }
        if statuses[id] == ObjStatus::Resolved {
            if is_keyframe {
                stats.resolved_keyframe_count += 1;
            } else if entry.object.is_group() {
                stats.resolved_group_count += 1;
            } else {
                stats.resolved_object_count += 1;
            }
        } else {
            stats.unresolved_count += 1;
        }
    }
    stats
}

/// Cap keyframe instances to their parent's final (post-occupancy)
/// instances: a keyframe never outlives what its parent actually shows.
fn cap_keyframes(arena: &mut Arena, idgen: &mut InstanceIdGen) {
    let order = arena.order.clone();
    for id in &order {
        let entry = &arena.objects[id];
        if !entry.resolved.is_keyframe || !entry.resolved.resolved_references {
            continue;
        }
        let Some(parent_id) = entry.resolved.parent_id.clone() else {
            continue;
        };
        let parent_instances = arena
            .objects
            .get(&parent_id)
            .map(|parent| parent.resolved.instances.clone())
            .unwrap_or_default();
        let raw = entry.resolved.instances.clone();
        let mut capped = algebra::cap_instances(&raw, &parent_instances);
        finalize_ids(&mut capped, id, idgen);
        arena.objects.get_mut(id).expect("id in arena").resolved.instances = capped;
    }
}

/// Ensure every instance has a unique id: the first piece of a split
/// instance keeps the original id, later pieces draw fresh ones.
pub(crate) fn finalize_ids(
    instances: &mut [Instance],
    obj_id: &str,
    idgen: &mut InstanceIdGen,
) {
    let mut seen: HashSet<String> = HashSet::new();
    for instance in instances.iter_mut() {
        if instance.id.is_empty() || !seen.insert(instance.id.clone()) {
            instance.id = idgen.next(obj_id);
            seen.insert(instance.id.clone());
        }
    }
}

/// Sorted, de-duplicated boundary events: START/END per instance of
/// layer-bearing objects, KEYFRAME per keyframe instance boundary.
fn build_events(arena: &Arena) -> Vec<NextEvent> {
    let mut events = Vec::new();
    for (id, entry) in &arena.objects {
        if !entry.resolved.resolved_references {
            continue;
        }
        if entry.resolved.is_keyframe {
            for instance in &entry.resolved.instances {
                if instance.is_zero_length() {
                    continue;
                }
                events.push(NextEvent::new(EventKind::KeyFrame, instance.start, id.clone()));
                if let Some(end) = instance.end {
                    events.push(NextEvent::new(EventKind::KeyFrame, end, id.clone()));
                }
            }
        } else if entry.object.has_layer() {
            for instance in &entry.resolved.instances {
                if instance.is_zero_length() {
                    continue;
                }
                events.push(NextEvent::new(EventKind::Start, instance.start, id.clone()));
                if let Some(end) = instance.end {
                    events.push(NextEvent::new(EventKind::End, end, id.clone()));
                }
            }
        }
    }
    events.sort();
    events.dedup();
    events
}
