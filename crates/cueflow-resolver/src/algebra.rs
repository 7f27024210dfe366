//! Instance algebra
//!
//! Interval primitives over [`Instance`] sets: intersection, union,
//! complement, parent capping, seamless merging and instance identity.
//! Open ends (`None`) are treated as +∞ throughout. The complement
//! domain starts at time zero; a constant-true trigger is `[0, ∞)`.

use std::collections::{BTreeSet, HashMap};

use cueflow_core::{Instance, Reference, Time};

/// Allocates stable instance ids following the `@objId_n` convention,
/// one counter per object. Counters can be seeded so cache-restored
/// objects keep allocating past their existing instances.
#[derive(Debug, Default)]
pub struct InstanceIdGen {
    counters: HashMap<String, u32>,
}

impl InstanceIdGen {
    pub fn new() -> Self {
        InstanceIdGen::default()
    }

    /// Next id for an object.
    pub fn next(&mut self, obj_id: &str) -> String {
        let counter = self.counters.entry(obj_id.to_string()).or_insert(0);
        let id = format!("@{}_{}", obj_id, counter);
        *counter += 1;
        id
    }

    /// Ensure the counter for an object is at least `count`.
    pub fn seed(&mut self, obj_id: &str, count: u32) {
        let counter = self.counters.entry(obj_id.to_string()).or_insert(0);
        *counter = (*counter).max(count);
    }
}

/// The earlier of two ends, `None` meaning +∞.
#[inline]
pub fn end_min(a: Option<Time>, b: Option<Time>) -> Option<Time> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// The later of two ends, `None` meaning +∞.
#[inline]
pub fn end_max(a: Option<Time>, b: Option<Time>) -> Option<Time> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _ => None,
    }
}

fn joined_references(a: &Instance, b: &Instance) -> BTreeSet<Reference> {
    a.references.union(&b.references).cloned().collect()
}

/// Overlapping interval of two instances, `None` when disjoint or merely
/// touching. The result is a fresh interval: its original bounds are its
/// bounds.
pub fn intersect(a: &Instance, b: &Instance) -> Option<Instance> {
    let start = a.start.max(b.start);
    let end = end_min(a.end, b.end);
    if let Some(end) = end {
        if end <= start {
            return None;
        }
    }
    Some(Instance {
        id: String::new(),
        start,
        end,
        original_start: start,
        original_end: end,
        references: joined_references(a, b),
    })
}

/// Merge two instances into one if they overlap or touch, else `None`.
/// The merged instance keeps the earlier instance's `original_start`.
pub fn join(a: &Instance, b: &Instance) -> Option<Instance> {
    if !a.touches(b) {
        return None;
    }
    let (first, second) = if a.start <= b.start { (a, b) } else { (b, a) };
    let end = end_max(first.end, second.end);
    let original_end = match (first.end, second.end) {
        (None, _) => first.original_end,
        (_, None) => second.original_end,
        (Some(fe), Some(se)) => {
            if fe >= se {
                first.original_end
            } else {
                second.original_end
            }
        }
    };
    Some(Instance {
        id: first.id.clone(),
        start: first.start,
        end,
        original_start: first.original_start,
        original_end,
        references: joined_references(a, b),
    })
}

/// Union of an instance set: overlapping or touching instances are merged,
/// the rest kept apart. Also used for the `seamless` merge of an object's
/// own sibling instances. Result is sorted by start.
pub fn union_all(mut instances: Vec<Instance>) -> Vec<Instance> {
    instances.sort_by_key(|i| (i.start, i.end.unwrap_or(Time::MAX)));
    let mut merged: Vec<Instance> = Vec::with_capacity(instances.len());
    for instance in instances {
        match merged.last_mut() {
            Some(last) => match join(last, &instance) {
                Some(joined) => *last = joined,
                None => merged.push(instance),
            },
            None => merged.push(instance),
        }
    }
    merged
}

/// All-pairs intersection of two instance sets.
pub fn intersect_all(a: &[Instance], b: &[Instance]) -> Vec<Instance> {
    let mut result = Vec::new();
    for left in a {
        for right in b {
            if let Some(instance) = intersect(left, right) {
                result.push(instance);
            }
        }
    }
    result.sort_by_key(|i| (i.start, i.end.unwrap_or(Time::MAX)));
    result
}

/// Complement of an instance set over the `[0, ∞)` domain. Zero-length
/// instances cover no time and are ignored.
pub fn invert(instances: &[Instance]) -> Vec<Instance> {
    let references: BTreeSet<Reference> = instances
        .iter()
        .flat_map(|i| i.references.iter().cloned())
        .collect();
    let covering: Vec<Instance> = instances
        .iter()
        .filter(|i| !i.is_zero_length())
        .cloned()
        .collect();
    let covering = union_all(covering);

    let mut gaps = Vec::new();
    let mut cursor = Time::ZERO;
    for instance in &covering {
        if instance.start > cursor {
            gaps.push(
                Instance::new("", cursor, Some(instance.start))
                    .with_references(references.clone()),
            );
        }
        match instance.end {
            Some(end) => cursor = cursor.max(end),
            None => return gaps,
        }
    }
    gaps.push(Instance::new("", cursor, None).with_references(references));
    gaps
}

/// Shift every instance of a set by a millisecond delta.
pub fn shift(instances: &[Instance], delta: i64) -> Vec<Instance> {
    instances
        .iter()
        .map(|i| Instance {
            id: i.id.clone(),
            start: i.start + delta,
            end: i.end.map(|e| e + delta),
            original_start: i.original_start + delta,
            original_end: i.original_end.map(|e| e + delta),
            references: i.references.clone(),
        })
        .collect()
}

/// Clip a child span against a parent span, touching ends included.
///
/// A child that ran into the parent's start edge adopts the parent's
/// window: a child `[0,500]` against parents `[0,1]` and `[500,501]`
/// yields `[0,1]` and `[500,501]`. A genuine zero-length child inside the
/// parent stays zero-length.
pub fn cap_span(
    child: (Time, Option<Time>),
    parent: (Time, Option<Time>),
) -> Option<(Time, Option<Time>)> {
    let (child_start, child_end) = child;
    let (parent_start, parent_end) = parent;

    if let Some(parent_end) = parent_end {
        if child_start > parent_end {
            return None;
        }
        // A child merely starting where the parent ends shares no time
        // with it, unless the child is a zero-length point there.
        if child_start == parent_end && child_end != Some(child_start) {
            return None;
        }
    }
    if let Some(child_end) = child_end {
        if child_end < parent_start {
            return None;
        }
    }

    let start = child_start.max(parent_start);
    let end = match child_end {
        None => parent_end,
        Some(child_end) => {
            if child_end > start {
                end_min(Some(child_end), parent_end)
            } else if child_start < start {
                parent_end
            } else {
                Some(child_end)
            }
        }
    };
    Some((start, end))
}

/// Cap child instances to a set of parent instances: one capped instance
/// per overlapping (child, parent) pair; children not overlapping any
/// parent are dropped. Original bounds of the child are preserved.
pub fn cap_instances(children: &[Instance], parents: &[Instance]) -> Vec<Instance> {
    let mut capped = Vec::new();
    for child in children {
        for parent in parents {
            if let Some((start, end)) = cap_span((child.start, child.end), (parent.start, parent.end))
            {
                capped.push(Instance {
                    id: child.id.clone(),
                    start,
                    end,
                    original_start: child.original_start,
                    original_end: child.original_end,
                    references: joined_references(child, parent),
                });
            }
        }
    }
    capped.sort_by_key(|i| (i.start, i.end.unwrap_or(Time::MAX)));
    capped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(start: i64, end: Option<i64>) -> Instance {
        Instance::new("", Time(start), end.map(Time))
    }

    fn bounds(instances: &[Instance]) -> Vec<(i64, Option<i64>)> {
        instances
            .iter()
            .map(|i| (i.start.0, i.end.map(|e| e.0)))
            .collect()
    }

    #[test]
    fn test_intersect_requires_overlap() {
        assert_eq!(
            bounds(&[intersect(&inst(0, Some(10)), &inst(5, Some(20))).unwrap()]),
            vec![(5, Some(10))]
        );
        // touching is not overlapping
        assert!(intersect(&inst(0, Some(10)), &inst(10, Some(20))).is_none());
        assert!(intersect(&inst(0, Some(10)), &inst(20, Some(30))).is_none());
        // open ends are +infinity
        assert_eq!(
            bounds(&[intersect(&inst(0, None), &inst(5, None)).unwrap()]),
            vec![(5, None)]
        );
    }

    #[test]
    fn test_join_merges_touching() {
        let joined = join(&inst(10, Some(20)), &inst(20, Some(30))).unwrap();
        assert_eq!((joined.start.0, joined.end.map(|e| e.0)), (10, Some(30)));
        assert_eq!(joined.original_start.0, 10);

        assert!(join(&inst(10, Some(20)), &inst(21, Some(30))).is_none());
    }

    #[test]
    fn test_union_all_seamless_scenario() {
        // [[10,20],[20,30],[40,50],[50,50],[50,51],[60,60],[60,inf)]
        let input = vec![
            inst(10, Some(20)),
            inst(20, Some(30)),
            inst(40, Some(50)),
            inst(50, Some(50)),
            inst(50, Some(51)),
            inst(60, Some(60)),
            inst(60, None),
        ];
        let merged = union_all(input);
        assert_eq!(
            bounds(&merged),
            vec![(10, Some(30)), (40, Some(51)), (60, None)]
        );
    }

    #[test]
    fn test_invert_covers_gaps_from_zero() {
        let inverted = invert(&[inst(10, Some(20)), inst(30, Some(40))]);
        assert_eq!(
            bounds(&inverted),
            vec![(0, Some(10)), (20, Some(30)), (40, None)]
        );
    }

    #[test]
    fn test_invert_open_end_swallows_tail() {
        let inverted = invert(&[inst(10, None)]);
        assert_eq!(bounds(&inverted), vec![(0, Some(10))]);

        // covering from zero leaves nothing before, complement of nothing
        // is the whole domain
        assert_eq!(bounds(&invert(&[inst(0, None)])), Vec::<(i64, Option<i64>)>::new());
        assert_eq!(bounds(&invert(&[])), vec![(0, None)]);
    }

    #[test]
    fn test_invert_ignores_zero_length() {
        let inverted = invert(&[inst(10, Some(10))]);
        assert_eq!(bounds(&inverted), vec![(0, None)]);
    }

    #[test]
    fn test_cap_span_adopts_touching_parent_window() {
        // child [0,500] against parents [0,1] and [500,501]
        let child = (Time(0), Some(Time(500)));
        assert_eq!(
            cap_span(child, (Time(0), Some(Time(1)))),
            Some((Time(0), Some(Time(1))))
        );
        assert_eq!(
            cap_span(child, (Time(500), Some(Time(501)))),
            Some((Time(500), Some(Time(501))))
        );
        // disjoint parent is dropped
        assert_eq!(cap_span(child, (Time(600), Some(Time(700)))), None);
    }

    #[test]
    fn test_cap_span_zero_length_child_stays_zero_length() {
        assert_eq!(
            cap_span((Time(50), Some(Time(50))), (Time(0), Some(Time(100)))),
            Some((Time(50), Some(Time(50))))
        );
        // zero-length child before the parent is dropped
        assert_eq!(
            cap_span((Time(5), Some(Time(5))), (Time(10), Some(Time(20)))),
            None
        );
        // a zero-length child sitting exactly on the parent's end survives
        assert_eq!(
            cap_span((Time(100), Some(Time(100))), (Time(0), Some(Time(100)))),
            Some((Time(100), Some(Time(100))))
        );
    }

    #[test]
    fn test_cap_span_child_starting_at_parent_end_is_dropped() {
        // starting where the parent ends shares no time with it
        assert_eq!(
            cap_span((Time(10), Some(Time(20))), (Time(0), Some(Time(10)))),
            None
        );
        // an open-ended parent has no end to collide with
        assert_eq!(
            cap_span((Time(10), Some(Time(20))), (Time(0), None)),
            Some((Time(10), Some(Time(20))))
        );
    }

    #[test]
    fn test_cap_instances_emits_one_instance_per_overlapping_parent() {
        let children = vec![inst(0, Some(500))];
        let parents = vec![inst(0, Some(1)), inst(500, Some(501))];
        let capped = cap_instances(&children, &parents);
        assert_eq!(bounds(&capped), vec![(0, Some(1)), (500, Some(501))]);
        // original bounds survive capping
        assert!(capped.iter().all(|i| i.original_start.0 == 0
            && i.original_end == Some(Time(500))));
    }

    #[test]
    fn test_id_gen_is_per_object_and_seedable() {
        let mut gen = InstanceIdGen::new();
        assert_eq!(gen.next("a"), "@a_0");
        assert_eq!(gen.next("a"), "@a_1");
        assert_eq!(gen.next("b"), "@b_0");

        gen.seed("c", 3);
        assert_eq!(gen.next("c"), "@c_3");
        // seeding never rewinds
        gen.seed("a", 1);
        assert_eq!(gen.next("a"), "@a_2");
    }
}
