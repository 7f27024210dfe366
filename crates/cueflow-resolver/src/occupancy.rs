//! Priority-based layer occupancy
//!
//! After all raw instances are known, a sweep-line pass per layer turns
//! the competing instances into a single non-overlapping occupancy
//! sequence. The occupant at any point is the active instance with the
//! highest priority, ties broken by latest start, then by earliest input
//! order. Losing instances are truncated (original bounds preserved) and
//! resumed from those bounds when the winner ends. Zero-length instances
//! never compete; they pass through untouched.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use cueflow_core::{Instance, Time};

use crate::algebra::InstanceIdGen;
use crate::resolve::Arena;

struct Candidate {
    obj_id: String,
    order: usize,
    priority: i64,
    instance: Instance,
    pieces: u32,
}

impl Candidate {
    fn active_at(&self, time: Time) -> bool {
        self.instance.start <= time && self.instance.end.map_or(true, |end| end > time)
    }
}

/// Rewrite the instances of every layer-bearing object into its
/// occupancy-visible sequence.
pub(crate) fn resolve_layers(arena: &mut Arena, idgen: &mut InstanceIdGen) {
    let layers: Vec<(String, Vec<String>)> = arena
        .layer_members
        .iter()
        .map(|(layer, members)| (layer.clone(), members.clone()))
        .collect();

    for (layer, members) in layers {
        let mut output: HashMap<String, Vec<Instance>> = HashMap::new();
        let mut candidates: Vec<Candidate> = Vec::new();

        for member in &members {
            let entry = &arena.objects[member];
            if !entry.resolved.resolved_references {
                continue;
            }
            for instance in &entry.resolved.instances {
                if instance.is_zero_length() {
                    // Never active, never competes.
                    output
                        .entry(member.clone())
                        .or_default()
                        .push(instance.clone());
                } else {
                    candidates.push(Candidate {
                        obj_id: member.clone(),
                        order: arena.order_index[member],
                        priority: entry.object.priority,
                        instance: instance.clone(),
                        pieces: 0,
                    });
                }
            }
        }

        let points: BTreeSet<Time> = candidates
            .iter()
            .flat_map(|c| {
                std::iter::once(c.instance.start).chain(c.instance.end.into_iter())
            })
            .collect();

        let mut current: Option<usize> = None;
        let mut piece_start = Time::ZERO;
        for &time in &points {
            let best = candidates
                .iter()
                .enumerate()
                .filter(|(_, c)| c.active_at(time))
                .max_by_key(|(_, c)| (c.priority, c.instance.start, Reverse(c.order)))
                .map(|(index, _)| index);
            if best != current {
                if let Some(index) = current {
                    emit(&mut candidates[index], piece_start, Some(time), &mut output, idgen);
                }
                current = best;
                piece_start = time;
            }
        }
        if let Some(index) = current {
            let end = candidates[index].instance.end;
            emit(&mut candidates[index], piece_start, end, &mut output, idgen);
        }

        trace!(layer = %layer, candidates = candidates.len(), "layer occupancy resolved");

        for member in &members {
            let entry = arena.objects.get_mut(member).expect("member in arena");
            if !entry.resolved.resolved_references {
                continue;
            }
            let mut instances = output.remove(member).unwrap_or_default();
            instances.sort_by_key(|i| (i.start, i.end.unwrap_or(Time::MAX)));
            entry.resolved.instances = instances;
        }
    }
}

/// Emit one occupancy piece of a candidate's instance. The first piece
/// keeps the instance id, resumed pieces draw fresh ids; original bounds
/// are carried over unchanged.
fn emit(
    candidate: &mut Candidate,
    start: Time,
    end: Option<Time>,
    output: &mut HashMap<String, Vec<Instance>>,
    idgen: &mut InstanceIdGen,
) {
    if end == Some(start) {
        return;
    }
    let id = if candidate.pieces == 0 {
        candidate.instance.id.clone()
    } else {
        idgen.next(&candidate.obj_id)
    };
    candidate.pieces += 1;
    output
        .entry(candidate.obj_id.clone())
        .or_default()
        .push(Instance {
            id,
            start,
            end,
            original_start: candidate.instance.original_start,
            original_end: candidate.instance.original_end,
            references: candidate.instance.references.clone(),
        });
}

#[cfg(test)]
mod tests {
    use cueflow_core::{Enable, TimelineObject};

    use crate::resolve::resolve_timeline;
    use crate::ResolveOptions;

    fn bounds(
        timeline: &cueflow_core::ResolvedTimeline,
        id: &str,
    ) -> Vec<(i64, Option<i64>)> {
        timeline
            .instances_of(id)
            .iter()
            .map(|i| (i.start.0, i.end.map(|e| e.0)))
            .collect()
    }

    #[test]
    fn test_priority_occupancy_scenario() {
        let objects = vec![
            TimelineObject::new("default")
                .with_layer("l0")
                .with_priority(0)
                .with_enable(Enable::starting(100)),
            TimelineObject::new("high")
                .with_layer("l0")
                .with_priority(2)
                .with_enable(Enable::starting(200).with_end(500)),
            TimelineObject::new("medium")
                .with_layer("l0")
                .with_priority(1)
                .with_enable(Enable::starting(400).with_end(600)),
            TimelineObject::new("low")
                .with_layer("l0")
                .with_priority(-1)
                .with_enable(Enable::starting(500).with_end(700)),
        ];
        let timeline = resolve_timeline(&objects, &ResolveOptions::new(0), None).unwrap();

        assert_eq!(
            bounds(&timeline, "default"),
            vec![(100, Some(200)), (600, None)]
        );
        assert_eq!(bounds(&timeline, "high"), vec![(200, Some(500))]);
        assert_eq!(bounds(&timeline, "medium"), vec![(500, Some(600))]);
        assert_eq!(bounds(&timeline, "low"), Vec::<(i64, Option<i64>)>::new());

        // the truncated piece still knows its intended span
        let default_first = &timeline.instances_of("default")[0];
        assert_eq!(default_first.original_start.0, 100);
        assert_eq!(default_first.original_end, None);
    }

    #[test]
    fn test_later_start_wins_equal_priority() {
        let objects = vec![
            TimelineObject::new("first")
                .with_layer("l0")
                .with_enable(Enable::starting(0)),
            TimelineObject::new("second")
                .with_layer("l0")
                .with_enable(Enable::starting(50).with_end(80)),
        ];
        let timeline = resolve_timeline(&objects, &ResolveOptions::new(0), None).unwrap();

        assert_eq!(
            bounds(&timeline, "first"),
            vec![(0, Some(50)), (80, None)]
        );
        assert_eq!(bounds(&timeline, "second"), vec![(50, Some(80))]);
    }

    #[test]
    fn test_occupancy_tie_prefers_input_order() {
        // identical priority and identical start: the object earlier in
        // the input wins
        let objects = vec![
            TimelineObject::new("alpha")
                .with_layer("l0")
                .with_enable(Enable::starting(10).with_end(20)),
            TimelineObject::new("beta")
                .with_layer("l0")
                .with_enable(Enable::starting(10).with_end(30)),
        ];
        let timeline = resolve_timeline(&objects, &ResolveOptions::new(0), None).unwrap();

        assert_eq!(bounds(&timeline, "alpha"), vec![(10, Some(20))]);
        assert_eq!(bounds(&timeline, "beta"), vec![(20, Some(30))]);
    }

    #[test]
    fn test_fully_shadowed_object_emits_nothing() {
        let objects = vec![
            TimelineObject::new("cover")
                .with_layer("l0")
                .with_priority(1)
                .with_enable(Enable::starting(0)),
            TimelineObject::new("hidden")
                .with_layer("l0")
                .with_enable(Enable::starting(10).with_end(20)),
        ];
        let timeline = resolve_timeline(&objects, &ResolveOptions::new(0), None).unwrap();

        assert_eq!(bounds(&timeline, "cover"), vec![(0, None)]);
        assert!(timeline.instances_of("hidden").is_empty());
    }

    #[test]
    fn test_zero_length_instances_pass_through() {
        let objects = vec![
            TimelineObject::new("point")
                .with_layer("l0")
                .with_enable(Enable::starting(15).with_end(15)),
            TimelineObject::new("span")
                .with_layer("l0")
                .with_enable(Enable::starting(0).with_end(30)),
        ];
        let timeline = resolve_timeline(&objects, &ResolveOptions::new(0), None).unwrap();

        assert_eq!(bounds(&timeline, "point"), vec![(15, Some(15))]);
        assert_eq!(bounds(&timeline, "span"), vec![(0, Some(30))]);
    }

    #[test]
    fn test_objects_on_different_layers_never_interact() {
        let objects = vec![
            TimelineObject::new("a")
                .with_layer("l0")
                .with_priority(5)
                .with_enable(Enable::starting(0)),
            TimelineObject::new("b")
                .with_layer("l1")
                .with_enable(Enable::starting(0)),
        ];
        let timeline = resolve_timeline(&objects, &ResolveOptions::new(0), None).unwrap();

        assert_eq!(bounds(&timeline, "a"), vec![(0, None)]);
        assert_eq!(bounds(&timeline, "b"), vec![(0, None)]);
    }
}
