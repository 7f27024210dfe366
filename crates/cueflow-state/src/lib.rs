//! Cueflow State - Point-in-time state extraction
//!
//! Given a resolved timeline and a query instant, answers "what should be
//! showing right now, and when does that change next": the single active
//! object per layer (content with keyframes merged in) and the strictly
//! future portion of the global event list.

pub mod error;
pub mod merge;

pub use error::{StateError, StateResult};
pub use merge::deep_merge;

use std::collections::BTreeMap;

use serde_json::Value;

use cueflow_core::{
    ResolvedTimeline, ResolvedTimelineObject, StateObjectInstance, Time, TimelineState,
};

/// Extract the state of a resolved timeline at one instant.
///
/// At most one object may be active per layer; finding two is a fatal
/// internal-consistency error. `event_limit` optionally truncates the
/// future-event list.
pub fn get_state(
    timeline: &ResolvedTimeline,
    time: Time,
    event_limit: Option<usize>,
) -> StateResult<TimelineState> {
    let mut layers: BTreeMap<String, StateObjectInstance> = BTreeMap::new();

    for (id, entry) in &timeline.objects {
        if entry.resolved.is_keyframe
            || !entry.object.has_layer()
            || !entry.resolved.resolved_references
        {
            continue;
        }
        // `instance_at` uses `start <= t < end`, so zero-length instances
        // are never found here.
        let Some(instance) = entry.instance_at(time) else {
            continue;
        };
        let layer = entry.object.layer.clone();
        if let Some(existing) = layers.get(&layer) {
            return Err(StateError::DuplicateLayerOccupancy {
                layer,
                first: existing.object.object.id.clone(),
                second: id.clone(),
                time,
            });
        }

        let mut object = entry.clone();
        object.object.content = content_with_keyframes(timeline, entry, time);
        layers.insert(
            layer,
            StateObjectInstance {
                object,
                instance: instance.clone(),
            },
        );
    }

    let future = timeline
        .next_events
        .iter()
        .filter(|event| event.time > time)
        .cloned();
    let next_events = match event_limit {
        Some(limit) => future.take(limit).collect(),
        None => future.collect(),
    };

    Ok(TimelineState {
        time,
        layers,
        next_events,
    })
}

/// The object's content with every keyframe active at `time` merged in,
/// sorted so higher-priority and later-starting keyframes apply last and
/// win on conflicting paths. The base content is cloned before the first
/// write.
fn content_with_keyframes(
    timeline: &ResolvedTimeline,
    entry: &ResolvedTimelineObject,
    time: Time,
) -> Value {
    let mut active: Vec<(&ResolvedTimelineObject, Time)> = timeline
        .objects
        .values()
        .filter(|kf| {
            kf.resolved.is_keyframe
                && kf.resolved.parent_id.as_deref() == Some(entry.object.id.as_str())
        })
        .filter_map(|kf| kf.instance_at(time).map(|instance| (kf, instance.start)))
        .collect();

    let mut content = entry.object.content.clone();
    if active.is_empty() {
        return content;
    }
    active.sort_by_key(|(kf, start)| (kf.object.priority, *start));
    for (keyframe, _) in active {
        merge::deep_merge(&mut content, &keyframe.object.content);
    }
    content
}

#[cfg(test)]
mod tests {
    use cueflow_core::{Enable, Instance, Keyframe, TimelineObject, TimelineResolveInfo};
    use cueflow_resolver::{resolve, ResolveOptions};
    use serde_json::json;

    use super::*;

    fn resolved(timeline: &[TimelineObject]) -> ResolvedTimeline {
        resolve(timeline, &ResolveOptions::new(0), None).unwrap()
    }

    #[test]
    fn test_layer_occupancy_at_time() {
        let timeline = resolved(&[
            TimelineObject::new("video")
                .with_layer("screen")
                .with_enable(Enable::starting(0).with_end(100)),
            TimelineObject::new("next_video")
                .with_layer("screen")
                .with_enable(Enable::starting(100).with_end(200)),
        ]);

        let state = get_state(&timeline, Time(50), None).unwrap();
        assert_eq!(state.layer("screen").unwrap().object.object.id, "video");

        let state = get_state(&timeline, Time(100), None).unwrap();
        assert_eq!(
            state.layer("screen").unwrap().object.object.id,
            "next_video"
        );

        let state = get_state(&timeline, Time(250), None).unwrap();
        assert!(state.layer("screen").is_none());
    }

    #[test]
    fn test_zero_length_instance_is_never_showing() {
        let timeline = resolved(&[TimelineObject::new("blip")
            .with_layer("l0")
            .with_enable(Enable::starting(15).with_end(10))]);

        // the object resolves to [15,15] but is never active
        assert_eq!(timeline.instances_of("blip")[0].start, Time(15));
        assert!(get_state(&timeline, Time(14), None).unwrap().layers.is_empty());
        assert!(get_state(&timeline, Time(15), None).unwrap().layers.is_empty());
    }

    #[test]
    fn test_keyframe_content_deep_merge() {
        let timeline = resolved(&[TimelineObject::new("graphic")
            .with_layer("l0")
            .with_enable(Enable::starting(0).with_end(100))
            .with_content(json!({"prop1": {"prop2": "b", "arr0": [1]}}))
            .with_keyframe(
                Keyframe::new("kf0")
                    .with_enable(Enable::starting(10).with_duration(20))
                    .with_content(json!({"prop1": {"prop3": "kf0", "arr0": [2]}})),
            )]);

        // before the keyframe: base content untouched
        let state = get_state(&timeline, Time(5), None).unwrap();
        assert_eq!(
            state.layer("l0").unwrap().object.object.content,
            json!({"prop1": {"prop2": "b", "arr0": [1]}})
        );

        // during the keyframe: merged content
        let state = get_state(&timeline, Time(15), None).unwrap();
        assert_eq!(
            state.layer("l0").unwrap().object.object.content,
            json!({"prop1": {"prop2": "b", "prop3": "kf0", "arr0": [2]}})
        );

        // after the keyframe: back to base content
        let state = get_state(&timeline, Time(40), None).unwrap();
        assert_eq!(
            state.layer("l0").unwrap().object.object.content,
            json!({"prop1": {"prop2": "b", "arr0": [1]}})
        );
    }

    #[test]
    fn test_later_keyframes_win_conflicting_paths() {
        let timeline = resolved(&[TimelineObject::new("graphic")
            .with_layer("l0")
            .with_enable(Enable::starting(0))
            .with_content(json!({"opacity": 0}))
            .with_keyframe(
                Keyframe::new("fade_a")
                    .with_enable(Enable::starting(10))
                    .with_content(json!({"opacity": 50})),
            )
            .with_keyframe(
                Keyframe::new("fade_b")
                    .with_enable(Enable::starting(20))
                    .with_content(json!({"opacity": 100})),
            )]);

        let state = get_state(&timeline, Time(30), None).unwrap();
        // fade_b starts later, applies last
        assert_eq!(
            state.layer("l0").unwrap().object.object.content,
            json!({"opacity": 100})
        );
    }

    #[test]
    fn test_next_events_are_strictly_future_and_limited() {
        let timeline = resolved(&[
            TimelineObject::new("a")
                .with_layer("l0")
                .with_enable(Enable::starting(0).with_end(100)),
            TimelineObject::new("b")
                .with_layer("l1")
                .with_enable(Enable::starting(100).with_end(200)),
        ]);

        let state = get_state(&timeline, Time(0), None).unwrap();
        // the event at exactly t=0 is not "next"
        assert!(state.next_events.iter().all(|e| e.time > Time(0)));
        assert_eq!(state.next_events.len(), 3);

        let limited = get_state(&timeline, Time(0), Some(2)).unwrap();
        assert_eq!(limited.next_events.len(), 2);
        assert_eq!(limited.next_events[0].time, Time(100));
    }

    #[test]
    fn test_transparent_objects_produce_no_layer_state() {
        let timeline = resolved(&[TimelineObject::new("logic")
            .with_enable(Enable::starting(0))]);

        let state = get_state(&timeline, Time(10), None).unwrap();
        assert!(state.layers.is_empty());
    }

    #[test]
    fn test_duplicate_occupancy_is_fatal() {
        // Hand-build a corrupt resolved timeline: two objects active on
        // one layer at once. get_state must refuse, not pick one.
        let mut timeline = ResolvedTimeline::default();
        for id in ["a", "b"] {
            timeline.objects.insert(
                id.to_string(),
                ResolvedTimelineObject {
                    object: TimelineObject::new(id).with_layer("l0"),
                    resolved: TimelineResolveInfo {
                        instances: vec![Instance::new(
                            format!("@{id}_0"),
                            Time(0),
                            None,
                        )],
                        resolved_references: true,
                        ..TimelineResolveInfo::default()
                    },
                },
            );
        }

        let err = get_state(&timeline, Time(10), None).unwrap_err();
        assert!(matches!(err, StateError::DuplicateLayerOccupancy { .. }));
    }
}
