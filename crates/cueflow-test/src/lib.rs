//! Cueflow Test - Scenario helpers and integration suite
//!
//! This crate provides:
//! - Builders for realistic playout timelines
//! - Cross-crate integration tests (resolution -> state extraction)
//! - Criterion benchmarks for the resolver

pub mod scenarios;

use cueflow_core::{Enable, Keyframe, ResolvedTimeline, TimelineObject};
use serde_json::json;

/// A chain of `length` objects on alternating layers, each one starting
/// 10ms after the previous one ends.
pub fn chain_timeline(length: usize) -> Vec<TimelineObject> {
    let mut objects = vec![TimelineObject::new("clip0")
        .with_layer("l0")
        .with_enable(Enable::starting(0).with_duration(100))];
    for index in 1..length {
        objects.push(
            TimelineObject::new(format!("clip{index}"))
                .with_layer(if index % 2 == 0 { "l0" } else { "l1" })
                .with_enable(
                    Enable::starting(format!("#clip{}.end + 10", index - 1))
                        .with_duration(100),
                ),
        );
    }
    objects
}

/// A small but complete playout: a looping background, a main video with
/// a lower-third group and keyframed logo, and a preview-blocked bug.
pub fn show_timeline() -> Vec<TimelineObject> {
    vec![
        TimelineObject::new("background")
            .with_layer("bg")
            .with_priority(-1)
            .with_enable(Enable::starting(0).with_duration(2000).with_repeating(2000))
            .with_content(json!({"file": "loop.mp4"})),
        TimelineObject::new("video")
            .with_layer("pgm")
            .with_class("media")
            .with_enable(Enable::starting(1000).with_duration(10_000))
            .with_content(json!({"file": "story.mp4"})),
        TimelineObject::new("lower_third")
            .with_enable(Enable::starting("#video.start + 500").with_duration(4000))
            .with_children(vec![
                TimelineObject::new("l3_bg")
                    .with_layer("gfx0")
                    .with_enable(Enable::active_while(1))
                    .with_content(json!({"template": "l3"})),
                TimelineObject::new("l3_text")
                    .with_layer("gfx1")
                    .with_enable(Enable::starting(200))
                    .with_content(json!({"line1": "Headline", "style": {"size": 24}}))
                    .with_keyframe(
                        Keyframe::new("l3_text_hot")
                            .with_enable(Enable::starting(1000).with_duration(1000))
                            .with_content(json!({"style": {"size": 32}})),
                    ),
            ]),
        TimelineObject::new("bug")
            .with_layer("bug")
            .with_enable(Enable::active_while(".media"))
            .with_content(json!({"corner": "tr"})),
    ]
}

/// Instance bounds of an object, as `(start, end)` millisecond pairs.
pub fn instance_bounds(timeline: &ResolvedTimeline, id: &str) -> Vec<(i64, Option<i64>)> {
    timeline
        .instances_of(id)
        .iter()
        .map(|i| (i.start.as_millis(), i.end.map(|e| e.as_millis())))
        .collect()
}
