//! Input validation
//!
//! Rejects malformed timelines before they reach the resolver: duplicate
//! ids, reserved characters in id/class/layer strings, and impossible
//! enable shapes. Bypassed with `skip_validation`, in which case
//! malformed input gets best-effort behavior, never silent corruption.

use std::collections::HashSet;

use cueflow_core::{Enable, TimelineObject};

use crate::error::ValidationError;

/// Characters with meaning in expressions; forbidden in ids, class names
/// and layer names.
pub const RESERVED_CHARS: [char; 14] = [
    '#', '$', '.', '-', '+', '/', '*', '%', '&', '|', '!', '(', ')', ' ',
];

/// Validate a whole timeline, children and keyframes included.
pub fn validate_timeline(timeline: &[TimelineObject]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for obj in timeline {
        validate_object(obj, &mut seen)?;
    }
    Ok(())
}

fn validate_object(
    obj: &TimelineObject,
    seen: &mut HashSet<String>,
) -> Result<(), ValidationError> {
    validate_name("object id", &obj.id)?;
    if !seen.insert(obj.id.clone()) {
        return Err(ValidationError::DuplicateId(obj.id.clone()));
    }
    if !obj.layer.is_empty() {
        validate_name("layer", &obj.layer)?;
    }
    for class in &obj.classes {
        validate_name("class", class)?;
    }
    for enable in &obj.enable {
        validate_enable(&obj.id, enable)?;
    }

    for keyframe in &obj.keyframes {
        validate_name("keyframe id", &keyframe.id)?;
        if !seen.insert(keyframe.id.clone()) {
            return Err(ValidationError::DuplicateId(keyframe.id.clone()));
        }
        for class in &keyframe.classes {
            validate_name("class", class)?;
        }
        for enable in &keyframe.enable {
            validate_enable(&keyframe.id, enable)?;
        }
    }

    if let Some(children) = &obj.children {
        for child in children {
            validate_object(child, seen)?;
        }
    }
    Ok(())
}

fn validate_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyName { field });
    }
    if let Some(found) = value.chars().find(|c| RESERVED_CHARS.contains(c)) {
        return Err(ValidationError::ReservedCharacter {
            field,
            value: value.to_string(),
            found,
        });
    }
    Ok(())
}

fn validate_enable(id: &str, enable: &Enable) -> Result<(), ValidationError> {
    if enable.while_active.is_some() && (enable.end.is_some() || enable.duration.is_some()) {
        return Err(ValidationError::WhileWithBounds { id: id.to_string() });
    }
    if enable.end.is_some() && enable.duration.is_some() {
        return Err(ValidationError::EndAndDuration { id: id.to_string() });
    }
    if (enable.end.is_some() || enable.duration.is_some()) && enable.start.is_none() {
        return Err(ValidationError::MissingStart { id: id.to_string() });
    }
    if enable.start.is_none() && enable.while_active.is_none() {
        return Err(ValidationError::EmptyEnable { id: id.to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use cueflow_core::Keyframe;

    use super::*;

    #[test]
    fn test_accepts_well_formed_timeline() {
        let objects = vec![
            TimelineObject::new("video")
                .with_layer("l0")
                .with_class("media")
                .with_enable(Enable::starting(0).with_end(100)),
            TimelineObject::new("logo")
                .with_layer("l1")
                .with_enable(Enable::active_while("#video")),
        ];
        assert!(validate_timeline(&objects).is_ok());
    }

    #[test]
    fn test_rejects_duplicate_ids_across_nesting() {
        let objects = vec![
            TimelineObject::new("a").with_enable(Enable::starting(0)),
            TimelineObject::new("group")
                .with_enable(Enable::starting(0))
                .with_children(vec![TimelineObject::new("a").with_enable(Enable::starting(0))]),
        ];
        assert_eq!(
            validate_timeline(&objects),
            Err(ValidationError::DuplicateId("a".to_string()))
        );
    }

    #[test]
    fn test_rejects_reserved_characters() {
        for bad in ["with space", "a+b", "#tag", "semi.colon", "pipe|d"] {
            let objects = vec![TimelineObject::new(bad).with_enable(Enable::starting(0))];
            assert!(matches!(
                validate_timeline(&objects),
                Err(ValidationError::ReservedCharacter { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_bad_enable_shapes() {
        let whiled = TimelineObject::new("w")
            .with_enable(Enable::active_while("#a").with_end(10));
        assert!(matches!(
            validate_timeline(&[whiled]),
            Err(ValidationError::WhileWithBounds { .. })
        ));

        let endless = TimelineObject::new("e").with_enable(Enable {
            end: Some(10.into()),
            ..Enable::default()
        });
        assert!(matches!(
            validate_timeline(&[endless]),
            Err(ValidationError::MissingStart { .. })
        ));

        let both = TimelineObject::new("b")
            .with_enable(Enable::starting(0).with_end(10).with_duration(10));
        assert!(matches!(
            validate_timeline(&[both]),
            Err(ValidationError::EndAndDuration { .. })
        ));

        let empty = TimelineObject::new("n").with_enable(Enable::default());
        assert!(matches!(
            validate_timeline(&[empty]),
            Err(ValidationError::EmptyEnable { .. })
        ));
    }

    #[test]
    fn test_validates_keyframes() {
        let objects = vec![TimelineObject::new("video")
            .with_enable(Enable::starting(0))
            .with_keyframe(Keyframe::new("bad id").with_enable(Enable::starting(1)))];
        assert!(matches!(
            validate_timeline(&objects),
            Err(ValidationError::ReservedCharacter { .. })
        ));
    }
}
