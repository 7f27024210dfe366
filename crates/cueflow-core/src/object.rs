//! Timeline object definitions
//!
//! A [`TimelineObject`] declares *when* something should be active (its
//! `enable` triggers) and *where* (its `layer`). Triggers are either plain
//! millisecond numbers or expression strings that reference other objects,
//! classes or layers. Objects may nest (groups) and may carry keyframes
//! that modify their content while active.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A trigger value: a concrete millisecond number or an expression string
/// such as `"#video.start + 10"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeExpr {
    Number(i64),
    Expr(String),
}

impl From<i64> for TimeExpr {
    fn from(value: i64) -> Self {
        TimeExpr::Number(value)
    }
}

impl From<&str> for TimeExpr {
    fn from(value: &str) -> Self {
        TimeExpr::Expr(value.to_string())
    }
}

impl From<String> for TimeExpr {
    fn from(value: String) -> Self {
        TimeExpr::Expr(value)
    }
}

/// One enable entry. An object is active while any of its entries is.
///
/// Shape constraints (enforced by validation): `while` is mutually
/// exclusive with `end`/`duration`, `end`/`duration` require `start`,
/// and `end` and `duration` exclude each other.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Enable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<TimeExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeExpr>,
    /// Logical trigger: active while the expression's instance set is.
    #[serde(rename = "while", default, skip_serializing_if = "Option::is_none")]
    pub while_active: Option<TimeExpr>,
    /// Repeat period in milliseconds (or an expression evaluating to one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeating: Option<TimeExpr>,
}

impl Enable {
    /// Entry triggered at a start time.
    pub fn starting(start: impl Into<TimeExpr>) -> Self {
        Enable {
            start: Some(start.into()),
            ..Enable::default()
        }
    }

    /// Entry active while a logical expression holds.
    pub fn active_while(expr: impl Into<TimeExpr>) -> Self {
        Enable {
            while_active: Some(expr.into()),
            ..Enable::default()
        }
    }

    pub fn with_end(mut self, end: impl Into<TimeExpr>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_duration(mut self, duration: impl Into<TimeExpr>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn with_repeating(mut self, period: impl Into<TimeExpr>) -> Self {
        self.repeating = Some(period.into());
        self
    }
}

/// A keyframe: a restricted timeline object that modifies its parent's
/// content while active. Keyframes never occupy a layer of their own and
/// their triggers are resolved relative to the parent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub id: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub enable: Vec<Enable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
}

impl Keyframe {
    pub fn new(id: impl Into<String>) -> Self {
        Keyframe {
            id: id.into(),
            ..Keyframe::default()
        }
    }

    pub fn with_enable(mut self, enable: Enable) -> Self {
        self.enable.push(enable);
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }
}

/// A declarative timeline object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineObject {
    /// Unique id across the whole timeline, children and keyframes included.
    pub id: String,
    /// One or an ordered sequence of enable entries.
    #[serde(default, deserialize_with = "one_or_many")]
    pub enable: Vec<Enable>,
    /// Output layer. The empty string means "transparent": the object
    /// resolves but never occupies a layer.
    #[serde(default)]
    pub layer: String,
    /// Higher priority wins layer occupancy. Defaults to 0.
    #[serde(default)]
    pub priority: i64,
    /// Class tags, referenced from expressions as `.className`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    /// Disabled objects resolve to zero instances.
    #[serde(default)]
    pub disabled: bool,
    /// Merge touching sibling instances into one continuous instance.
    #[serde(default)]
    pub seamless: bool,
    /// Child objects; present only for groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TimelineObject>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyframes: Vec<Keyframe>,
    /// Opaque payload, untouched by resolution except for keyframe merge.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
}

impl TimelineObject {
    pub fn new(id: impl Into<String>) -> Self {
        TimelineObject {
            id: id.into(),
            ..TimelineObject::default()
        }
    }

    pub fn with_enable(mut self, enable: Enable) -> Self {
        self.enable.push(enable);
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = layer.into();
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_children(mut self, children: Vec<TimelineObject>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_keyframe(mut self, keyframe: Keyframe) -> Self {
        self.keyframes.push(keyframe);
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    pub fn seamless(mut self) -> Self {
        self.seamless = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Is this object a group (has children)?
    #[inline]
    pub fn is_group(&self) -> bool {
        self.children.is_some()
    }

    /// Does this object occupy a layer?
    #[inline]
    pub fn has_layer(&self) -> bool {
        !self.layer.is_empty()
    }
}

/// Accept either a single enable entry or a sequence of them.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Enable>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Enable),
        Many(Vec<Enable>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(enable) => vec![enable],
        OneOrMany::Many(enables) => enables,
    })
}
