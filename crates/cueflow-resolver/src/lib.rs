//! Cueflow Resolver - Timeline resolution engine
//!
//! Turns a declarative set of timeline objects into a [`ResolvedTimeline`]:
//! concrete per-object instances, a single occupant per layer at any
//! instant, global boundary events and resolution statistics.
//!
//! The engine is fully synchronous and side-effect-free: a call either
//! returns a complete result or fails. Boundedness for repeating
//! constructs is guaranteed structurally via `limit_count`/`limit_time`.
//! The only shared mutable state is the caller-owned [`ResolverCache`],
//! which enables incremental re-resolution across repeated calls.
//!
//! ```
//! use cueflow_core::{Enable, TimelineObject};
//! use cueflow_resolver::{resolve, ResolveOptions};
//!
//! let timeline = vec![
//!     TimelineObject::new("video")
//!         .with_layer("screen")
//!         .with_enable(Enable::starting(0).with_end(100)),
//!     TimelineObject::new("bug")
//!         .with_layer("overlay")
//!         .with_enable(Enable::starting("#video.start + 10").with_duration(10)),
//! ];
//! let resolved = resolve(&timeline, &ResolveOptions::new(0), None).unwrap();
//! assert_eq!(resolved.instances_of("bug")[0].start.as_millis(), 10);
//! ```

pub mod algebra;
pub mod cache;
pub mod error;
pub mod validate;

mod lookup;
mod occupancy;
mod resolve;

pub use cache::ResolverCache;
pub use error::{ResolveError, ResolveResult, ValidationError};

use cueflow_core::{ResolvedTimeline, Time, TimelineObject};

/// Fallback bound on repeat occurrences when `limit_count` is omitted.
pub const DEFAULT_LIMIT_COUNT: usize = 10;

/// Fallback repeat expansion window past `time` (milliseconds) when
/// `limit_time` is omitted.
pub const DEFAULT_LIMIT_TIME_WINDOW: i64 = 600_000;

/// Options for one resolve call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveOptions {
    /// The reference instant the timeline is resolved around; anchors the
    /// fallback repeat expansion window.
    pub time: Time,
    /// Max occurrences per repeating object. Falls back to
    /// [`DEFAULT_LIMIT_COUNT`].
    pub limit_count: Option<usize>,
    /// Absolute time bound for repeat expansion. Falls back to
    /// `time + DEFAULT_LIMIT_TIME_WINDOW`.
    pub limit_time: Option<Time>,
    /// Bypass input validation. Malformed input then gets best-effort
    /// behavior or an engine error, never silent corruption.
    pub skip_validation: bool,
    /// Leave all statistics counters at zero.
    pub skip_statistics: bool,
    /// Record recoverable resolution errors on the result instead of
    /// returning `Err`. Syntax, validation and internal errors stay
    /// fatal.
    pub dont_throw_on_error: bool,
}

impl ResolveOptions {
    pub fn new(time: impl Into<Time>) -> Self {
        ResolveOptions {
            time: time.into(),
            limit_count: None,
            limit_time: None,
            skip_validation: false,
            skip_statistics: false,
            dont_throw_on_error: false,
        }
    }

    pub fn with_limit_count(mut self, limit_count: usize) -> Self {
        self.limit_count = Some(limit_count);
        self
    }

    pub fn with_limit_time(mut self, limit_time: impl Into<Time>) -> Self {
        self.limit_time = Some(limit_time.into());
        self
    }

    pub fn skip_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }

    pub fn skip_statistics(mut self) -> Self {
        self.skip_statistics = true;
        self
    }

    pub fn dont_throw_on_error(mut self) -> Self {
        self.dont_throw_on_error = true;
        self
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions::new(Time::ZERO)
    }
}

/// Resolve a timeline into concrete instances.
///
/// With a `cache` from a previous call, only objects whose
/// timing-relevant fields changed (and whatever depends on them,
/// transitively) are re-resolved; the rest reuse their previous result.
/// Output is identical either way.
pub fn resolve(
    timeline: &[TimelineObject],
    options: &ResolveOptions,
    cache: Option<&mut ResolverCache>,
) -> ResolveResult<ResolvedTimeline> {
    resolve::resolve_timeline(timeline, options, cache)
}
