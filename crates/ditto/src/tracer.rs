//! Observability hooks for clone operations.
//!
//! The engine is generic over a [`CloneTracer`] and every callback has an
//! inlined empty default, so with [`NoopTracer`] tracing compiles away.
//! [`RecordingTracer`] captures events for assertions in tests;
//! [`StderrTracer`] prints them for interactive debugging.

use std::fmt;

use crate::heap::HeapId;

/// Which plan cache a plan was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PlanKind {
    NewDeep,
    MergeDeep,
    MergeShallow,
}

/// Observer of a clone operation's internal decisions.
///
/// Callbacks fire synchronously on the cloning thread. Implementations
/// must not touch the heap being cloned.
pub trait CloneTracer: fmt::Debug {
    /// A plan cache miss caused a plan build.
    #[inline]
    fn on_plan_built(&mut self, type_name: &str, kind: PlanKind) {
        let _ = (type_name, kind);
    }

    /// A source slot resolved through the identity map.
    #[inline]
    fn on_identity_hit(&mut self, source: HeapId) {
        let _ = source;
    }

    /// An atomic-typed slot was shared instead of cloned.
    #[inline]
    fn on_atomic_shared(&mut self, source: HeapId) {
        let _ = source;
    }

    /// A structural clone produced a new slot.
    #[inline]
    fn on_object_cloned(&mut self, source: HeapId, clone: HeapId) {
        let _ = (source, clone);
    }

    /// The pre-clone hook ran; `substituted` is whether it replaced the
    /// clone result.
    #[inline]
    fn on_pre_clone_hook(&mut self, source: HeapId, substituted: bool) {
        let _ = (source, substituted);
    }

    /// The post-clone hook ran for a source slot.
    #[inline]
    fn on_post_clone_hook(&mut self, source: HeapId) {
        let _ = source;
    }
}

/// A tracer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl CloneTracer for NoopTracer {}

/// A tracer that prints every event to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrTracer;

impl CloneTracer for StderrTracer {
    fn on_plan_built(&mut self, type_name: &str, kind: PlanKind) {
        eprintln!("[ditto] plan built: {type_name} ({kind})");
    }

    fn on_identity_hit(&mut self, source: HeapId) {
        eprintln!("[ditto] identity hit: slot {idx}", idx = source.index());
    }

    fn on_atomic_shared(&mut self, source: HeapId) {
        eprintln!("[ditto] atomic shared: slot {idx}", idx = source.index());
    }

    fn on_object_cloned(&mut self, source: HeapId, clone: HeapId) {
        eprintln!(
            "[ditto] cloned: slot {src} -> slot {dst}",
            src = source.index(),
            dst = clone.index()
        );
    }

    fn on_pre_clone_hook(&mut self, source: HeapId, substituted: bool) {
        eprintln!(
            "[ditto] pre-clone hook: slot {idx} (substituted: {substituted})",
            idx = source.index()
        );
    }

    fn on_post_clone_hook(&mut self, source: HeapId) {
        eprintln!("[ditto] post-clone hook: slot {idx}", idx = source.index());
    }
}

/// One recorded clone event, with owned data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    PlanBuilt { type_name: String, kind: PlanKind },
    IdentityHit { source: HeapId },
    AtomicShared { source: HeapId },
    ObjectCloned { source: HeapId, clone: HeapId },
    PreCloneHook { source: HeapId, substituted: bool },
    PostCloneHook { source: HeapId },
}

/// A tracer that records every event for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Drains the recorded events.
    pub fn take_events(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of plan builds recorded.
    #[must_use]
    pub fn plan_builds(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, TraceEvent::PlanBuilt { .. }))
            .count()
    }
}

impl CloneTracer for RecordingTracer {
    fn on_plan_built(&mut self, type_name: &str, kind: PlanKind) {
        self.events.push(TraceEvent::PlanBuilt {
            type_name: type_name.to_owned(),
            kind,
        });
    }

    fn on_identity_hit(&mut self, source: HeapId) {
        self.events.push(TraceEvent::IdentityHit { source });
    }

    fn on_atomic_shared(&mut self, source: HeapId) {
        self.events.push(TraceEvent::AtomicShared { source });
    }

    fn on_object_cloned(&mut self, source: HeapId, clone: HeapId) {
        self.events.push(TraceEvent::ObjectCloned { source, clone });
    }

    fn on_pre_clone_hook(&mut self, source: HeapId, substituted: bool) {
        self.events.push(TraceEvent::PreCloneHook { source, substituted });
    }

    fn on_post_clone_hook(&mut self, source: HeapId) {
        self.events.push(TraceEvent::PostCloneHook { source });
    }
}
