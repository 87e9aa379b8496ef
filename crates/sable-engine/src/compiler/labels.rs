//! Per-compilation-unit label tracking.
//!
//! One repository lives for the duration of one unit (the top-level program
//! or one function body) and records which goto labels have been found
//! (defined) and which are still pending (referenced by a goto that has not
//! resolved yet). Discoveries are published as an ordered event log;
//! enclosing compilation rules mark a position before a nested compile and
//! replay the events recorded since, which is how the block assembler and
//! the jump-into-construct checks observe what happened inside a nested
//! statement.

use rustc_hash::FxHashSet;

/// A published label discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelEvent {
    /// A label definition was compiled.
    Found(String),
    /// A goto referenced a label (possibly not yet defined).
    Pending(String),
}

/// Position in the event log, taken before a nested compile.
#[derive(Debug, Clone, Copy)]
pub struct LabelMark(usize);

/// Tracks found and pending labels for one compilation unit.
#[derive(Debug, Default)]
pub struct LabelRepository {
    found: FxHashSet<String>,
    pending: FxHashSet<String>,
    order: Vec<String>,
    events: Vec<LabelEvent>,
}

impl LabelRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a label definition.
    pub fn found(&mut self, label: &str) {
        if self.found.insert(label.to_owned()) {
            self.order.push(label.to_owned());
        }
        self.pending.remove(label);
        self.events.push(LabelEvent::Found(label.to_owned()));
    }

    /// Record a goto reference to `label`.
    pub fn add_pending(&mut self, label: &str) {
        if !self.found.contains(label) {
            self.pending.insert(label.to_owned());
        }
        self.events.push(LabelEvent::Pending(label.to_owned()));
    }

    /// True once `label` has been defined in this unit.
    pub fn has_been_found(&self, label: &str) -> bool {
        self.found.contains(label)
    }

    /// True while a goto to `label` is unresolved.
    pub fn has_pending(&self, label: &str) -> bool {
        self.pending.contains(label)
    }

    /// Every label defined in this unit, in discovery order.
    pub fn labels(&self) -> &[String] {
        &self.order
    }

    /// Labels still referenced but never defined.
    pub fn pending_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.pending.iter().cloned().collect();
        labels.sort();
        labels
    }

    /// Mark the current position in the event log.
    pub fn mark(&self) -> LabelMark {
        LabelMark(self.events.len())
    }

    /// The events published since `mark`, in order.
    pub fn events_since(&self, mark: LabelMark) -> &[LabelEvent] {
        &self.events[mark.0..]
    }
}
