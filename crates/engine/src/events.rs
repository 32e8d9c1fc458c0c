//! Event types for change notifications.
//!
//! Collaboration and UI layers subscribe to these instead of polling: every
//! committed mutation bumps the revision, and the cells whose values
//! changed are delivered tagged with that revision.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::history::CommandKind;
use crate::recalc::CellChange;

/// Events emitted by the engine after a committed mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Cells changed value as a result of a mutation and its recalculation.
    CellsChanged(CellsChangedEvent),

    /// Revision number changed. Emitted exactly once per committed mutation.
    RevisionChanged(RevisionChangedEvent),
}

/// Emitted when cells change value. Never emitted with an empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct CellsChangedEvent {
    /// Revision that produced these changes.
    /// INVARIANT: All cells in this event belong to this single revision.
    pub revision: u64,
    pub changes: Vec<CellChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionCause {
    Execute(CommandKind),
    Undo(CommandKind),
    Redo(CommandKind),
    RecalculateAll,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevisionChangedEvent {
    pub revision: u64,
    pub previous: u64,
    pub cause: RevisionCause,
}

/// Callback type for receiving engine events.
pub type EventCallback = Box<dyn Fn(&EngineEvent) + Send + Sync>;

/// Simple event collector for testing and headless hosts.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<EngineEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// A callback that appends every event to `collector`.
    pub fn callback(collector: &Arc<Mutex<EventCollector>>) -> EventCallback {
        let collector = Arc::clone(collector);
        Box::new(move |event| collector.lock().push(event.clone()))
    }

    pub fn push(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Filter to only CellsChanged events.
    pub fn cells_changed(&self) -> Vec<&CellsChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::CellsChanged(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Filter to only RevisionChanged events.
    pub fn revision_changed(&self) -> Vec<&RevisionChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::RevisionChanged(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}
