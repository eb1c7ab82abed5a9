//! Linear undo/redo over whole-project snapshots

use crate::models::Project;
use log::debug;
use std::collections::VecDeque;

/// Maximum number of undo snapshots kept
pub const MAX_HISTORY: usize = 30;

/// Two stacks of owned project snapshots.
///
/// Every entry is an independent clone, so no snapshot shares state with the
/// live project or with another snapshot.
#[derive(Debug, Default, Clone)]
pub struct History {
    past: VecDeque<Project>,
    future: VecDeque<Project>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save current state for undo. Call before applying a mutation.
    pub fn record_before_change(&mut self, current: Option<&Project>) {
        let Some(current) = current else {
            return;
        };
        self.past.push_back(current.clone());
        while self.past.len() > MAX_HISTORY {
            self.past.pop_front();
        }
        self.future.clear();
        debug!("[History] recorded snapshot ({} undo steps)", self.past.len());
    }

    /// Steps back one snapshot, returning the project that becomes current
    pub fn undo(&mut self, current: Option<&Project>) -> Option<Project> {
        let current = current?;
        let previous = self.past.pop_back()?;
        self.future.push_front(current.clone());
        Some(previous)
    }

    /// Re-applies the most recently undone snapshot
    pub fn redo(&mut self, current: Option<&Project>) -> Option<Project> {
        let current = current?;
        let next = self.future.pop_front()?;
        self.past.push_back(current.clone());
        Some(next)
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }
}
