//! Reference host navigation facility: a back/forward history that produces
//! the snapshot and delta delivered with every navigation.

use serde_json::Value;
use shared::protocol::{HistoryEntry, HistorySnapshot};

/// A navigation the host has committed to and is about to deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingNavigation {
    pub location: String,
    pub delta: i32,
    pub state: Option<Value>,
    pub snapshot: HistorySnapshot,
}

/// The top of each stack is its last element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationHistory {
    back: Vec<HistoryEntry>,
    current: Option<HistoryEntry>,
    forward: Vec<HistoryEntry>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location(&self) -> Option<&str> {
        self.current.as_ref().map(|entry| entry.location.as_str())
    }

    pub fn can_go_back(&self) -> bool {
        !self.back.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            back_stack: self.back.clone(),
            forward_stack: self.forward.clone(),
        }
    }

    /// Where `back(distance)` would land, without moving.
    pub fn back_target(&self, distance: usize) -> Option<&HistoryEntry> {
        if distance == 0 || distance > self.back.len() {
            return None;
        }
        self.back.get(self.back.len() - distance)
    }

    /// Where `forward(distance)` would land, without moving.
    pub fn forward_target(&self, distance: usize) -> Option<&HistoryEntry> {
        if distance == 0 || distance > self.forward.len() {
            return None;
        }
        self.forward.get(self.forward.len() - distance)
    }

    /// Plain navigation: the current entry moves to the back stack and the
    /// forward stack is discarded.
    pub fn navigate(&mut self, location: impl Into<String>, state: Option<Value>) -> PendingNavigation {
        let entry = HistoryEntry {
            location: location.into(),
            state: state.clone(),
        };
        if let Some(current) = self.current.replace(entry.clone()) {
            self.back.push(current);
        }
        self.forward.clear();
        PendingNavigation {
            location: entry.location,
            delta: 0,
            state,
            snapshot: self.snapshot(),
        }
    }

    pub fn back(&mut self, distance: usize) -> Option<PendingNavigation> {
        self.back_target(distance)?;
        for _ in 0..distance {
            let entry = self.back.pop()?;
            if let Some(current) = self.current.replace(entry) {
                self.forward.push(current);
            }
        }
        Some(self.pending(-(distance as i32)))
    }

    pub fn forward(&mut self, distance: usize) -> Option<PendingNavigation> {
        self.forward_target(distance)?;
        for _ in 0..distance {
            let entry = self.forward.pop()?;
            if let Some(current) = self.current.replace(entry) {
                self.back.push(current);
            }
        }
        Some(self.pending(distance as i32))
    }

    fn pending(&self, delta: i32) -> PendingNavigation {
        let (location, state) = self
            .current
            .as_ref()
            .map(|entry| (entry.location.clone(), entry.state.clone()))
            .unwrap_or_default();
        PendingNavigation {
            location,
            delta,
            state,
            snapshot: self.snapshot(),
        }
    }
}

#[cfg(test)]
#[path = "tests/host_tests.rs"]
mod tests;
