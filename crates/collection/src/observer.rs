//! Change notifications delivered to view renderers.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CollectionChange {
    BeginEdits,
    EndEdits,
    Inserted {
        key: String,
        index: usize,
        previous_key: Option<String>,
        next_key: Option<String>,
    },
    Removed {
        key: String,
        index: usize,
    },
    Moved {
        key: String,
        old_index: usize,
        new_index: usize,
        previous_key: Option<String>,
        next_key: Option<String>,
    },
    Changed {
        key: String,
        index: usize,
    },
    Reloaded {
        keys: Vec<String>,
    },
}

impl CollectionChange {
    pub fn is_move(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

pub trait CollectionObserver: Send {
    fn notify(&mut self, change: &CollectionChange);
}

impl CollectionObserver for UnboundedSender<CollectionChange> {
    fn notify(&mut self, change: &CollectionChange) {
        if self.send(change.clone()).is_err() {
            tracing::trace!("collection observer channel closed");
        }
    }
}

/// Rebuilds key order purely from notifications, the way a list renderer
/// that never reads the collection directly would.
#[derive(Debug, Clone, Default)]
pub struct KeyOrderMirror {
    keys: Arc<Mutex<Vec<String>>>,
}

impl KeyOrderMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        match self.keys.lock() {
            Ok(keys) => keys.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn apply(keys: &mut Vec<String>, change: &CollectionChange) {
        match change {
            CollectionChange::BeginEdits
            | CollectionChange::EndEdits
            | CollectionChange::Changed { .. } => {}
            CollectionChange::Inserted {
                key, previous_key, ..
            } => {
                let at = insertion_point(keys, previous_key.as_deref());
                keys.insert(at, key.clone());
            }
            CollectionChange::Removed { key, .. } => {
                keys.retain(|existing| existing != key);
            }
            CollectionChange::Moved {
                key, previous_key, ..
            } => {
                keys.retain(|existing| existing != key);
                let at = insertion_point(keys, previous_key.as_deref());
                keys.insert(at, key.clone());
            }
            CollectionChange::Reloaded { keys: reloaded } => {
                *keys = reloaded.clone();
            }
        }
    }
}

fn insertion_point(keys: &[String], previous_key: Option<&str>) -> usize {
    match previous_key {
        None => 0,
        Some(previous) => keys
            .iter()
            .position(|existing| existing == previous)
            .map(|index| index + 1)
            .unwrap_or(keys.len()),
    }
}

impl CollectionObserver for KeyOrderMirror {
    fn notify(&mut self, change: &CollectionChange) {
        match self.keys.lock() {
            Ok(mut keys) => Self::apply(&mut keys, change),
            Err(poisoned) => Self::apply(&mut poisoned.into_inner(), change),
        }
    }
}
