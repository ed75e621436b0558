//! Binding materialization: replaces a model value reachable from the
//! controller with an observable version the view can subscribe to.

use std::{collections::BTreeMap, sync::Arc};

use serde_json::{Map, Value};
use shared::error::ShellError;
use tokio::sync::watch;

/// Key of the marker left in the model where a bound value used to live.
pub const BOUND_MARKER: &str = "$bound";

#[derive(Debug, Clone)]
pub struct ObservableModel {
    path: String,
    tx: Arc<watch::Sender<Value>>,
}

impl ObservableModel {
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self {
            path: path.into(),
            tx: Arc::new(tx),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get(&self) -> Value {
        self.tx.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        self.tx.send_replace(value);
    }

    pub fn update(&self, apply: impl FnOnce(&mut Value)) {
        self.tx.send_modify(apply);
    }

    pub fn subscribe(&self) -> watch::Receiver<Value> {
        self.tx.subscribe()
    }
}

fn model_path_error(path: &str, segment: &str) -> ShellError {
    ShellError::ModelPath {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |index| items.get_mut(index)),
        _ => None,
    }
}

/// Walks `path` from `root`. Every segment must resolve to a non-null value.
/// The resolved value moves into the returned [`ObservableModel`] and its
/// slot is replaced with a `{"$bound": path}` marker.
pub fn materialize_path(root: &mut Value, path: &str) -> Result<ObservableModel, ShellError> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(model_path_error(path, ""));
    }

    let mut slot = root;
    for segment in &segments {
        slot = match child_mut(slot, segment) {
            Some(next) if !next.is_null() => next,
            _ => return Err(model_path_error(path, segment)),
        };
    }

    let mut marker = Map::new();
    marker.insert(BOUND_MARKER.to_string(), Value::String(path.to_string()));
    let value = std::mem::replace(slot, Value::Object(marker));
    Ok(ObservableModel::new(path, value))
}

/// Observable models of one controller, keyed by binding path.
#[derive(Debug, Clone, Default)]
pub struct BindingSet {
    models: BTreeMap<String, ObservableModel>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materializes `path` once; later calls return the same observable.
    pub fn materialize(
        &mut self,
        root: &mut Value,
        path: &str,
    ) -> Result<&ObservableModel, ShellError> {
        if !self.models.contains_key(path) {
            let model = materialize_path(root, path)?;
            self.models.insert(path.to_string(), model);
        }
        self.models
            .get(path)
            .ok_or_else(|| model_path_error(path, ""))
    }

    pub fn get(&self, path: &str) -> Option<&ObservableModel> {
        self.models.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.models.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/binding_tests.rs"]
mod tests;
