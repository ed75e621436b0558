//! Keyed ordered collection backing on-screen lists.
//!
//! Records are addressed two ways: by position in display order and by a
//! stable key. Both structures are kept consistent by every mutation, and
//! every structural change is reported to subscribed observers so a renderer
//! can update incrementally instead of rebuilding the list.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use serde_json::Value;

mod error;
mod observer;

pub use error::{CollectionError, CollectionResult};
pub use observer::{CollectionChange, CollectionObserver, KeyOrderMirror};

type KeyExtractor<T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync>;

/// Borrowed view of one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordRef<'a, T> {
    pub key: &'a str,
    pub data: &'a T,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemsSlice<'a, T> {
    pub items: Vec<RecordRef<'a, T>>,
    /// Position of the requested record inside `items`.
    pub offset: usize,
    pub absolute_index: usize,
    pub total: usize,
}

struct Entry<T> {
    data: T,
    /// Last-known position in `order`.
    index: usize,
}

enum Anchor<'a> {
    Start,
    End,
    After(&'a str),
}

pub struct KeyedCollection<T> {
    order: Vec<String>,
    entries: HashMap<String, Entry<T>>,
    key_of: Option<KeyExtractor<T>>,
    next_generated_key: u64,
    relocated: HashSet<String>,
    observers: Vec<Box<dyn CollectionObserver>>,
    edit_depth: usize,
}

impl<T> Default for KeyedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> KeyedCollection<T> {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
            key_of: None,
            next_generated_key: 0,
            relocated: HashSet::new(),
            observers: Vec::new(),
            edit_depth: 0,
        }
    }

    /// Derive keys from record data when the caller does not supply one.
    pub fn with_key_fn(key_of: impl Fn(&T) -> Option<String> + Send + Sync + 'static) -> Self {
        let mut collection = Self::new();
        collection.key_of = Some(Box::new(key_of));
        collection
    }

    pub fn subscribe(&mut self, observer: Box<dyn CollectionObserver>) {
        self.observers.push(observer);
    }

    pub fn count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key).map(|entry| &entry.data)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.entries.get(key).map(|entry| entry.index)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = RecordRef<'_, T>> {
        self.order
            .iter()
            .enumerate()
            .filter_map(|(index, key)| self.record_at(index, key))
    }

    pub fn items_from_index(
        &self,
        index: usize,
        before: usize,
        after: usize,
    ) -> CollectionResult<ItemsSlice<'_, T>> {
        if index >= self.order.len() {
            return Err(CollectionError::Range {
                index,
                size: self.order.len(),
            });
        }
        Ok(self.slice_around(index, before, after))
    }

    pub fn items_from_key(
        &self,
        key: &str,
        before: usize,
        after: usize,
    ) -> CollectionResult<ItemsSlice<'_, T>> {
        let index = self
            .entries
            .get(key)
            .map(|entry| entry.index)
            .ok_or_else(|| CollectionError::KeyNotFound {
                key: key.to_string(),
            })?;
        Ok(self.slice_around(index, before, after))
    }

    pub fn insert_at_end(&mut self, key: Option<&str>, data: T) -> CollectionResult<RecordRef<'_, T>> {
        let index = self.order.len();
        self.insert_at(index, key, data)
    }

    pub fn insert_at_start(
        &mut self,
        key: Option<&str>,
        data: T,
    ) -> CollectionResult<RecordRef<'_, T>> {
        self.insert_at(0, key, data)
    }

    /// Unlike the move operations, a missing anchor is an error: the new
    /// record would otherwise have no defined position.
    pub fn insert_after(
        &mut self,
        after_key: &str,
        key: Option<&str>,
        data: T,
    ) -> CollectionResult<RecordRef<'_, T>> {
        let anchor = self.index_of(after_key).ok_or_else(|| CollectionError::KeyNotFound {
            key: after_key.to_string(),
        })?;
        self.insert_at(anchor + 1, key, data)
    }

    /// Removes the record if present. Absent keys are ignored.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        let index = self.entries.get(key)?.index;
        self.order.remove(index);
        self.relocated.remove(key);
        let entry = self.entries.remove(key)?;
        self.reindex(index, self.order.len());
        self.emit(CollectionChange::Removed {
            key: key.to_string(),
            index,
        });
        Some(entry.data)
    }

    /// Replaces the data of an existing record in place. Absent keys are
    /// ignored.
    pub fn change(&mut self, key: &str, data: T) -> Option<T> {
        let entry = self.entries.get_mut(key)?;
        let previous = std::mem::replace(&mut entry.data, data);
        let index = entry.index;
        self.emit(CollectionChange::Changed {
            key: key.to_string(),
            index,
        });
        Some(previous)
    }

    pub fn move_to_start(&mut self, key: &str) -> bool {
        self.move_to(key, Anchor::Start)
    }

    pub fn move_to_end(&mut self, key: &str) -> bool {
        self.move_to(key, Anchor::End)
    }

    pub fn move_after(&mut self, key: &str, after_key: &str) -> bool {
        if key == after_key || !self.entries.contains_key(after_key) {
            return false;
        }
        self.move_to(key, Anchor::After(after_key))
    }

    /// Tells the next move of `key` that the record already sits at its new
    /// physical position, so only hints and notifications are updated. The
    /// marker is consumed by that move.
    pub fn mark_relocated(&mut self, key: &str) {
        if self.entries.contains_key(key) {
            self.relocated.insert(key.to_string());
        }
    }

    pub fn begin_edits(&mut self) {
        self.edit_depth += 1;
        if self.edit_depth == 1 {
            self.emit(CollectionChange::BeginEdits);
        }
    }

    pub fn end_edits(&mut self) {
        if self.edit_depth == 0 {
            return;
        }
        self.edit_depth -= 1;
        if self.edit_depth == 0 {
            self.emit(CollectionChange::EndEdits);
        }
    }

    /// Stable sort by `compare`, reported as the moves that take the previous
    /// order to the new one. Returns the number of moves emitted.
    pub fn sort_by(&mut self, mut compare: impl FnMut(&T, &T) -> Ordering) -> usize {
        let mut target = self.order.clone();
        target.sort_by(|a, b| match (self.entries.get(a), self.entries.get(b)) {
            (Some(a), Some(b)) => compare(&a.data, &b.data),
            _ => Ordering::Equal,
        });

        self.begin_edits();
        let mut moves = 0;
        for (position, key) in target.iter().enumerate() {
            if self.order[position] == *key {
                continue;
            }
            let Some(current) = self.order[position..]
                .iter()
                .position(|existing| existing == key)
                .map(|offset| position + offset)
            else {
                continue;
            };
            let moved = self.order.remove(current);
            self.order.insert(position, moved);
            self.mark_relocated(key);

            let relocated = match position {
                0 => self.move_to_start(key),
                _ => {
                    let previous = target[position - 1].clone();
                    self.move_after(key, &previous)
                }
            };
            if relocated {
                moves += 1;
            }
        }
        self.reindex(0, self.order.len());
        self.end_edits();

        tracing::trace!(moves, total = self.order.len(), "collection sorted");
        moves
    }

    fn move_to(&mut self, key: &str, anchor: Anchor<'_>) -> bool {
        let Some(old_index) = self.entries.get(key).map(|entry| entry.index) else {
            return false;
        };

        let new_index = if self.relocated.remove(key) {
            match self.order.iter().position(|existing| existing == key) {
                Some(index) => index,
                None => return false,
            }
        } else {
            let target = match anchor {
                Anchor::Start => 0,
                Anchor::End => self.order.len() - 1,
                Anchor::After(after_key) => {
                    let Some(after_index) = self.index_of(after_key) else {
                        return false;
                    };
                    if after_index < old_index {
                        after_index + 1
                    } else {
                        after_index
                    }
                }
            };
            if target == old_index {
                return false;
            }
            let moved = self.order.remove(old_index);
            self.order.insert(target, moved);
            target
        };

        let (from, to) = (old_index.min(new_index), old_index.max(new_index));
        self.reindex(from, to + 1);

        let previous_key = new_index
            .checked_sub(1)
            .and_then(|index| self.order.get(index))
            .cloned();
        let next_key = self.order.get(new_index + 1).cloned();
        self.emit(CollectionChange::Moved {
            key: key.to_string(),
            old_index,
            new_index,
            previous_key,
            next_key,
        });
        true
    }

    /// Replaces every record. On a key collision the collection is left
    /// untouched.
    pub fn set_data(&mut self, items: impl IntoIterator<Item = T>) -> CollectionResult<()> {
        let mut order = Vec::new();
        let mut entries = HashMap::new();
        let mut next_generated_key = self.next_generated_key;
        for data in items {
            let key = match self.key_of.as_ref().and_then(|key_of| key_of(&data)) {
                Some(key) => key,
                None => {
                    let key = next_generated_key.to_string();
                    next_generated_key += 1;
                    key
                }
            };
            if entries.contains_key(&key) {
                return Err(CollectionError::DuplicateKey { key });
            }
            entries.insert(
                key.clone(),
                Entry {
                    data,
                    index: order.len(),
                },
            );
            order.push(key);
        }

        self.order = order;
        self.entries = entries;
        self.next_generated_key = next_generated_key;
        self.relocated.clear();
        self.emit(CollectionChange::Reloaded {
            keys: self.order.clone(),
        });
        Ok(())
    }

    fn insert_at(
        &mut self,
        index: usize,
        key: Option<&str>,
        data: T,
    ) -> CollectionResult<RecordRef<'_, T>> {
        let key = self.resolve_key(key, &data);
        if self.entries.contains_key(&key) {
            return Err(CollectionError::DuplicateKey { key });
        }

        self.order.insert(index, key.clone());
        self.entries.insert(key.clone(), Entry { data, index });
        self.reindex(index, self.order.len());

        let previous_key = index
            .checked_sub(1)
            .and_then(|previous| self.order.get(previous))
            .cloned();
        let next_key = self.order.get(index + 1).cloned();
        self.emit(CollectionChange::Inserted {
            key: key.clone(),
            index,
            previous_key,
            next_key,
        });

        let key = &self.order[index];
        self.record_at(index, key)
            .ok_or_else(|| CollectionError::KeyNotFound { key: key.clone() })
    }

    fn resolve_key(&mut self, key: Option<&str>, data: &T) -> String {
        if let Some(key) = key {
            return key.to_string();
        }
        if let Some(key) = self.key_of.as_ref().and_then(|key_of| key_of(data)) {
            return key;
        }
        loop {
            let key = self.next_generated_key.to_string();
            self.next_generated_key += 1;
            if !self.entries.contains_key(&key) {
                return key;
            }
        }
    }

    fn reindex(&mut self, from: usize, to: usize) {
        let to = to.min(self.order.len());
        for index in from..to {
            if let Some(entry) = self.entries.get_mut(&self.order[index]) {
                entry.index = index;
            }
        }
    }

    fn record_at<'a>(&'a self, index: usize, key: &'a str) -> Option<RecordRef<'a, T>> {
        self.entries.get(key).map(|entry| RecordRef {
            key,
            data: &entry.data,
            index,
        })
    }

    fn slice_around(&self, index: usize, before: usize, after: usize) -> ItemsSlice<'_, T> {
        let start = index.saturating_sub(before);
        let end = index.saturating_add(after).saturating_add(1).min(self.order.len());
        let items = (start..end)
            .filter_map(|position| self.record_at(position, &self.order[position]))
            .collect();
        ItemsSlice {
            items,
            offset: index - start,
            absolute_index: index,
            total: self.order.len(),
        }
    }

    fn emit(&mut self, change: CollectionChange) {
        for observer in &mut self.observers {
            observer.notify(&change);
        }
    }
}

impl KeyedCollection<Value> {
    /// Keys are read from `field` of each JSON record; strings are used as is,
    /// numbers and booleans are stringified.
    pub fn with_key_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::with_key_fn(move |data: &Value| match data.get(&field)? {
            Value::String(key) => Some(key.clone()),
            Value::Number(key) => Some(key.to_string()),
            Value::Bool(key) => Some(key.to_string()),
            _ => None,
        })
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
