// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Path-addressed document store.
//!
//! The ledger only relies on `get`, `set`, `update` and `push` plus a server
//! timestamp. Writes are last-write-wins and there is no multi-key atomicity:
//! anything touching two paths is two independent writes.
//!
//! Paths are slash-separated (`users/alice/lock`). Keys of an `update` may
//! themselves be nested paths relative to the target.

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait DocumentStore: Send + Sync {
    /// Reads the value at `path`, `None` if nothing is stored there.
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the value at `path`. Writing `null` removes it.
    fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Shallow-merges `partial` into the object at `path`.
    fn update(&self, path: &str, partial: Map<String, Value>) -> Result<(), StoreError>;

    /// Stores `value` under a freshly generated child key of `path`.
    ///
    /// Keys increase lexicographically in generation order.
    fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    fn server_timestamp(&self) -> DateTime<Utc>;

    /// Applies `partial` only if the child `guard_key` of `path` still equals
    /// `expected`. Returns `false` without writing otherwise.
    ///
    /// The default is a read followed by a write and therefore not atomic
    /// against other writers; stores that can compare-and-set override it.
    fn update_if(
        &self,
        path: &str,
        guard_key: &str,
        expected: &Value,
        partial: Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let current = self
            .get(&join(path, guard_key))?
            .unwrap_or(Value::Null);
        if &current != expected {
            return Ok(false);
        }
        self.update(path, partial)?;
        Ok(true)
    }
}

/// Lets several engines share one store, as devices share one backend.
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(path)
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        (**self).set(path, value)
    }

    fn update(&self, path: &str, partial: Map<String, Value>) -> Result<(), StoreError> {
        (**self).update(path, partial)
    }

    fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        (**self).push(path, value)
    }

    fn server_timestamp(&self) -> DateTime<Utc> {
        (**self).server_timestamp()
    }

    fn update_if(
        &self,
        path: &str,
        guard_key: &str,
        expected: &Value,
        partial: Map<String, Value>,
    ) -> Result<bool, StoreError> {
        (**self).update_if(path, guard_key, expected, partial)
    }
}

pub(crate) fn join(base: &str, child: &str) -> String {
    if base.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), child)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// In-process JSON tree.
///
/// A single [`RwLock`] guards the whole document and multi-key updates are
/// staged on a copy of the target, so every call applies fully or not at all
/// and [`DocumentStore::update_if`] is a real compare-and-set.
pub struct MemoryStore {
    root: RwLock<Value>,
    next_key: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
            next_key: AtomicU64::new(0),
            clock,
        }
    }

    /// Loads a store from a previously dumped document.
    pub fn from_json(document: Value, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        if !document.is_object() {
            return Err(StoreError::InvalidPath("/".to_string()));
        }
        let store = Self::with_clock(clock);
        let keys = count_push_keys(&document);
        *store.root.write() = document;
        store.next_key.store(keys, Ordering::SeqCst);
        Ok(store)
    }

    /// Full copy of the document.
    pub fn to_json(&self) -> Value {
        self.root.read().clone()
    }

    fn write_at(root: &mut Value, path: &str, value: Value) -> Result<(), StoreError> {
        let parts: Vec<&str> = segments(path).collect();
        let Some((leaf, parents)) = parts.split_last() else {
            *root = value;
            return Ok(());
        };

        let mut node = root;
        for part in parents {
            let object = node
                .as_object_mut()
                .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
            node = object
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if node.is_null() {
                *node = Value::Object(Map::new());
            }
        }

        let object = node
            .as_object_mut()
            .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
        if value.is_null() {
            object.remove(*leaf);
        } else {
            object.insert(leaf.to_string(), value);
        }
        Ok(())
    }

    /// Merges every key of `partial` below `path`, or nothing on error.
    fn merge_at(root: &mut Value, path: &str, partial: Map<String, Value>) -> Result<(), StoreError> {
        let existing = Self::read_at(root, path).filter(|node| !node.is_null()).cloned();
        let created = existing.is_none();
        let mut target = existing.unwrap_or_else(|| Value::Object(Map::new()));
        for (key, value) in partial {
            Self::write_at(&mut target, &key, value)
                .map_err(|_| StoreError::InvalidPath(join(path, &key)))?;
        }
        if created && target.as_object().is_some_and(Map::is_empty) {
            return Ok(());
        }
        Self::write_at(root, path, target)
    }

    fn read_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
        segments(path).try_fold(root, |node, part| match node {
            Value::Object(map) => map.get(part),
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

/// Push keys are `-` followed by a zero-padded counter; resume after the
/// largest one found when loading a dump.
fn count_push_keys(node: &Value) -> u64 {
    match node {
        Value::Object(map) => map
            .iter()
            .map(|(key, child)| {
                let own = key
                    .strip_prefix('-')
                    .and_then(|n| n.parse::<u64>().ok())
                    .map_or(0, |n| n + 1);
                own.max(count_push_keys(child))
            })
            .max()
            .unwrap_or(0),
        Value::Array(items) => items.iter().map(count_push_keys).max().unwrap_or(0),
        _ => 0,
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(Self::read_at(&self.root.read(), path).cloned())
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        Self::write_at(&mut self.root.write(), path, value)
    }

    fn update(&self, path: &str, partial: Map<String, Value>) -> Result<(), StoreError> {
        Self::merge_at(&mut self.root.write(), path, partial)
    }

    fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let key = format!("-{:012}", self.next_key.fetch_add(1, Ordering::SeqCst));
        Self::write_at(&mut self.root.write(), &join(path, &key), value)?;
        Ok(key)
    }

    fn server_timestamp(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn update_if(
        &self,
        path: &str,
        guard_key: &str,
        expected: &Value,
        partial: Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let null = Value::Null;
        let mut root = self.root.write();
        let current = Self::read_at(&root, &join(path, guard_key)).unwrap_or(&null);
        if current != expected {
            return Ok(false);
        }
        Self::merge_at(&mut root, path, partial)?;
        Ok(true)
    }
}
