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

//! Shared helpers for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use wallet_ledger::{AccountId, DocumentStore, Engine, ManualClock, MemoryStore, StoreError};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// Engine over a memory store driven by a manual clock.
pub fn engine_at(clock: &Arc<ManualClock>) -> Engine {
    Engine::new(MemoryStore::with_clock(clock.clone()))
}

/// Opens each account and deposits its starting balance.
pub fn seed<S: DocumentStore>(engine: &Engine<S>, accounts: &[(&str, &str)]) {
    for (id, balance) in accounts {
        let id = AccountId::from(*id);
        engine.open_account(&id).unwrap();
        if *balance != "0" {
            engine.deposit(&id, balance).unwrap();
        }
    }
}

/// Store that refuses writes below chosen paths until healed.
pub struct FlakyStore {
    inner: MemoryStore,
    failing_writes: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_writes: Mutex::new(Vec::new()),
        }
    }

    /// Every write at or below `prefix` fails from now on.
    pub fn fail_writes_at(&self, prefix: &str) {
        self.failing_writes.lock().push(prefix.to_string());
    }

    pub fn heal(&self) {
        self.failing_writes.lock().clear();
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self, path: &str) -> Result<(), StoreError> {
        let failing = self.failing_writes.lock();
        if failing.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return Err(StoreError::Unavailable(format!("write refused at {path}")));
        }
        Ok(())
    }
}

impl DocumentStore for FlakyStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(path)
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check(path)?;
        self.inner.set(path, value)
    }

    fn update(&self, path: &str, partial: Map<String, Value>) -> Result<(), StoreError> {
        self.check(path)?;
        self.inner.update(path, partial)
    }

    fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        self.check(path)?;
        self.inner.push(path, value)
    }

    fn server_timestamp(&self) -> DateTime<Utc> {
        self.inner.server_timestamp()
    }

    fn update_if(
        &self,
        path: &str,
        guard_key: &str,
        expected: &Value,
        partial: Map<String, Value>,
    ) -> Result<bool, StoreError> {
        self.check(path)?;
        self.inner.update_if(path, guard_key, expected, partial)
    }
}

type Hook = Box<dyn FnOnce() + Send>;

/// Store that runs a one-shot hook right before the next guarded write,
/// standing in for another device writing between read and write.
pub struct InterleavingStore {
    inner: Arc<MemoryStore>,
    before_guarded_write: Mutex<Option<Hook>>,
}

impl InterleavingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            before_guarded_write: Mutex::new(None),
        }
    }

    pub fn before_next_guarded_write(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_guarded_write.lock() = Some(Box::new(hook));
    }
}

impl DocumentStore for InterleavingStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(path)
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.inner.set(path, value)
    }

    fn update(&self, path: &str, partial: Map<String, Value>) -> Result<(), StoreError> {
        self.inner.update(path, partial)
    }

    fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        self.inner.push(path, value)
    }

    fn server_timestamp(&self) -> DateTime<Utc> {
        self.inner.server_timestamp()
    }

    fn update_if(
        &self,
        path: &str,
        guard_key: &str,
        expected: &Value,
        partial: Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let hook = self.before_guarded_write.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        self.inner.update_if(path, guard_key, expected, partial)
    }
}
