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

//! Typed access to account records and the shared pools.
//!
//! Store layout:
//!
//! ```text
//! users/{id}          account record (balance, counters, lock, card, transactions, ...)
//! donations/{key}     global donation pool
//! transactions/{key}  global entry pool, each entry tagged with its accountId
//! transfers/{key}     transfer journal
//! ```
//!
//! The adapter never merges concurrent updates itself. A ledger write carries
//! the revision it was computed from and is refused if the stored revision
//! moved in the meantime.

use crate::account::{Account, Card, Holding, LockState};
use crate::base::{AccountId, TransferId};
use crate::catalog::Cause;
use crate::entry::LedgerEntry;
use crate::error::StoreError;
use crate::journal::{TransferRecord, TransferStatus};
use crate::limits::UsageCounter;
use crate::store::{DocumentStore, join};
use crate::transaction::Stage;
use crate::TransactionError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const USERS: &str = "users";
const DONATIONS: &str = "donations";
const ENTRY_POOL: &str = "transactions";
const TRANSFERS: &str = "transfers";

/// Ledger fields written back after an operation.
///
/// Built from the mutated snapshot; only ledger-owned fields are included so
/// a concurrent lock toggle or card issuance is never overwritten.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    balance: Decimal,
    daily_outgoing: UsageCounter,
    monthly_incoming: UsageCounter,
    transactions: Vec<LedgerEntry>,
    portfolio_value: Decimal,
    investments: Vec<Holding>,
    revision: u64,
    #[serde(skip)]
    expected_revision: u64,
}

impl AccountUpdate {
    /// Update that persists the ledger state of `account`.
    pub fn ledger(account: &Account) -> Self {
        Self {
            balance: account.balance(),
            daily_outgoing: account.daily_outgoing().clone(),
            monthly_incoming: account.monthly_incoming().clone(),
            transactions: account.transactions().to_vec(),
            portfolio_value: account.portfolio_value(),
            investments: account.investments().to_vec(),
            revision: account.revision() + 1,
            expected_revision: account.revision(),
        }
    }
}

/// Donation pool record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRecord {
    pub user_id: AccountId,
    pub category: Cause,
    pub title: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Entry in the global pool, tagged with the account it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PooledEntry {
    pub account_id: AccountId,
    #[serde(flatten)]
    pub entry: LedgerEntry,
}

pub struct AccountStore<S: DocumentStore> {
    store: S,
}

fn validate_id(id: &AccountId) -> Result<(), TransactionError> {
    let raw = id.as_str();
    if raw.trim().is_empty() || raw.contains('/') || raw.trim() != raw {
        return Err(TransactionError::InvalidAccountId);
    }
    Ok(())
}

fn to_value<T: Serialize>(path: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::decode(path, e))
}

fn to_object<T: Serialize>(path: &str, value: &T) -> Result<Map<String, Value>, StoreError> {
    match to_value(path, value)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidPath(path.to_string())),
    }
}

impl<S: DocumentStore> AccountStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.store.server_timestamp()
    }

    /// Reads the account snapshot.
    pub fn read(&self, id: &AccountId, stage: Stage) -> Result<Account, TransactionError> {
        validate_id(id)?;
        let path = id.path();
        let mut value = self
            .store
            .get(&path)
            .map_err(|e| e.at(stage))?
            .ok_or_else(|| TransactionError::AccountNotFound(id.clone()))?;
        // The key is authoritative; records written by older clients may lack the username.
        if let Value::Object(fields) = &mut value {
            fields.insert("username".to_string(), json!(id));
        }
        serde_json::from_value(value).map_err(|e| StoreError::decode(&path, e).at(stage))
    }

    /// Creates a zero-balance account. Fails if the id is taken.
    pub fn create(&self, id: &AccountId) -> Result<Account, TransactionError> {
        validate_id(id)?;
        let path = id.path();
        let existing = self.store.get(&path).map_err(|e| e.at(Stage::Checking))?;
        if existing.is_some() {
            return Err(TransactionError::AccountExists(id.clone()));
        }
        let account = Account::new(id.clone());
        let value = to_value(&path, &account).map_err(|e| e.at(Stage::Recording))?;
        self.store
            .set(&path, value)
            .map_err(|e| e.at(Stage::Recording))?;
        Ok(account)
    }

    /// Writes the ledger fields of an account.
    ///
    /// Returns [`TransactionError::ConcurrentModification`] without writing if
    /// the stored revision differs from the one the update was computed from.
    pub fn write(&self, id: &AccountId, update: AccountUpdate) -> Result<(), TransactionError> {
        let path = id.path();
        let revision_path = join(&path, "revision");
        let expected = match update.expected_revision {
            0 if self
                .store
                .get(&revision_path)
                .map_err(|e| e.at(Stage::Recording))?
                .is_none() =>
            {
                Value::Null
            }
            n => json!(n),
        };
        let partial = to_object(&path, &update).map_err(|e| e.at(Stage::Recording))?;
        let written = self
            .store
            .update_if(&path, "revision", &expected, partial)
            .map_err(|e| e.at(Stage::Recording))?;
        if !written {
            return Err(TransactionError::ConcurrentModification(id.clone()));
        }
        Ok(())
    }

    /// Reads only the lock flag.
    pub fn read_lock(&self, id: &AccountId) -> Result<bool, TransactionError> {
        validate_id(id)?;
        let status = self
            .store
            .get(&join(&id.path(), "lock/status"))
            .map_err(|e| e.at(Stage::Checking))?;
        match status {
            Some(value) => Ok(value.as_bool().unwrap_or(false)),
            None => {
                let exists = self
                    .store
                    .get(&id.path())
                    .map_err(|e| e.at(Stage::Checking))?
                    .is_some();
                if exists {
                    Ok(false)
                } else {
                    Err(TransactionError::AccountNotFound(id.clone()))
                }
            }
        }
    }

    pub fn write_lock(&self, id: &AccountId, lock: &LockState) -> Result<(), TransactionError> {
        let path = join(&id.path(), "lock");
        let value = to_value(&path, lock).map_err(|e| e.at(Stage::Recording))?;
        self.store
            .set(&path, value)
            .map_err(|e| e.at(Stage::Recording))
    }

    pub fn write_card(&self, id: &AccountId, card: &Card) -> Result<(), TransactionError> {
        let path = join(&id.path(), "card");
        let value = to_value(&path, card).map_err(|e| e.at(Stage::Recording))?;
        self.store
            .set(&path, value)
            .map_err(|e| e.at(Stage::Recording))
    }

    /// Sets the read mark of each entry. Ids become path segments, so an
    /// empty id or one containing `/` is refused before anything is written.
    pub fn mark_read(&self, id: &AccountId, entry_ids: &[String]) -> Result<(), TransactionError> {
        if let Some(bad) = entry_ids
            .iter()
            .find(|entry_id| entry_id.trim().is_empty() || entry_id.contains('/'))
        {
            return Err(TransactionError::InvalidEntryId(bad.clone()));
        }
        let partial: Map<String, Value> = entry_ids
            .iter()
            .map(|entry_id| (format!("inboxRead/{entry_id}"), Value::Bool(true)))
            .collect();
        self.store
            .update(&id.path(), partial)
            .map_err(|e| e.at(Stage::Recording))
    }

    /// All accounts, ordered by id.
    pub fn list(&self) -> Result<Vec<Account>, TransactionError> {
        let Some(Value::Object(users)) = self
            .store
            .get(USERS)
            .map_err(|e| e.at(Stage::Checking))?
        else {
            return Ok(Vec::new());
        };
        let mut ids: Vec<AccountId> = users.keys().map(|k| AccountId::new(k.clone())).collect();
        ids.sort();
        ids.iter().map(|id| self.read(id, Stage::Checking)).collect()
    }

    pub fn push_donation(&self, record: &DonationRecord) -> Result<String, TransactionError> {
        let value = to_value(DONATIONS, record).map_err(|e| e.at(Stage::Recording))?;
        self.store
            .push(DONATIONS, value)
            .map_err(|e| e.at(Stage::Recording))
    }

    pub fn donations(&self) -> Result<Vec<DonationRecord>, TransactionError> {
        self.pool(DONATIONS)
    }

    /// Entries in the global pool that belong to `id`, in key order.
    ///
    /// Each entry takes its pool key as id. Pool keys start with `-`, so read
    /// marks never collide with the account's own `e`-prefixed entry ids.
    pub fn pooled_entries(&self, id: &AccountId) -> Result<Vec<LedgerEntry>, TransactionError> {
        Ok(self
            .keyed_pool::<PooledEntry>(ENTRY_POOL)?
            .into_iter()
            .filter(|(_, p)| &p.account_id == id)
            .map(|(key, p)| LedgerEntry { id: key, ..p.entry })
            .collect())
    }

    pub fn push_pooled_entry(&self, pooled: &PooledEntry) -> Result<String, TransactionError> {
        let value = to_value(ENTRY_POOL, pooled).map_err(|e| e.at(Stage::Recording))?;
        self.store
            .push(ENTRY_POOL, value)
            .map_err(|e| e.at(Stage::Recording))
    }

    pub fn open_transfer(&self, record: &TransferRecord) -> Result<TransferId, TransactionError> {
        let value = to_value(TRANSFERS, record).map_err(|e| e.at(Stage::Applying))?;
        self.store
            .push(TRANSFERS, value)
            .map(TransferId)
            .map_err(|e| e.at(Stage::Applying))
    }

    pub fn set_transfer_status(
        &self,
        id: &TransferId,
        status: TransferStatus,
    ) -> Result<(), TransactionError> {
        let path = join(TRANSFERS, &id.0);
        let mut partial = Map::new();
        partial.insert(
            "status".to_string(),
            to_value(&path, &status).map_err(|e| e.at(Stage::Recording))?,
        );
        self.store
            .update(&path, partial)
            .map_err(|e| e.at(Stage::Recording))
    }

    pub fn transfers(&self) -> Result<Vec<(TransferId, TransferRecord)>, TransactionError> {
        self.keyed_pool(TRANSFERS)
            .map(|records| records.into_iter().map(|(k, r)| (TransferId(k), r)).collect())
    }

    fn pool<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<Vec<T>, TransactionError> {
        Ok(self.keyed_pool(path)?.into_iter().map(|(_, v)| v).collect())
    }

    fn keyed_pool<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
    ) -> Result<Vec<(String, T)>, TransactionError> {
        let Some(Value::Object(children)) =
            self.store.get(path).map_err(|e| e.at(Stage::Checking))?
        else {
            return Ok(Vec::new());
        };
        // serde_json maps iterate in key order, which is push order.
        children
            .into_iter()
            .map(|(key, value)| {
                let item = serde_json::from_value(value)
                    .map_err(|e| StoreError::decode(&join(path, &key), e).at(Stage::Checking))?;
                Ok((key, item))
            })
            .collect()
    }
}
