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

//! # Wallet Ledger
//!
//! Account ledger and transaction processing for a mobile wallet: deposits,
//! transfers, bill payments, donations and investments over a path-addressed
//! document store, with limit enforcement, card locking, receipts and an
//! inbox feed.
//!
//! ## Core Components
//!
//! - [`Engine`]: validates, checks, applies and records operations
//! - [`Account`]: balance, usage counters, lock, card and ledger of one user
//! - [`LedgerEntry`]: one append-only ledger record, tagged by [`EntryKind`]
//! - [`DocumentStore`]: the store contract; [`MemoryStore`] implements it in process
//! - [`TransactionError`]: everything an operation can be refused or fail with
//!
//! ## Example
//!
//! ```
//! use wallet_ledger::{AccountId, Engine};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::in_memory();
//! let alice = AccountId::from("alice");
//! let bob = AccountId::from("bob");
//! engine.open_account(&alice).unwrap();
//! engine.open_account(&bob).unwrap();
//!
//! engine.deposit(&alice, "1000").unwrap();
//! let receipt = engine.transfer(&alice, &bob, "300").unwrap();
//! assert_eq!(receipt.summary(), "Transferred ₱300.00 to bob");
//!
//! assert_eq!(engine.get_account(&alice).unwrap().balance(), dec!(700));
//! assert_eq!(engine.get_account(&bob).unwrap().balance(), dec!(300));
//! ```
//!
//! ## Thread Safety
//!
//! The engine is `Sync`; operations on different accounts run in parallel,
//! operations on the same account are serialized.

pub mod account;
pub mod account_store;
mod base;
pub mod catalog;
pub mod clock;
mod engine;
pub mod entry;
pub mod error;
pub mod inbox;
pub mod journal;
pub mod limits;
pub mod lock;
pub mod receipt;
pub mod reference;
pub mod settings;
pub mod store;
mod transaction;

pub use account::{Account, Card, Holding, LockState};
pub use account_store::{AccountStore, DonationRecord, PooledEntry};
pub use base::{AccountId, ReferenceNumber, TransferId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Engine;
pub use entry::{EntryKind, EntryStatus, EntryType, LedgerEntry};
pub use error::{ErrorKind, StoreError, TransactionError};
pub use inbox::{InboxFilter, InboxItem};
pub use journal::{ReconcileReport, TransferRecord, TransferStatus};
pub use limits::{LimitDecision, LimitPolicy, LimitReason, LimitsReport};
pub use receipt::{FeeSchedule, Receipt};
pub use settings::Settings;
pub use store::{DocumentStore, MemoryStore};
pub use transaction::{Operation, OperationKind, Stage, parse_amount};
