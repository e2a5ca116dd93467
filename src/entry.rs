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

//! Ledger entries.
//!
//! An entry is written once, together with its balance effect, and never
//! changed afterwards. The amount is always a positive magnitude; the
//! direction comes from the entry type:
//!
//! | Type | Direction | Counterparty |
//! |------|-----------|--------------|
//! | `deposit` | credit | - |
//! | `received` | credit | `from` |
//! | `transfer` | debit | `to` |
//! | `bill` | debit | `biller`, `category` |
//! | `donation` | debit | `category`, `title` |
//! | `investment` | debit | `instrument` |

use crate::base::{AccountId, ReferenceNumber, TransferId};
use crate::catalog::{BillCategory, Cause, Instrument};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type-specific part of an entry, serialized under the `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntryKind {
    Deposit,
    Transfer { to: AccountId },
    Received { from: AccountId },
    Bill { biller: String, category: BillCategory },
    Donation { category: Cause, title: String },
    Investment { instrument: Instrument },
}

/// Fieldless view of [`EntryKind`] used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    Deposit,
    Transfer,
    Received,
    Bill,
    Donation,
    Investment,
}

impl EntryType {
    /// Credits increase the balance; everything else is outgoing.
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::Deposit | Self::Received)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Deposit => "Deposit",
            Self::Transfer => "Transfer",
            Self::Received => "Received",
            Self::Bill => "Bill",
            Self::Donation => "Donation",
            Self::Investment => "Investment",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label().to_lowercase())
    }
}

impl EntryKind {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Deposit => EntryType::Deposit,
            Self::Transfer { .. } => EntryType::Transfer,
            Self::Received { .. } => EntryType::Received,
            Self::Bill { .. } => EntryType::Bill,
            Self::Donation { .. } => EntryType::Donation,
            Self::Investment { .. } => EntryType::Investment,
        }
    }

    /// Display name of the other side of the entry, if any.
    pub fn counterparty(&self) -> Option<String> {
        match self {
            Self::Deposit => None,
            Self::Transfer { to } => Some(to.to_string()),
            Self::Received { from } => Some(from.to_string()),
            Self::Bill { biller, .. } => Some(biller.clone()),
            Self::Donation { title, .. } => Some(title.clone()),
            Self::Investment { instrument } => Some(instrument.name().to_string()),
        }
    }
}

/// Lifecycle status of an entry.
///
/// Failed operations are never persisted, so every stored entry is `Completed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Completed,
    Pending,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Unique within the owning account.
    pub id: String,
    #[serde(flatten)]
    pub kind: EntryKind,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: EntryStatus,
    pub reference: ReferenceNumber,
    /// Journal key shared by both legs of a transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<TransferId>,
}

impl LedgerEntry {
    pub fn entry_type(&self) -> EntryType {
        self.kind.entry_type()
    }

    /// Amount with the direction applied: positive for credits.
    pub fn signed_amount(&self) -> Decimal {
        if self.entry_type().is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}
