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

//! Transfer journal.
//!
//! A transfer touches two account records with two independent writes. Before
//! either write, the engine pushes a `pending` record under `transfers/`; both
//! ledger legs carry its key; once both writes land the record is marked
//! `committed`.
//!
//! ```text
//!  Pending ──both legs written──► Committed
//!     │
//!     └──no leg written (reconcile)──► Aborted
//! ```
//!
//! A record left `pending` means the operation stopped somewhere between the
//! journal write and the commit. [`Engine::reconcile`](crate::Engine::reconcile)
//! inspects both accounts and finishes or aborts it.

use crate::base::{AccountId, ReferenceNumber, TransferId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
    pub reference: ReferenceNumber,
    pub timestamp: DateTime<Utc>,
    pub status: TransferStatus,
}

impl TransferRecord {
    pub fn is_pending(&self) -> bool {
        self.status == TransferStatus::Pending
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Both legs were already written; only the status was missing.
    pub committed: Vec<TransferId>,
    /// One leg was missing and has been replayed.
    pub repaired: Vec<TransferId>,
    /// Neither leg was written.
    pub aborted: Vec<TransferId>,
    /// Could not be finished; still pending.
    pub unresolved: Vec<TransferId>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.repaired.is_empty() && self.unresolved.is_empty()
    }

    pub fn examined(&self) -> usize {
        self.committed.len() + self.repaired.len() + self.aborted.len() + self.unresolved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn record_serializes_status_lowercase() {
        let record = TransferRecord {
            from: "alice".into(),
            to: "bob".into(),
            amount: dec!(300),
            reference: ReferenceNumber("1234 5678 9012".into()),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            status: TransferStatus::Pending,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], json!("pending"));
        assert!(record.is_pending());
    }

    #[test]
    fn report_counts() {
        let report = ReconcileReport {
            committed: vec![TransferId("-1".into())],
            aborted: vec![TransferId("-2".into())],
            ..Default::default()
        };
        assert!(report.is_clean());
        assert_eq!(report.examined(), 2);
    }
}
