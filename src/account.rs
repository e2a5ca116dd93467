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

//! Account records.
//!
//! An [`Account`] is a snapshot of `users/{id}` as read from the store. The
//! engine mutates a snapshot in memory (credit, debit, append entry) and then
//! writes the changed fields back through the
//! [`AccountStore`](crate::account_store::AccountStore).
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use wallet_ledger::{Account, AccountId};
//!
//! let account = Account::new(AccountId::from("alice"));
//! assert_eq!(account.balance(), dec!(0));
//! assert!(!account.locked());
//! ```

use crate::base::{AccountId, ReferenceNumber, TransferId};
use crate::catalog::Instrument;
use crate::entry::{EntryType, LedgerEntry};
use crate::limits::{UsageCounter, day_period, month_period};
use crate::TransactionError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lock sub-record toggled from the lock-card view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockState {
    #[serde(default)]
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Issued debit card. Written once, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub card_number: String,
    pub expiration_date: String,
    pub created_at: DateTime<Utc>,
}

/// One investment purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub instrument: Instrument,
    pub amount: Decimal,
    pub reference: ReferenceNumber,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "username")]
    id: AccountId,
    #[serde(default)]
    balance: Decimal,
    #[serde(default)]
    daily_outgoing: UsageCounter,
    #[serde(default)]
    monthly_incoming: UsageCounter,
    #[serde(default)]
    lock: LockState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    card: Option<Card>,
    #[serde(default)]
    transactions: Vec<LedgerEntry>,
    #[serde(default)]
    portfolio_value: Decimal,
    #[serde(default)]
    investments: Vec<Holding>,
    #[serde(default)]
    inbox_read: BTreeMap<String, bool>,
    /// Bumped on every ledger write; used to detect concurrent writers.
    #[serde(default)]
    revision: u64,
}

impl Account {
    pub const DECIMAL_PRECISION: u32 = 2;

    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            balance: Decimal::ZERO,
            daily_outgoing: UsageCounter::default(),
            monthly_incoming: UsageCounter::default(),
            lock: LockState::default(),
            card: None,
            transactions: Vec::new(),
            portfolio_value: Decimal::ZERO,
            investments: Vec::new(),
            inbox_read: BTreeMap::new(),
            revision: 0,
        }
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn daily_outgoing(&self) -> &UsageCounter {
        &self.daily_outgoing
    }

    pub fn monthly_incoming(&self) -> &UsageCounter {
        &self.monthly_incoming
    }

    pub fn locked(&self) -> bool {
        self.lock.status
    }

    pub fn lock_state(&self) -> &LockState {
        &self.lock
    }

    pub fn card(&self) -> Option<&Card> {
        self.card.as_ref()
    }

    /// Ledger entries in insertion (chronological) order.
    pub fn transactions(&self) -> &[LedgerEntry] {
        &self.transactions
    }

    pub fn portfolio_value(&self) -> Decimal {
        self.portfolio_value
    }

    pub fn investments(&self) -> &[Holding] {
        &self.investments
    }

    pub fn is_read(&self, entry_id: &str) -> bool {
        self.inbox_read.get(entry_id).copied().unwrap_or(false)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Balance rebuilt from the ledger alone.
    ///
    /// Equals [`balance`](Self::balance) for any account only ever mutated by
    /// the engine.
    pub fn replayed_balance(&self) -> Decimal {
        self.transactions.iter().map(LedgerEntry::signed_amount).sum()
    }

    /// Entry of the given type written for a transfer, if any.
    pub fn transfer_leg(&self, transfer_id: &TransferId, entry_type: EntryType) -> Option<&LedgerEntry> {
        self.transactions
            .iter()
            .find(|e| e.transfer_id.as_ref() == Some(transfer_id) && e.entry_type() == entry_type)
    }

    /// Id for the next appended entry.
    pub(crate) fn next_entry_id(&self) -> String {
        format!("e{:06}", self.transactions.len() + 1)
    }

    /// Timestamp for the next entry: never earlier than the last one.
    pub(crate) fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.transactions
            .last()
            .map_or(now, |last| last.timestamp.max(now))
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
        debug_assert!(
            self.transactions
                .windows(2)
                .all(|pair| pair[0].timestamp <= pair[1].timestamp),
            "Invariant violated: ledger timestamps went backwards"
        );
    }

    /// Increases the balance.
    pub(crate) fn credit(&mut self, amount: Decimal) -> Result<(), TransactionError> {
        if amount <= Decimal::ZERO {
            return Err(TransactionError::InvalidAmount);
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(TransactionError::InvalidAmount)?;
        self.assert_invariants();
        Ok(())
    }

    /// Decreases the balance.
    pub(crate) fn debit(&mut self, amount: Decimal) -> Result<(), TransactionError> {
        if amount <= Decimal::ZERO {
            return Err(TransactionError::InvalidAmount);
        }
        if self.balance < amount {
            return Err(TransactionError::InsufficientFunds);
        }
        self.balance -= amount;
        self.assert_invariants();
        Ok(())
    }

    /// Appends an entry whose balance effect has already been applied.
    pub(crate) fn record(&mut self, entry: LedgerEntry) {
        self.transactions.push(entry);
        self.assert_invariants();
    }

    pub(crate) fn record_outgoing(&mut self, amount: Decimal, at: DateTime<Utc>) {
        self.daily_outgoing.add(day_period(at), amount);
    }

    pub(crate) fn record_incoming(&mut self, amount: Decimal, at: DateTime<Utc>) {
        self.monthly_incoming.add(month_period(at), amount);
    }

    pub(crate) fn add_holding(&mut self, holding: Holding) {
        self.portfolio_value = self.portfolio_value.saturating_add(holding.amount);
        self.investments.push(holding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryKind, EntryStatus};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn entry(id: &str, kind: EntryKind, amount: Decimal, minute: u32) -> LedgerEntry {
        LedgerEntry {
            id: id.into(),
            kind,
            amount,
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, minute, 0).unwrap(),
            status: EntryStatus::Completed,
            reference: ReferenceNumber("1234 5678 9012".into()),
            transfer_id: None,
        }
    }

    #[test]
    fn debit_insufficient_returns_error() {
        let mut account = Account::new(AccountId::from("carol"));
        account.credit(dec!(100)).unwrap();

        assert_eq!(account.debit(dec!(150)), Err(TransactionError::InsufficientFunds));
        assert_eq!(account.balance(), dec!(100));
    }

    #[test]
    fn non_positive_amounts_rejected() {
        let mut account = Account::new(AccountId::from("a"));
        assert_eq!(account.credit(Decimal::ZERO), Err(TransactionError::InvalidAmount));
        assert_eq!(account.debit(dec!(-1)), Err(TransactionError::InvalidAmount));
    }

    #[test]
    fn credit_past_decimal_range_leaves_balance() {
        let mut account = Account::new(AccountId::from("a"));
        account.credit(Decimal::MAX).unwrap();

        assert_eq!(account.credit(dec!(1)), Err(TransactionError::InvalidAmount));
        assert_eq!(account.balance(), Decimal::MAX);
    }

    #[test]
    fn replayed_balance_matches_applied_entries() {
        let mut account = Account::new(AccountId::from("alice"));
        account.credit(dec!(1000)).unwrap();
        account.record(entry("e000001", EntryKind::Deposit, dec!(1000), 0));
        account.debit(dec!(300)).unwrap();
        account.record(entry(
            "e000002",
            EntryKind::Transfer { to: "bob".into() },
            dec!(300),
            1,
        ));

        assert_eq!(account.balance(), dec!(700));
        assert_eq!(account.replayed_balance(), dec!(700));
        assert_eq!(account.next_entry_id(), "e000003");
    }

    #[test]
    fn next_timestamp_never_goes_backwards() {
        let mut account = Account::new(AccountId::from("a"));
        account.credit(dec!(1)).unwrap();
        account.record(entry("e000001", EntryKind::Deposit, dec!(1), 30));

        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 0, 10, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap();
        assert_eq!(account.next_timestamp(earlier), account.transactions()[0].timestamp);
        assert_eq!(account.next_timestamp(later), later);
    }

    #[test]
    fn finds_transfer_leg() {
        let mut account = Account::new(AccountId::from("bob"));
        let mut received = entry("e000001", EntryKind::Received { from: "alice".into() }, dec!(5), 0);
        received.transfer_id = Some(TransferId("-000000000001".into()));
        account.credit(dec!(5)).unwrap();
        account.record(received);

        let id = TransferId("-000000000001".into());
        assert!(account.transfer_leg(&id, EntryType::Received).is_some());
        assert!(account.transfer_leg(&id, EntryType::Transfer).is_none());
    }

    #[test]
    fn holdings_accumulate_into_portfolio() {
        let mut account = Account::new(AccountId::from("a"));
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        for amount in [dec!(1000), dec!(500)] {
            account.add_holding(Holding {
                instrument: Instrument::MoneyMarket,
                amount,
                reference: ReferenceNumber("1111 1111 1111".into()),
                timestamp: at,
            });
        }
        assert_eq!(account.portfolio_value(), dec!(1500));
        assert_eq!(account.investments().len(), 2);
    }

    #[test]
    fn reads_sparse_legacy_record() {
        // Older records only carry a username and balance.
        let value = json!({"username": "dave", "balance": "50"});
        let account: Account = serde_json::from_value(value).unwrap();

        assert_eq!(account.id(), &AccountId::from("dave"));
        assert_eq!(account.balance(), dec!(50));
        assert!(!account.locked());
        assert!(account.transactions().is_empty());
        assert_eq!(account.revision(), 0);
    }

    #[test]
    fn serializes_camel_case_fields() {
        let mut account = Account::new(AccountId::from("erin"));
        account.lock.status = true;
        let value = serde_json::to_value(&account).unwrap();

        assert_eq!(value["username"], json!("erin"));
        assert_eq!(value["lock"]["status"], json!(true));
        assert!(value.get("dailyOutgoing").is_some());
        assert!(value.get("monthlyIncoming").is_some());
        assert!(value.get("card").is_none());
    }
}
