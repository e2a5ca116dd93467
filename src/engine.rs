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

//! Transaction processing engine.
//!
//! The [`Engine`] validates, checks, applies and records every monetary
//! operation on top of a [`DocumentStore`], and hands back a [`Receipt`].
//!
//! # Operations
//!
//! - **Deposits**: credit the account. Gated by the lock only.
//! - **Transfers**: debit the sender, credit the recipient. Gated by the
//!   sender's lock, the sender's daily outgoing ceiling and the recipient's
//!   monthly incoming ceiling.
//! - **Bill payments**: debit against the biller catalog; nobody is credited.
//! - **Donations**: debit plus an append to the global donation pool.
//! - **Investments**: debit that also grows the portfolio; the amount must
//!   meet the instrument minimum.
//!
//! # Thread Safety
//!
//! Operations on one account are serialized by a per-account guard held from
//! the read to the write. Transfers take both guards in id order so opposite
//! transfers cannot deadlock. Writers outside this engine are caught by the
//! revision check in [`AccountStore::write`].
//!
//! # Transfers
//!
//! The store has no multi-key transactions, so a transfer is journaled:
//! a `pending` record is pushed first, both legs carry its key, and the record
//! is marked `committed` once both accounts are written. [`Engine::reconcile`]
//! finishes whatever a crash or store failure left pending.

use crate::account::{Account, Card, Holding, LockState};
use crate::account_store::{AccountStore, AccountUpdate, DonationRecord};
use crate::base::{AccountId, ReferenceNumber, TransferId};
use crate::catalog::{Cause, Instrument, find_biller};
use crate::entry::{EntryKind, EntryStatus, EntryType, LedgerEntry};
use crate::error::ErrorKind;
use crate::inbox::{self, InboxFilter, InboxItem};
use crate::journal::{ReconcileReport, TransferRecord, TransferStatus};
use crate::limits::{LimitPolicy, LimitsReport};
use crate::lock;
use crate::receipt::{FeeSchedule, Receipt, build_receipt};
use crate::reference::{CARD_EXPIRATION, RandomReferences, ReferenceGenerator, generate_card_number};
use crate::store::{DocumentStore, MemoryStore};
use crate::transaction::{Operation, OperationKind, Stage, parse_amount};
use crate::TransactionError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Ledger engine over a document store.
///
/// # Invariants
///
/// - An account's balance equals the signed sum of its ledger entries.
/// - No operation leaves a balance negative.
/// - A locked account never gains an entry it initiated.
/// - Both legs of a transfer share the amount, the reference, the timestamp
///   and the journal key.
pub struct Engine<S: DocumentStore = MemoryStore> {
    accounts: AccountStore<S>,
    limits: LimitPolicy,
    fees: FeeSchedule,
    references: Box<dyn ReferenceGenerator>,
    /// Per-account single-writer guards.
    guards: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl Engine<MemoryStore> {
    /// Engine over a fresh in-memory store with default policies.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl Default for Engine<MemoryStore> {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn new_entry(
    account: &Account,
    kind: EntryKind,
    amount: Decimal,
    timestamp: DateTime<Utc>,
    reference: ReferenceNumber,
    transfer_id: Option<TransferId>,
) -> LedgerEntry {
    LedgerEntry {
        id: account.next_entry_id(),
        kind,
        amount,
        timestamp,
        status: EntryStatus::Completed,
        reference,
        transfer_id,
    }
}

fn log_failure(kind: OperationKind, account: &AccountId, err: &TransactionError) {
    match err.kind() {
        ErrorKind::StoreFailure => {
            tracing::error!(%account, operation = %kind, error = %err, "operation failed")
        }
        ErrorKind::Validation | ErrorKind::PolicyRejection => {
            tracing::warn!(%account, operation = %kind, error = %err, "operation rejected")
        }
    }
}

impl<S: DocumentStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self {
            accounts: AccountStore::new(store),
            limits: LimitPolicy::default(),
            fees: FeeSchedule::default(),
            references: Box::new(RandomReferences),
            guards: DashMap::new(),
        }
    }

    pub fn with_limits(mut self, limits: LimitPolicy) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_references(mut self, references: impl ReferenceGenerator + 'static) -> Self {
        self.references = Box::new(references);
        self
    }

    pub fn store(&self) -> &S {
        self.accounts.store()
    }

    pub fn limit_policy(&self) -> &LimitPolicy {
        &self.limits
    }

    fn guard(&self, id: &AccountId) -> Arc<Mutex<()>> {
        // Clone the Arc out so the map shard is released before locking.
        self.guards.entry(id.clone()).or_default().clone()
    }

    /// Processes one operation and returns its receipt.
    ///
    /// # Errors
    ///
    /// - Validation errors ([`ErrorKind::Validation`]) before anything is read.
    /// - [`TransactionError::AccountNotFound`] / [`TransactionError::RecipientNotFound`].
    /// - [`TransactionError::AccountLocked`] if the initiating account is locked.
    /// - [`TransactionError::LimitExceeded`] for the daily outgoing or monthly
    ///   incoming ceiling.
    /// - [`TransactionError::InsufficientFunds`] when a debit exceeds the balance.
    /// - [`TransactionError::ConcurrentModification`] and
    ///   [`TransactionError::Store`] when the store write fails; the operation
    ///   may then be partially recorded.
    pub fn process(&self, operation: Operation) -> Result<Receipt, TransactionError> {
        let kind = operation.kind();
        let result = match &operation {
            Operation::Deposit { account, amount } => self.run_deposit(account, amount),
            Operation::Transfer {
                account,
                to,
                amount,
            } => self.run_transfer(account, to, amount),
            Operation::BillPayment {
                account,
                biller,
                amount,
            } => self.run_bill_payment(account, biller, amount),
            Operation::Donation {
                account,
                cause,
                amount,
            } => self.run_donation(account, cause, amount),
            Operation::Investment {
                account,
                instrument,
                amount,
            } => self.run_investment(account, instrument, amount),
        };
        match &result {
            Ok(receipt) => tracing::info!(
                account = %operation.account(),
                operation = %kind,
                amount = %receipt.gross_amount,
                reference = %receipt.reference,
                "operation completed"
            ),
            Err(err) => log_failure(kind, operation.account(), err),
        }
        result
    }

    pub fn deposit(&self, account: &AccountId, amount: &str) -> Result<Receipt, TransactionError> {
        self.process(Operation::Deposit {
            account: account.clone(),
            amount: amount.to_string(),
        })
    }

    pub fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: &str,
    ) -> Result<Receipt, TransactionError> {
        self.process(Operation::Transfer {
            account: from.clone(),
            to: to.clone(),
            amount: amount.to_string(),
        })
    }

    pub fn pay_bill(
        &self,
        account: &AccountId,
        biller: &str,
        amount: &str,
    ) -> Result<Receipt, TransactionError> {
        self.process(Operation::BillPayment {
            account: account.clone(),
            biller: biller.to_string(),
            amount: amount.to_string(),
        })
    }

    pub fn donate(
        &self,
        account: &AccountId,
        cause: &str,
        amount: &str,
    ) -> Result<Receipt, TransactionError> {
        self.process(Operation::Donation {
            account: account.clone(),
            cause: cause.to_string(),
            amount: amount.to_string(),
        })
    }

    pub fn invest(
        &self,
        account: &AccountId,
        instrument: &str,
        amount: &str,
    ) -> Result<Receipt, TransactionError> {
        self.process(Operation::Investment {
            account: account.clone(),
            instrument: instrument.to_string(),
            amount: amount.to_string(),
        })
    }

    fn run_deposit(&self, id: &AccountId, amount: &str) -> Result<Receipt, TransactionError> {
        let amount = parse_amount(amount)?;
        let (account, entry) =
            self.apply_own(id, OperationKind::Deposit, amount, EntryKind::Deposit, |_, _| {})?;
        Ok(build_receipt(id, &entry, &self.fees, account.balance()))
    }

    fn run_bill_payment(
        &self,
        id: &AccountId,
        biller: &str,
        amount: &str,
    ) -> Result<Receipt, TransactionError> {
        let amount = parse_amount(amount)?;
        let biller = find_biller(biller)?;
        let kind = EntryKind::Bill {
            biller: biller.name.to_string(),
            category: biller.category,
        };
        let (account, entry) = self.apply_own(id, OperationKind::BillPayment, amount, kind, |_, _| {})?;
        Ok(build_receipt(id, &entry, &self.fees, account.balance()))
    }

    fn run_donation(&self, id: &AccountId, cause: &str, amount: &str) -> Result<Receipt, TransactionError> {
        let amount = parse_amount(amount)?;
        let cause = Cause::parse(cause)?;
        let kind = EntryKind::Donation {
            category: cause,
            title: cause.title().to_string(),
        };
        let (account, entry) = self.apply_own(id, OperationKind::Donation, amount, kind, |_, _| {})?;

        // Second, independent write: the account is already debited if this fails.
        self.accounts.push_donation(&DonationRecord {
            user_id: id.clone(),
            category: cause,
            title: cause.title().to_string(),
            amount,
            timestamp: entry.timestamp,
        })?;
        Ok(build_receipt(id, &entry, &self.fees, account.balance()))
    }

    fn run_investment(
        &self,
        id: &AccountId,
        instrument: &str,
        amount: &str,
    ) -> Result<Receipt, TransactionError> {
        let amount = parse_amount(amount)?;
        let instrument = Instrument::parse(instrument)?;
        instrument.check_minimum(amount)?;

        let (account, entry) = self.apply_own(
            id,
            OperationKind::Investment,
            amount,
            EntryKind::Investment { instrument },
            |account, entry| {
                account.add_holding(Holding {
                    instrument,
                    amount: entry.amount,
                    reference: entry.reference.clone(),
                    timestamp: entry.timestamp,
                })
            },
        )?;
        Ok(build_receipt(id, &entry, &self.fees, account.balance()))
    }

    /// Check, apply and record an operation touching only `id`.
    ///
    /// `extend` runs after the balance change, before the write, for fields
    /// that travel in the same update (investment holdings).
    fn apply_own(
        &self,
        id: &AccountId,
        kind: OperationKind,
        amount: Decimal,
        entry_kind: EntryKind,
        extend: impl FnOnce(&mut Account, &LedgerEntry),
    ) -> Result<(Account, LedgerEntry), TransactionError> {
        let guard = self.guard(id);
        let _held = guard.lock();

        // Checking
        let mut account = self.accounts.read(id, Stage::Checking)?;
        lock::gate(&account)?;
        let now = self.accounts.now();
        if kind.is_outgoing() {
            self.limits.check_outgoing(&account, amount, now).into_result()?;
            if account.balance() < amount {
                return Err(TransactionError::InsufficientFunds);
            }
        }

        // Applying
        if kind.is_outgoing() {
            account.debit(amount)?;
            account.record_outgoing(amount, now);
        } else {
            self.note_wallet_ceiling(&account, amount);
            account.credit(amount)?;
            account.record_incoming(amount, now);
        }

        // Recording
        let entry = new_entry(
            &account,
            entry_kind,
            amount,
            account.next_timestamp(now),
            self.references.generate(),
            None,
        );
        extend(&mut account, &entry);
        account.record(entry.clone());
        self.accounts.write(id, AccountUpdate::ledger(&account))?;
        Ok((account, entry))
    }

    fn note_wallet_ceiling(&self, account: &Account, amount: Decimal) {
        if !self.limits.check_wallet(account, amount).is_allowed() {
            tracing::info!(account = %account.id(), %amount, "credit leaves balance over wallet limit");
        }
    }

    fn run_transfer(&self, from: &AccountId, to: &AccountId, amount: &str) -> Result<Receipt, TransactionError> {
        let amount = parse_amount(amount)?;
        if to.as_str().trim().is_empty() {
            return Err(TransactionError::MissingField("recipient"));
        }
        if from == to {
            return Err(TransactionError::SelfTransfer);
        }

        let (low, high) = if from < to { (from, to) } else { (to, from) };
        let (low, high) = (self.guard(low), self.guard(high));
        let _low = low.lock();
        let _high = high.lock();

        // Checking
        let mut sender = self.accounts.read(from, Stage::Checking)?;
        let mut recipient = self.accounts.read(to, Stage::Checking).map_err(|err| match err {
            TransactionError::AccountNotFound(id) => TransactionError::RecipientNotFound(id),
            other => other,
        })?;
        lock::gate(&sender)?;
        let now = self.accounts.now();
        self.limits.check_outgoing(&sender, amount, now).into_result()?;
        self.limits.check_incoming(&recipient, amount, now).into_result()?;
        if sender.balance() < amount {
            return Err(TransactionError::InsufficientFunds);
        }
        if recipient.balance().checked_add(amount).is_none() {
            return Err(TransactionError::InvalidAmount);
        }
        self.note_wallet_ceiling(&recipient, amount);

        // Applying: the journal record goes first so a half-written transfer
        // can always be found again.
        let timestamp = sender.next_timestamp(now).max(recipient.next_timestamp(now));
        let reference = self.references.generate();
        let transfer_id = self.accounts.open_transfer(&TransferRecord {
            from: from.clone(),
            to: to.clone(),
            amount,
            reference: reference.clone(),
            timestamp,
            status: TransferStatus::Pending,
        })?;
        tracing::debug!(transfer = %transfer_id, %from, %to, %amount, "transfer journaled");

        sender.debit(amount)?;
        sender.record_outgoing(amount, now);
        let sent = new_entry(
            &sender,
            EntryKind::Transfer { to: to.clone() },
            amount,
            timestamp,
            reference.clone(),
            Some(transfer_id.clone()),
        );
        sender.record(sent.clone());

        recipient.credit(amount)?;
        recipient.record_incoming(amount, now);
        let received = new_entry(
            &recipient,
            EntryKind::Received { from: from.clone() },
            amount,
            timestamp,
            reference,
            Some(transfer_id.clone()),
        );
        recipient.record(received);

        // Recording: sender first, then recipient. Two independent writes.
        self.accounts.write(from, AccountUpdate::ledger(&sender))?;
        self.accounts.write(to, AccountUpdate::ledger(&recipient))?;

        // Both legs are durable; a missing status is fixed by reconcile.
        if let Err(err) = self.accounts.set_transfer_status(&transfer_id, TransferStatus::Committed) {
            tracing::warn!(transfer = %transfer_id, error = %err, "transfer left pending");
        }
        Ok(build_receipt(from, &sent, &self.fees, sender.balance()))
    }

    /// Finishes every transfer still marked `pending` in the journal.
    ///
    /// Safe to run repeatedly: legs are looked up by journal key before
    /// anything is replayed.
    ///
    /// | Sender leg | Recipient leg | Action |
    /// |------------|---------------|--------|
    /// | no  | no  | mark `aborted` |
    /// | yes | yes | mark `committed` |
    /// | yes | no  | credit recipient, mark `committed` |
    /// | no  | yes | debit sender if funds allow, else leave pending |
    pub fn reconcile(&self) -> Result<ReconcileReport, TransactionError> {
        let mut report = ReconcileReport::default();
        for (transfer_id, record) in self.accounts.transfers()? {
            if !record.is_pending() {
                continue;
            }
            match self.reconcile_one(&transfer_id, &record) {
                Ok(Some(status)) => match status {
                    Reconciled::Committed => report.committed.push(transfer_id),
                    Reconciled::Repaired => report.repaired.push(transfer_id),
                    Reconciled::Aborted => report.aborted.push(transfer_id),
                },
                Ok(None) => {
                    tracing::warn!(transfer = %transfer_id, from = %record.from, "transfer unresolved");
                    report.unresolved.push(transfer_id);
                }
                Err(err) => {
                    tracing::error!(transfer = %transfer_id, error = %err, "reconciliation failed");
                    report.unresolved.push(transfer_id);
                }
            }
        }
        tracing::info!(
            examined = report.examined(),
            repaired = report.repaired.len(),
            unresolved = report.unresolved.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    fn reconcile_one(
        &self,
        transfer_id: &TransferId,
        record: &TransferRecord,
    ) -> Result<Option<Reconciled>, TransactionError> {
        let (low, high) = if record.from < record.to {
            (&record.from, &record.to)
        } else {
            (&record.to, &record.from)
        };
        let (low, high) = (self.guard(low), self.guard(high));
        let _low = low.lock();
        let _high = high.lock();

        let mut sender = self.accounts.read(&record.from, Stage::Checking)?;
        let mut recipient = self.accounts.read(&record.to, Stage::Checking)?;
        let sent = sender.transfer_leg(transfer_id, EntryType::Transfer).is_some();
        let received = recipient.transfer_leg(transfer_id, EntryType::Received).is_some();
        let now = self.accounts.now();

        let outcome = match (sent, received) {
            (false, false) => {
                self.accounts.set_transfer_status(transfer_id, TransferStatus::Aborted)?;
                return Ok(Some(Reconciled::Aborted));
            }
            (true, true) => Reconciled::Committed,
            (true, false) => {
                tracing::debug!(transfer = %transfer_id, to = %record.to, "replaying credit");
                recipient.credit(record.amount)?;
                recipient.record_incoming(record.amount, now);
                let entry = new_entry(
                    &recipient,
                    EntryKind::Received {
                        from: record.from.clone(),
                    },
                    record.amount,
                    recipient.next_timestamp(record.timestamp),
                    record.reference.clone(),
                    Some(transfer_id.clone()),
                );
                recipient.record(entry);
                self.accounts.write(&record.to, AccountUpdate::ledger(&recipient))?;
                Reconciled::Repaired
            }
            (false, true) => {
                if sender.balance() < record.amount {
                    return Ok(None);
                }
                tracing::debug!(transfer = %transfer_id, from = %record.from, "replaying debit");
                sender.debit(record.amount)?;
                sender.record_outgoing(record.amount, now);
                let entry = new_entry(
                    &sender,
                    EntryKind::Transfer {
                        to: record.to.clone(),
                    },
                    record.amount,
                    sender.next_timestamp(record.timestamp),
                    record.reference.clone(),
                    Some(transfer_id.clone()),
                );
                sender.record(entry);
                self.accounts.write(&record.from, AccountUpdate::ledger(&sender))?;
                Reconciled::Repaired
            }
        };
        self.accounts.set_transfer_status(transfer_id, TransferStatus::Committed)?;
        Ok(Some(outcome))
    }

    /// Registers a new account with a zero balance.
    pub fn open_account(&self, id: &AccountId) -> Result<Account, TransactionError> {
        let guard = self.guard(id);
        let _held = guard.lock();
        let account = self.accounts.create(id)?;
        tracing::info!(account = %id, "account opened");
        Ok(account)
    }

    /// Locks or unlocks the account. Reads and inbound transfers are unaffected.
    pub fn set_lock(&self, id: &AccountId, locked: bool) -> Result<LockState, TransactionError> {
        let guard = self.guard(id);
        let _held = guard.lock();
        self.accounts.read(id, Stage::Checking)?;
        let state = LockState {
            status: locked,
            updated_at: Some(self.accounts.now()),
        };
        self.accounts.write_lock(id, &state)?;
        tracing::info!(account = %id, locked, "lock updated");
        Ok(state)
    }

    pub fn is_locked(&self, id: &AccountId) -> Result<bool, TransactionError> {
        self.accounts.read_lock(id)
    }

    /// Issues the account's card, or returns the one already issued.
    pub fn issue_card(&self, id: &AccountId) -> Result<Card, TransactionError> {
        let guard = self.guard(id);
        let _held = guard.lock();
        let account = self.accounts.read(id, Stage::Checking)?;
        if let Some(card) = account.card() {
            return Ok(card.clone());
        }
        let card = Card {
            card_number: generate_card_number(),
            expiration_date: CARD_EXPIRATION.to_string(),
            created_at: self.accounts.now(),
        };
        self.accounts.write_card(id, &card)?;
        tracing::info!(account = %id, "card issued");
        Ok(card)
    }

    pub fn get_account(&self, id: &AccountId) -> Result<Account, TransactionError> {
        self.accounts.read(id, Stage::Checking)
    }

    /// All accounts, ordered by id.
    pub fn accounts(&self) -> Result<Vec<Account>, TransactionError> {
        self.accounts.list()
    }

    /// Used, limit and remaining amounts for the profile limits view.
    pub fn limits(&self, id: &AccountId) -> Result<LimitsReport, TransactionError> {
        let account = self.accounts.read(id, Stage::Checking)?;
        Ok(self.limits.report(&account, self.accounts.now()))
    }

    /// Inbox feed for the account, newest first.
    pub fn inbox(&self, id: &AccountId, filter: InboxFilter) -> Result<Vec<InboxItem>, TransactionError> {
        let account = self.accounts.read(id, Stage::Checking)?;
        let pooled = self.accounts.pooled_entries(id)?;
        Ok(inbox::project(&account, pooled, filter))
    }

    /// Marks inbox items as read. The ledger itself is untouched.
    ///
    /// Every id must name an item of the account's feed.
    pub fn mark_read(&self, id: &AccountId, entry_ids: &[String]) -> Result<(), TransactionError> {
        let account = self.accounts.read(id, Stage::Checking)?;
        let pooled = self.accounts.pooled_entries(id)?;
        let known = |entry_id: &str| {
            account.transactions().iter().chain(&pooled).any(|e| e.id == entry_id)
        };
        if let Some(unknown) = entry_ids.iter().find(|entry_id| !known(entry_id.as_str())) {
            return Err(TransactionError::InvalidEntryId(unknown.clone()));
        }
        self.accounts.mark_read(id, entry_ids)
    }

    /// The global donation pool, oldest first.
    pub fn donations(&self) -> Result<Vec<DonationRecord>, TransactionError> {
        self.accounts.donations()
    }
}

enum Reconciled {
    Committed,
    Repaired,
    Aborted,
}
