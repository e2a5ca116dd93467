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

//! Property-based tests for the ledger engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! operations, accepted or refused.

use proptest::prelude::*;
use rust_decimal::Decimal;
use wallet_ledger::{AccountId, Engine, EntryType, InboxFilter, Operation};

const ACCOUNTS: [&str; 3] = ["alice", "bob", "carol"];

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Amount as typed by a user: 0.01 to 6000.00.
fn arb_amount() -> impl Strategy<Value = String> {
    (1i64..=600_000i64).prop_map(|cents| Decimal::new(cents, 2).to_string())
}

fn arb_account() -> impl Strategy<Value = AccountId> {
    (0usize..ACCOUNTS.len()).prop_map(|i| AccountId::from(ACCOUNTS[i]))
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (arb_account(), arb_amount())
            .prop_map(|(account, amount)| Operation::Deposit { account, amount }),
        3 => (arb_account(), arb_account(), arb_amount())
            .prop_map(|(account, to, amount)| Operation::Transfer { account, to, amount }),
        1 => (arb_account(), prop::sample::select(vec!["meralco", "globe", "bir"]), arb_amount())
            .prop_map(|(account, biller, amount)| Operation::BillPayment {
                account,
                biller: biller.to_string(),
                amount,
            }),
        1 => (arb_account(), prop::sample::select(vec!["food", "education", "humanity"]), arb_amount())
            .prop_map(|(account, cause, amount)| Operation::Donation {
                account,
                cause: cause.to_string(),
                amount,
            }),
        1 => (arb_account(), prop::sample::select(vec!["money_market", "equities"]), arb_amount())
            .prop_map(|(account, instrument, amount)| Operation::Investment {
                account,
                instrument: instrument.to_string(),
                amount,
            }),
    ]
}

fn engine_after(operations: &[Operation]) -> Engine {
    let engine = Engine::in_memory();
    for name in ACCOUNTS {
        engine.open_account(&AccountId::from(name)).unwrap();
    }
    for operation in operations {
        let _ = engine.process(operation.clone());
    }
    engine
}

// =============================================================================
// Ledger Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Stored balance equals the replay of the entries and is never negative.
    #[test]
    fn balance_matches_replay(
        operations in prop::collection::vec(arb_operation(), 1..40),
    ) {
        let engine = engine_after(&operations);
        for account in engine.accounts().unwrap() {
            prop_assert_eq!(account.balance(), account.replayed_balance());
            prop_assert!(account.balance() >= Decimal::ZERO);
        }
    }

    /// Money only enters through deposits and leaves through spending;
    /// transfers move it between accounts.
    #[test]
    fn money_is_conserved(
        operations in prop::collection::vec(arb_operation(), 1..40),
    ) {
        let engine = engine_after(&operations);
        let accounts = engine.accounts().unwrap();

        let mut deposited = Decimal::ZERO;
        let mut spent = Decimal::ZERO;
        let mut sent = Decimal::ZERO;
        let mut received = Decimal::ZERO;
        for entry in accounts.iter().flat_map(|a| a.transactions()) {
            match entry.entry_type() {
                EntryType::Deposit => deposited += entry.amount,
                EntryType::Transfer => sent += entry.amount,
                EntryType::Received => received += entry.amount,
                _ => spent += entry.amount,
            }
        }
        let held: Decimal = accounts.iter().map(|a| a.balance()).sum();

        prop_assert_eq!(sent, received);
        prop_assert_eq!(held, deposited - spent);
    }

    /// Holdings mirror the investment entries.
    #[test]
    fn portfolio_matches_investment_entries(
        operations in prop::collection::vec(arb_operation(), 1..40),
    ) {
        let engine = engine_after(&operations);
        for account in engine.accounts().unwrap() {
            let invested: Decimal = account
                .transactions()
                .iter()
                .filter(|e| e.entry_type() == EntryType::Investment)
                .map(|e| e.amount)
                .sum();
            prop_assert_eq!(account.portfolio_value(), invested);
        }
    }
}

// =============================================================================
// Inbox Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The feed is newest first and the tabs partition it.
    #[test]
    fn inbox_is_ordered_and_partitioned(
        operations in prop::collection::vec(arb_operation(), 1..40),
    ) {
        let engine = engine_after(&operations);
        for name in ACCOUNTS {
            let id = AccountId::from(name);
            let all = engine.inbox(&id, InboxFilter::All).unwrap();
            prop_assert!(all.windows(2).all(|w| w[0].entry.timestamp >= w[1].entry.timestamp));

            let transactions = engine.inbox(&id, InboxFilter::Transactions).unwrap();
            let others = engine.inbox(&id, InboxFilter::Others).unwrap();
            let received = all
                .iter()
                .filter(|i| i.entry.entry_type() == EntryType::Received)
                .count();
            prop_assert_eq!(transactions.len() + others.len() + received, all.len());
        }
    }
}
