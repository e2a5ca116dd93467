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

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! The engine serializes operations with one guard per account and a
//! transfer takes both guards in id order. These tests drive the real
//! engine from many threads and let the detector watch the lock graph,
//! which includes the memory store's own lock.

use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;
use wallet_ledger::{AccountId, Engine, ErrorKind, InboxFilter, TransactionError};

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150));
}

fn id(name: &str) -> AccountId {
    AccountId::from(name)
}

fn seeded(accounts: &[(&str, &str)]) -> Arc<Engine> {
    let engine = Engine::in_memory();
    for (name, balance) in accounts {
        engine.open_account(&id(name)).unwrap();
        engine.deposit(&id(name), balance).unwrap();
    }
    Arc::new(engine)
}

fn total(engine: &Engine) -> Decimal {
    engine.accounts().unwrap().iter().map(|a| a.balance()).sum()
}

fn assert_consistent(engine: &Engine) {
    for account in engine.accounts().unwrap() {
        assert_eq!(account.balance(), account.replayed_balance(), "{}", account.id());
        assert!(account.balance() >= Decimal::ZERO);
    }
}

// === Tests ===

/// Two accounts sending to each other in both directions at once.
#[test]
fn no_deadlock_opposite_direction_transfers() {
    let detector = start_deadlock_detector();
    let engine = seeded(&[("alice", "10000"), ("bob", "10000")]);

    let mut handles = vec![];
    for t in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let (from, to) = if t % 2 == 0 { ("alice", "bob") } else { ("bob", "alice") };
            for _ in 0..200 {
                engine.transfer(&id(from), &id(to), "1").unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(total(&engine), dec!(20000));
    assert_eq!(engine.get_account(&id("alice")).unwrap().balance(), dec!(10000));
    assert_consistent(&engine);
}

/// Fifty concurrent withdrawals from a balance that covers only ten.
#[test]
fn no_overdraft_under_contention() {
    let detector = start_deadlock_detector();
    let engine = seeded(&[("alice", "1000"), ("bob", "1")]);
    let succeeded = Arc::new(AtomicU32::new(0));

    let mut handles = vec![];
    for _ in 0..50 {
        let engine = Arc::clone(&engine);
        let succeeded = Arc::clone(&succeeded);
        handles.push(thread::spawn(move || {
            match engine.transfer(&id("alice"), &id("bob"), "100") {
                Ok(_) => {
                    succeeded.fetch_add(1, Ordering::SeqCst);
                }
                Err(err) => assert_eq!(err, TransactionError::InsufficientFunds),
            }
        }));
    }
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(succeeded.load(Ordering::SeqCst), 10);
    assert_eq!(engine.get_account(&id("alice")).unwrap().balance(), dec!(0));
    assert_eq!(engine.get_account(&id("bob")).unwrap().balance(), dec!(1001));
    assert_consistent(&engine);
}

/// Transfers around a ring while readers walk the accounts and feeds.
#[test]
fn no_deadlock_ring_with_readers() {
    let detector = start_deadlock_detector();
    let names = ["a", "b", "c", "d", "e"];
    let engine = seeded(&names.map(|n| (n, "5000")));

    let mut handles = vec![];
    for (i, from) in names.iter().enumerate() {
        let engine = Arc::clone(&engine);
        let to = names[(i + 1) % names.len()];
        let from = *from;
        handles.push(thread::spawn(move || {
            for _ in 0..100 {
                engine.transfer(&id(from), &id(to), "3.25").unwrap();
            }
        }));
    }
    for reader in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for _ in 0..100 {
                let accounts = engine.accounts().unwrap();
                assert_eq!(accounts.len(), 5);
                engine.inbox(&id(names[reader]), InboxFilter::All).unwrap();
                engine.limits(&id(names[reader])).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(total(&engine), dec!(25000));
    for name in names {
        assert_eq!(engine.get_account(&id(name)).unwrap().balance(), dec!(5000));
    }
    assert_consistent(&engine);
}

/// Lock toggling, card issuance and spending on the same account.
#[test]
fn no_deadlock_mixed_operations() {
    let detector = start_deadlock_detector();
    let engine = seeded(&[("alice", "50000"), ("bob", "50000")]);

    let mut handles = vec![];
    {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                engine.set_lock(&id("alice"), i % 2 == 0).unwrap();
            }
            engine.set_lock(&id("alice"), false).unwrap();
        }));
    }
    {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                engine.issue_card(&id("alice")).unwrap();
            }
        }));
    }
    for t in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                let outcome = match t {
                    0 => engine.transfer(&id("alice"), &id("bob"), "10"),
                    1 => engine.pay_bill(&id("alice"), "meralco", "10"),
                    2 => engine.donate(&id("alice"), "food", "10"),
                    _ => engine.transfer(&id("bob"), &id("alice"), "10"),
                };
                if let Err(err) = outcome {
                    assert_eq!(err.kind(), ErrorKind::PolicyRejection);
                    assert_eq!(err, TransactionError::AccountLocked);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    let alice = engine.get_account(&id("alice")).unwrap();
    assert!(!alice.locked());
    assert!(alice.card().is_some());
    assert_consistent(&engine);
}

/// Many threads registering the same id: exactly one wins.
#[test]
fn concurrent_registration_creates_once() {
    let detector = start_deadlock_detector();
    let engine = Arc::new(Engine::in_memory());
    let created = Arc::new(AtomicU32::new(0));

    let mut handles = vec![];
    for _ in 0..20 {
        let engine = Arc::clone(&engine);
        let created = Arc::clone(&created);
        handles.push(thread::spawn(move || match engine.open_account(&id("zoe")) {
            Ok(_) => {
                created.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => assert_eq!(err, TransactionError::AccountExists(id("zoe"))),
        }));
    }
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(engine.accounts().unwrap().len(), 1);
}
