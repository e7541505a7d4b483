//! Property-Based Tests for the Ledger
//!
//! # Test Properties
//!
//! 1. **Conservation**: concurrent transfers inside a closed set of accounts
//!    never change the total balance
//! 2. **No Overdraft**: no balance is ever negative after any plan
//! 3. **Sequential Agreement**: a single-threaded plan matches a model

#![cfg(test)]

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::{Account, Ledger};

// =============================================================================
// Property Strategies
// =============================================================================

/// One transfer: (source index, destination index, amount in cents).
type Step = (usize, usize, i64);

/// Strategy for initial balances in cents.
fn balances_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..50_000, 2..6)
}

/// Strategy for a transfer plan over `accounts` accounts.
fn plan_strategy(accounts: usize) -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec((0..accounts, 0..accounts, 1i64..20_000), 1..200)
}

/// Strategy for per-thread plans.
fn threaded_plans_strategy() -> impl Strategy<Value = (Vec<i64>, Vec<Vec<Step>>)> {
    balances_strategy().prop_flat_map(|balances| {
        let n = balances.len();
        (
            Just(balances),
            prop::collection::vec(plan_strategy(n), 2..6),
        )
    })
}

fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

fn open_all(balances: &[i64]) -> Ledger {
    let ledger = Ledger::new();
    for (i, balance) in balances.iter().enumerate() {
        ledger.open(format!("acct-{}", i), cents(*balance)).unwrap();
    }
    ledger
}

// =============================================================================
// Conservation Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: the total is unchanged by any concurrent transfer plan.
    #[test]
    fn prop_concurrent_transfers_conserve_total((balances, plans) in threaded_plans_strategy()) {
        let ledger = Arc::new(open_all(&balances));
        let expected: Decimal = balances.iter().map(|b| cents(*b)).sum();

        let handles: Vec<_> = plans
            .into_iter()
            .map(|plan| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for (from, to, amount) in plan {
                        ledger
                            .transfer(
                                &format!("acct-{}", from),
                                &format!("acct-{}", to),
                                cents(amount),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        prop_assert_eq!(ledger.total_balance(), expected);
        for snapshot in ledger.snapshot() {
            prop_assert!(snapshot.balance >= Decimal::ZERO);
        }
    }

    /// Property: a sequential plan produces exactly the balances of a plain model.
    #[test]
    fn prop_sequential_plan_matches_model(
        balances in balances_strategy(),
        raw_plan in plan_strategy(8),
    ) {
        let n = balances.len();
        let accounts: Vec<Account> = balances
            .iter()
            .enumerate()
            .map(|(i, b)| Account::new(format!("acct-{}", i), cents(*b)).unwrap())
            .collect();
        let mut model = balances.clone();

        for (from, to, amount) in raw_plan {
            let (from, to) = (from % n, to % n);
            let moved = accounts[from].transfer(&accounts[to], cents(amount)).unwrap();

            prop_assert_eq!(moved, model[from] >= amount);
            if moved {
                model[from] -= amount;
                model[to] += amount;
            }
        }

        for (account, expected) in accounts.iter().zip(model) {
            prop_assert_eq!(account.balance(), cents(expected));
        }
    }
}
