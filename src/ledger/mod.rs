//! Ledger - Accounts with Atomic Transfers
//!
//! Named accounts holding exact decimal balances. Every balance mutation is a
//! single critical section over the account's own lock, so the read of the
//! current balance and the write of the new one can never be interleaved with
//! another operation on the same account.
//!
//! # Design
//!
//! - One `parking_lot::Mutex<Decimal>` per account
//! - Withdraw performs check and decrement under the same guard
//! - Transfer is withdraw-then-deposit; each leg is atomic and money is
//!   conserved, but the pair is not one cross-account transaction
//! - [`Ledger`] registers accounts by identity in a `DashMap`
//!
//! ```text
//! Ledger ──▶ DashMap<AccountId, Arc<Account>>
//!                                 │
//!                                 └── Mutex<Decimal>
//! ```

mod account;
mod registry;

#[cfg(test)]
mod proptest;

pub use account::{Account, AccountId, AccountSnapshot};
pub use registry::Ledger;

use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Reject zero and negative amounts.
pub(crate) fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::invalid_argument(format!(
            "Amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}
