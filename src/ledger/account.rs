//! Account Types
//!
//! A single account: identity plus a mutex-guarded exact balance.

use std::borrow::Borrow;
use std::fmt;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use super::ensure_positive;
use crate::error::{Error, Result};

/// Account identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new account identity
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// Derived Hash on a single-field tuple struct hashes exactly like the inner str.
impl Borrow<str> for AccountId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// An account with an exact decimal balance
pub struct Account {
    /// Identity
    id: AccountId,
    /// Current balance, never negative
    balance: Mutex<Decimal>,
}

impl Account {
    /// Create an account holding `initial_balance`
    pub fn new(id: impl Into<AccountId>, initial_balance: Decimal) -> Result<Self> {
        let id = id.into();
        if initial_balance < Decimal::ZERO {
            return Err(Error::invalid_argument(format!(
                "Initial balance of account {} must not be negative, got {}",
                id, initial_balance
            )));
        }

        Ok(Self {
            id,
            balance: Mutex::new(initial_balance),
        })
    }

    /// Get the account identity
    pub fn id(&self) -> &AccountId {
        &self.id
    }

    /// Get the current balance
    pub fn balance(&self) -> Decimal {
        *self.balance.lock()
    }

    /// Add `amount` to the balance.
    pub fn deposit(&self, amount: Decimal) -> Result<()> {
        ensure_positive(amount)?;

        let mut balance = self.balance.lock();
        let updated = balance.checked_add(amount).ok_or_else(|| {
            Error::invalid_argument(format!(
                "Deposit of {} overflows the balance of account {}",
                amount, self.id
            ))
        })?;
        *balance = updated;

        trace!(account = %self.id, %amount, balance = %updated, "deposit");
        Ok(())
    }

    /// Withdraw `amount` if the balance covers it.
    ///
    /// Returns `Ok(false)` and leaves the balance untouched when funds are
    /// insufficient.
    pub fn withdraw(&self, amount: Decimal) -> Result<bool> {
        ensure_positive(amount)?;

        let mut balance = self.balance.lock();
        if *balance < amount {
            trace!(account = %self.id, %amount, "withdraw declined");
            return Ok(false);
        }
        *balance -= amount;
        let remaining = *balance;

        trace!(account = %self.id, %amount, balance = %remaining, "withdraw");
        Ok(true)
    }

    /// Move `amount` from this account to `destination`.
    ///
    /// Returns `Ok(false)` when this account cannot cover the amount. The two
    /// legs lock one account at a time, so opposing transfers cannot deadlock.
    pub fn transfer(&self, destination: &Account, amount: Decimal) -> Result<bool> {
        if !self.withdraw(amount)? {
            return Ok(false);
        }

        if let Err(err) = destination.deposit(amount) {
            // Put the funds back so nothing is destroyed.
            if let Err(refund_err) = self.deposit(amount) {
                error!(
                    account = %self.id,
                    %amount,
                    "Failed to refund aborted transfer: {}",
                    refund_err
                );
            }
            return Err(err);
        }

        trace!(from = %self.id, to = %destination.id, %amount, "transfer");
        Ok(true)
    }

    /// Capture the identity and balance
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            id: self.id.clone(),
            balance: self.balance(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("balance", &self.balance())
            .finish()
    }
}

/// Point-in-time view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Identity
    pub id: AccountId,
    /// Balance at capture time
    pub balance: Decimal,
}

// =============================================================================
// Tests
// =============================================================================
