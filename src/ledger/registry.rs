//! Account Registry
//!
//! Opens accounts under unique identities and transfers between them by name.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::debug;

use super::account::{Account, AccountId, AccountSnapshot};
use crate::error::{Error, Result};

/// Registry of named accounts
#[derive(Debug, Default)]
pub struct Ledger {
    /// Accounts by identity
    accounts: DashMap<AccountId, Arc<Account>>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new account.
    ///
    /// Fails with [`Error::InvalidOperation`] if the identity is taken.
    pub fn open(&self, id: impl Into<AccountId>, initial_balance: Decimal) -> Result<Arc<Account>> {
        let id = id.into();
        let account = Arc::new(Account::new(id.clone(), initial_balance)?);

        match self.accounts.entry(id) {
            Entry::Occupied(entry) => Err(Error::invalid_operation(format!(
                "Account {} already exists",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                debug!(account = %entry.key(), balance = %initial_balance, "Opened account");
                entry.insert(Arc::clone(&account));
                Ok(account)
            }
        }
    }

    /// Look up an account
    pub fn account(&self, id: &str) -> Option<Arc<Account>> {
        self.accounts.get(id).map(|a| Arc::clone(a.value()))
    }

    fn require(&self, id: &str) -> Result<Arc<Account>> {
        self.account(id).ok_or_else(|| Error::AccountNotFound(id.to_string()))
    }

    /// Transfer between two registered accounts.
    ///
    /// Returns `Ok(false)` when the source cannot cover the amount.
    pub fn transfer(&self, from: &str, to: &str, amount: Decimal) -> Result<bool> {
        // Resolve both before touching any balance; the map guards are
        // released here so no shard lock is held while balances are locked.
        let source = self.require(from)?;
        let destination = self.require(to)?;
        source.transfer(&destination, amount)
    }

    /// Sum of all balances.
    ///
    /// Accounts are read one at a time, so the total is exact only while no
    /// transfer is in flight.
    pub fn total_balance(&self) -> Decimal {
        self.accounts.iter().map(|entry| entry.value().balance()).sum()
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Check if no account is open
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Snapshot every account, ordered by identity
    pub fn snapshot(&self) -> Vec<AccountSnapshot> {
        let mut accounts: Vec<AccountSnapshot> = self
            .accounts
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }
}

// =============================================================================
// Tests
// =============================================================================
