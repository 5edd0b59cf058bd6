use std::{
    collections::{BTreeMap, btree_map::Entry},
    sync::Arc,
};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    account::{Account, AccountError, AccountId},
    event::EventSink,
    latency::{Delay, LatencyRange, RandomDelay},
    transfer::Transfer,
};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Account {0} does not exist")]
    UnknownAccount(AccountId),
    #[error("Account {0} is listed more than once")]
    DuplicateAccount(AccountId),
    #[error("Account {id} cannot be opened: {source}")]
    InvalidAccount {
        id: AccountId,
        #[source]
        source: AccountError,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerConfig {
    pub latency: LatencyRange,
}

/// Sole owner of every account, keyed and ordered by account id.
///
/// The account set is fixed at construction, so lookups need no locking and
/// the ledger can be shared between threads by reference.
pub struct Ledger {
    accounts: BTreeMap<AccountId, Account>,
    delay: Box<dyn Delay>,
    sink: Arc<dyn EventSink>,
}

impl Ledger {
    /// Creates a ledger whose transfers pause for a random duration within
    /// the configured latency range.
    pub fn new(
        config: &LedgerConfig,
        accounts: impl IntoIterator<Item = (AccountId, Decimal)>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, LedgerError> {
        Self::with_delay(accounts, RandomDelay::new(config.latency), sink)
    }

    pub fn with_delay(
        accounts: impl IntoIterator<Item = (AccountId, Decimal)>,
        delay: impl Delay + 'static,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, LedgerError> {
        let mut registry = BTreeMap::new();
        for (id, balance) in accounts {
            match registry.entry(id) {
                Entry::Occupied(entry) => {
                    return Err(LedgerError::DuplicateAccount(entry.key().clone()));
                }
                Entry::Vacant(entry) => {
                    let account = Account::new(entry.key().clone(), balance).map_err(|source| {
                        LedgerError::InvalidAccount {
                            id: entry.key().clone(),
                            source,
                        }
                    })?;
                    entry.insert(account);
                }
            }
        }
        Ok(Self {
            accounts: registry,
            delay: Box::new(delay),
            sink,
        })
    }

    pub fn account(&self, id: &AccountId) -> Result<&Account, LedgerError> {
        self.accounts
            .get(id)
            .ok_or_else(|| LedgerError::UnknownAccount(id.clone()))
    }

    pub fn balance(&self, id: &AccountId) -> Result<Decimal, LedgerError> {
        self.account(id).map(Account::balance)
    }

    /// Accounts in ascending id order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Prepares a transfer between two registered accounts.
    ///
    /// Fails only when an id is unknown; amount and same-account checks
    /// happen when the transfer is executed.
    pub fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<Transfer<'_>, LedgerError> {
        let source = self.account(from)?;
        let destination = self.account(to)?;
        Ok(Transfer::new(
            source,
            destination,
            amount,
            self.delay.as_ref(),
            self.sink.as_ref(),
        ))
    }

    /// Balances of all accounts, read while every guard is held.
    pub fn snapshot(&self) -> Vec<(AccountId, Decimal)> {
        // BTreeMap iteration is the canonical lock order
        let guards: Vec<_> = self.accounts.values().map(Account::lock).collect();
        guards
            .iter()
            .map(|acc| (acc.id().clone(), acc.balance()))
            .collect()
    }

    /// Sum of a consistent snapshot, `None` if it does not fit a `Decimal`.
    pub fn total_balance(&self) -> Option<Decimal> {
        self.snapshot()
            .into_iter()
            .try_fold(Decimal::ZERO, |total, (_, balance)| total.checked_add(balance))
    }
}
