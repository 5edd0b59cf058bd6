use std::{
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{EventSink, LedgerEvent};

/// Account identifier. Its ordering is the canonical lock order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Decimal },
    #[error("Initial balance must not be negative, got {balance}")]
    NegativeBalance { balance: Decimal },
    #[error("Insufficient funds: cannot debit {amount} from balance {balance}")]
    InsufficientFunds { amount: Decimal, balance: Decimal },
    #[error("Crediting {amount} would overflow balance {balance}")]
    BalanceOverflow { amount: Decimal, balance: Decimal },
    #[error("Applying {amount} to balance {balance} would round the result")]
    PrecisionLoss { amount: Decimal, balance: Decimal },
}

/// `balance + amount`, refused when `Decimal` cannot hold the exact sum.
fn exact_add(balance: Decimal, amount: Decimal) -> Result<Decimal, AccountError> {
    let sum = balance
        .checked_add(amount)
        .ok_or(AccountError::BalanceOverflow { amount, balance })?;
    if sum - balance != amount {
        return Err(AccountError::PrecisionLoss { amount, balance });
    }
    Ok(sum)
}

/// `balance - amount` for `0 < amount <= balance`, refused when rounded.
fn exact_sub(balance: Decimal, amount: Decimal) -> Result<Decimal, AccountError> {
    let difference = balance - amount;
    if balance - difference != amount {
        return Err(AccountError::PrecisionLoss { amount, balance });
    }
    Ok(difference)
}

#[derive(Debug)]
pub struct Account {
    id: AccountId,
    balance: Mutex<Decimal>,
}

impl Account {
    pub fn new(id: AccountId, balance: Decimal) -> Result<Self, AccountError> {
        if balance < Decimal::ZERO {
            return Err(AccountError::NegativeBalance { balance });
        }
        Ok(Self {
            id,
            balance: Mutex::new(balance),
        })
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn balance(&self) -> Decimal {
        self.lock().balance()
    }

    /// Acquires the account guard. The balance can only be observed or
    /// changed through the returned view until it is dropped.
    ///
    /// Callers holding more than one guard must take them in ascending id
    /// order.
    pub(crate) fn lock(&self) -> LockedAccount<'_> {
        LockedAccount {
            id: &self.id,
            // mutations are a single assignment after all checks, so the
            // balance is consistent even if a previous holder panicked
            balance: self.balance.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        matches!(
            self.balance.try_lock(),
            Err(std::sync::TryLockError::WouldBlock)
        )
    }

    pub fn debit(
        &self,
        amount: Decimal,
        sink: &dyn EventSink,
    ) -> Result<Decimal, AccountError> {
        self.lock().debit(amount, sink)
    }

    pub fn credit(
        &self,
        amount: Decimal,
        sink: &dyn EventSink,
    ) -> Result<Decimal, AccountError> {
        self.lock().credit(amount, sink)
    }
}

/// An account whose guard is held.
pub(crate) struct LockedAccount<'a> {
    id: &'a AccountId,
    balance: MutexGuard<'a, Decimal>,
}

impl LockedAccount<'_> {
    pub fn id(&self) -> &AccountId {
        self.id
    }

    pub fn balance(&self) -> Decimal {
        *self.balance
    }

    /// Balance after crediting `amount`, without applying it.
    pub fn check_credit(&self, amount: Decimal) -> Result<Decimal, AccountError> {
        exact_add(*self.balance, amount)
    }

    /// Emits exactly one event, whether the debit succeeds or not.
    pub fn debit(
        &mut self,
        amount: Decimal,
        sink: &dyn EventSink,
    ) -> Result<Decimal, AccountError> {
        if amount <= Decimal::ZERO {
            sink.emit(&LedgerEvent::NonPositiveAmount {
                account: self.id.clone(),
                amount,
            });
            return Err(AccountError::NonPositiveAmount { amount });
        }
        let balance = *self.balance;
        if amount > balance {
            sink.emit(&LedgerEvent::InsufficientFunds {
                account: self.id.clone(),
                amount,
                balance,
            });
            return Err(AccountError::InsufficientFunds { amount, balance });
        }
        let new_balance = match exact_sub(balance, amount) {
            Ok(new_balance) => new_balance,
            Err(err) => {
                sink.emit(&LedgerEvent::PrecisionLoss {
                    account: self.id.clone(),
                    amount,
                });
                return Err(err);
            }
        };
        *self.balance = new_balance;
        sink.emit(&LedgerEvent::Debited {
            account: self.id.clone(),
            amount,
            balance: new_balance,
        });
        Ok(new_balance)
    }

    /// Emits exactly one event, whether the credit succeeds or not.
    pub fn credit(
        &mut self,
        amount: Decimal,
        sink: &dyn EventSink,
    ) -> Result<Decimal, AccountError> {
        if amount <= Decimal::ZERO {
            sink.emit(&LedgerEvent::NonPositiveAmount {
                account: self.id.clone(),
                amount,
            });
            return Err(AccountError::NonPositiveAmount { amount });
        }
        let new_balance = match exact_add(*self.balance, amount) {
            Ok(new_balance) => new_balance,
            Err(err) => {
                let account = self.id.clone();
                sink.emit(&match err {
                    AccountError::PrecisionLoss { .. } => {
                        LedgerEvent::PrecisionLoss { account, amount }
                    }
                    _ => LedgerEvent::BalanceOverflow { account, amount },
                });
                return Err(err);
            }
        };
        *self.balance = new_balance;
        sink.emit(&LedgerEvent::Credited {
            account: self.id.clone(),
            amount,
            balance: new_balance,
        });
        Ok(new_balance)
    }
}
