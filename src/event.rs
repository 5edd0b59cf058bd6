use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use rust_decimal::Decimal;

use crate::{
    account::AccountId,
    transfer::{InvalidReason, RejectReason},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// Everything the ledger reports about balance changes and transfer outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Debited {
        account: AccountId,
        amount: Decimal,
        balance: Decimal,
    },
    Credited {
        account: AccountId,
        amount: Decimal,
        balance: Decimal,
    },
    InsufficientFunds {
        account: AccountId,
        amount: Decimal,
        balance: Decimal,
    },
    NonPositiveAmount {
        account: AccountId,
        amount: Decimal,
    },
    BalanceOverflow {
        account: AccountId,
        amount: Decimal,
    },
    PrecisionLoss {
        account: AccountId,
        amount: Decimal,
    },
    TransferCompleted {
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
    },
    TransferRejected {
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
        reason: RejectReason,
    },
    TransferInvalid {
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
        reason: InvalidReason,
    },
}

impl LedgerEvent {
    pub fn level(&self) -> Level {
        match self {
            LedgerEvent::Debited { .. }
            | LedgerEvent::Credited { .. }
            | LedgerEvent::TransferCompleted { .. } => Level::Info,
            LedgerEvent::InsufficientFunds { .. }
            | LedgerEvent::NonPositiveAmount { .. }
            | LedgerEvent::BalanceOverflow { .. }
            | LedgerEvent::PrecisionLoss { .. }
            | LedgerEvent::TransferRejected { .. }
            | LedgerEvent::TransferInvalid { .. } => Level::Error,
        }
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEvent::Debited {
                account,
                amount,
                balance,
            } => write!(
                f,
                "Debited {amount} from account {account}. New balance: {balance}."
            ),
            LedgerEvent::Credited {
                account,
                amount,
                balance,
            } => write!(
                f,
                "Credited {amount} to account {account}. New balance: {balance}."
            ),
            LedgerEvent::InsufficientFunds {
                account, amount, ..
            } => write!(
                f,
                "Insufficient funds in account {account} to debit {amount}."
            ),
            LedgerEvent::NonPositiveAmount { account, amount } => {
                write!(f, "Amount {amount} for account {account} must be positive.")
            }
            LedgerEvent::BalanceOverflow { account, amount } => {
                write!(f, "Crediting {amount} would overflow account {account}.")
            }
            LedgerEvent::PrecisionLoss { account, amount } => write!(
                f,
                "Applying {amount} to account {account} would round its balance."
            ),
            LedgerEvent::TransferCompleted {
                source,
                destination,
                amount,
            } => write!(
                f,
                "Transfer completed: {amount} transferred from account {source} to account {destination}."
            ),
            LedgerEvent::TransferRejected {
                source,
                destination,
                amount,
                reason,
            } => write!(
                f,
                "Transfer rejected: unable to move {amount} from account {source} to account {destination} ({reason})."
            ),
            LedgerEvent::TransferInvalid {
                source,
                destination,
                amount,
                reason,
            } => write!(
                f,
                "Transfer invalid: {amount} from account {source} to account {destination} ({reason})."
            ),
        }
    }
}

/// Receiver of ledger events. Implementations must not block for long, they
/// may be called while an account guard is held.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LedgerEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::Debited {
                account,
                amount,
                balance,
            }
            | LedgerEvent::Credited {
                account,
                amount,
                balance,
            } => tracing::info!(%account, %amount, %balance, "{event}"),
            LedgerEvent::InsufficientFunds {
                account,
                amount,
                balance,
            } => tracing::error!(%account, %amount, %balance, "{event}"),
            LedgerEvent::NonPositiveAmount { account, amount }
            | LedgerEvent::BalanceOverflow { account, amount }
            | LedgerEvent::PrecisionLoss { account, amount } => {
                tracing::error!(%account, %amount, "{event}")
            }
            LedgerEvent::TransferCompleted {
                source,
                destination,
                amount,
            } => tracing::info!(%source, %destination, %amount, "{event}"),
            LedgerEvent::TransferRejected {
                source,
                destination,
                amount,
                ..
            }
            | LedgerEvent::TransferInvalid {
                source,
                destination,
                amount,
                ..
            } => tracing::error!(%source, %destination, %amount, "{event}"),
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &LedgerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
