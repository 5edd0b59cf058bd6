use std::fmt;

use rust_decimal::Decimal;

use crate::{
    account::{Account, AccountError, LockedAccount},
    event::{EventSink, LedgerEvent},
    latency::Delay,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed,
    Rejected(RejectReason),
    Invalid(InvalidReason),
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed)
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOutcome::Completed => f.write_str("completed"),
            TransferOutcome::Rejected(reason) => write!(f, "rejected ({reason})"),
            TransferOutcome::Invalid(reason) => write!(f, "invalid ({reason})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InsufficientFunds,
    /// The destination balance cannot represent the credited amount.
    BalanceOverflow,
    /// One of the new balances would have to be rounded.
    PrecisionLoss,
}

impl From<&AccountError> for RejectReason {
    fn from(err: &AccountError) -> Self {
        match err {
            AccountError::BalanceOverflow { .. } => RejectReason::BalanceOverflow,
            AccountError::PrecisionLoss { .. } => RejectReason::PrecisionLoss,
            AccountError::InsufficientFunds { .. }
            | AccountError::NonPositiveAmount { .. }
            | AccountError::NegativeBalance { .. } => RejectReason::InsufficientFunds,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InsufficientFunds => f.write_str("insufficient funds"),
            RejectReason::BalanceOverflow => f.write_str("balance overflow"),
            RejectReason::PrecisionLoss => f.write_str("precision loss"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    SameAccount,
    NonPositiveAmount,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::SameAccount => {
                f.write_str("source and destination are the same account")
            }
            InvalidReason::NonPositiveAmount => f.write_str("amount must be positive"),
        }
    }
}

/// Moves `amount` from one ledger account to another.
///
/// Created by [`crate::ledger::Ledger::transfer`], which guarantees both
/// references point to the canonical instance of their account. Executing
/// consumes the transfer, so its outcome is computed exactly once.
pub struct Transfer<'a> {
    source: &'a Account,
    destination: &'a Account,
    amount: Decimal,
    delay: &'a dyn Delay,
    sink: &'a dyn EventSink,
}

impl<'a> Transfer<'a> {
    pub(crate) fn new(
        source: &'a Account,
        destination: &'a Account,
        amount: Decimal,
        delay: &'a dyn Delay,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            source,
            destination,
            amount,
            delay,
            sink,
        }
    }

    pub fn source(&self) -> &'a Account {
        self.source
    }

    pub fn destination(&self) -> &'a Account {
        self.destination
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn execute(self) -> TransferOutcome {
        if let Some(reason) = self.validate() {
            self.sink.emit(&LedgerEvent::TransferInvalid {
                source: self.source.id().clone(),
                destination: self.destination.id().clone(),
                amount: self.amount,
                reason,
            });
            return TransferOutcome::Invalid(reason);
        }

        // no guard may be held while paused
        self.delay.pause();

        let outcome = {
            let mut pair = LockedPair::acquire(self.source, self.destination);
            self.commit(&mut pair)
        };

        let source = self.source.id().clone();
        let destination = self.destination.id().clone();
        let event = match outcome {
            TransferOutcome::Completed => LedgerEvent::TransferCompleted {
                source,
                destination,
                amount: self.amount,
            },
            TransferOutcome::Rejected(reason) => LedgerEvent::TransferRejected {
                source,
                destination,
                amount: self.amount,
                reason,
            },
            TransferOutcome::Invalid(reason) => LedgerEvent::TransferInvalid {
                source,
                destination,
                amount: self.amount,
                reason,
            },
        };
        self.sink.emit(&event);
        outcome
    }

    fn validate(&self) -> Option<InvalidReason> {
        if self.amount <= Decimal::ZERO {
            Some(InvalidReason::NonPositiveAmount)
        } else if self.source.id() == self.destination.id() {
            Some(InvalidReason::SameAccount)
        } else {
            None
        }
    }

    fn commit(&self, pair: &mut LockedPair<'a>) -> TransferOutcome {
        if let Err(err) = pair.destination().check_credit(self.amount) {
            return TransferOutcome::Rejected(RejectReason::from(&err));
        }
        if let Err(err) = pair.source().debit(self.amount, self.sink) {
            return TransferOutcome::Rejected(RejectReason::from(&err));
        }
        let credited = pair.destination().credit(self.amount, self.sink);
        // check_credit was done under the same guard
        debug_assert!(credited.is_ok());
        TransferOutcome::Completed
    }
}

/// Both guards of a transfer, taken in ascending account id order.
///
/// Fields drop in declaration order, so the guard acquired last is released
/// first.
struct LockedPair<'a> {
    second: LockedAccount<'a>,
    first: LockedAccount<'a>,
    source_first: bool,
}

impl<'a> LockedPair<'a> {
    fn acquire(source: &'a Account, destination: &'a Account) -> Self {
        if source.id() < destination.id() {
            let first = source.lock();
            let second = destination.lock();
            Self {
                second,
                first,
                source_first: true,
            }
        } else {
            let first = destination.lock();
            let second = source.lock();
            Self {
                second,
                first,
                source_first: false,
            }
        }
    }

    fn source(&mut self) -> &mut LockedAccount<'a> {
        if self.source_first {
            &mut self.first
        } else {
            &mut self.second
        }
    }

    fn destination(&mut self) -> &mut LockedAccount<'a> {
        if self.source_first {
            &mut self.second
        } else {
            &mut self.first
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, PoisonError};

    use crate::{
        account::AccountId,
        event::{Level, MemorySink},
        latency::NoDelay,
    };

    use super::*;

    fn account(id: &str, balance: i64) -> Account {
        Account::new(AccountId::from(id), Decimal::from(balance)).unwrap()
    }

    #[test]
    fn completed_transfer_emits_legs_then_summary() {
        let sink = MemorySink::default();
        let a = account("A", 1200);
        let b = account("B", 300);

        let outcome = Transfer::new(&a, &b, Decimal::from(200), &NoDelay, &sink).execute();
        assert_eq!(outcome, TransferOutcome::Completed);
        assert_eq!(a.balance(), Decimal::from(1000));
        assert_eq!(b.balance(), Decimal::from(500));

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], LedgerEvent::Debited { .. }));
        assert!(matches!(events[1], LedgerEvent::Credited { .. }));
        assert_eq!(
            events[2].to_string(),
            "Transfer completed: 200 transferred from account A to account B."
        );
    }

    #[test]
    fn rejected_transfer_leaves_destination_untouched() {
        let sink = MemorySink::default();
        // destination sorts first, so its guard is taken first
        let a = account("Z", 100);
        let b = account("B", 300);

        let outcome = Transfer::new(&a, &b, Decimal::from(101), &NoDelay, &sink).execute();
        assert_eq!(outcome, TransferOutcome::Rejected(RejectReason::InsufficientFunds));
        assert_eq!(a.balance(), Decimal::from(100));
        assert_eq!(b.balance(), Decimal::from(300));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LedgerEvent::InsufficientFunds { .. }));
        assert!(matches!(events[1], LedgerEvent::TransferRejected { .. }));
        assert!(events.iter().all(|e| e.level() == Level::Error));
    }

    #[test]
    fn invalid_transfers() {
        let sink = MemorySink::default();
        let a = account("A", 100);
        let b = account("B", 100);

        for amount in [Decimal::ZERO, Decimal::from(-10)] {
            let outcome = Transfer::new(&a, &b, amount, &NoDelay, &sink).execute();
            assert_eq!(outcome, TransferOutcome::Invalid(InvalidReason::NonPositiveAmount));
        }
        let outcome = Transfer::new(&a, &a, Decimal::from(10), &NoDelay, &sink).execute();
        assert_eq!(outcome, TransferOutcome::Invalid(InvalidReason::SameAccount));

        assert_eq!(a.balance(), Decimal::from(100));
        assert_eq!(b.balance(), Decimal::from(100));
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn overflowing_destination_is_rejected_before_debit() {
        let sink = MemorySink::default();
        let a = account("A", 100);
        let b = Account::new(AccountId::from("B"), Decimal::MAX).unwrap();

        let outcome = Transfer::new(&a, &b, Decimal::from(10), &NoDelay, &sink).execute();
        assert_eq!(outcome, TransferOutcome::Rejected(RejectReason::BalanceOverflow));
        assert_eq!(a.balance(), Decimal::from(100));
        assert_eq!(b.balance(), Decimal::MAX);
    }

    #[test]
    fn rounding_destination_is_rejected_before_debit() {
        let sink = MemorySink::default();
        let large: Decimal = "50000000000000000000000000000".parse().unwrap();
        let a = account("A", 1);
        let b = Account::new(AccountId::from("B"), large).unwrap();

        let outcome = Transfer::new(&a, &b, Decimal::new(1, 1), &NoDelay, &sink).execute();
        assert_eq!(outcome, TransferOutcome::Rejected(RejectReason::PrecisionLoss));
        assert_eq!(a.balance(), Decimal::ONE);
        assert_eq!(b.balance(), large);
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn rounding_source_is_rejected() {
        let sink = MemorySink::default();
        let large: Decimal = "50000000000000000000000000000".parse().unwrap();
        let a = Account::new(AccountId::from("A"), large).unwrap();
        let b = account("B", 0);

        let outcome = Transfer::new(&a, &b, Decimal::new(1, 1), &NoDelay, &sink).execute();
        assert_eq!(outcome, TransferOutcome::Rejected(RejectReason::PrecisionLoss));
        assert_eq!(a.balance(), large);
        assert_eq!(b.balance(), Decimal::ZERO);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LedgerEvent::PrecisionLoss { .. }));
    }

    /// Records whether either account was locked while paused.
    struct LockCheckingDelay<'a> {
        accounts: [&'a Account; 2],
        observed: Mutex<Vec<(bool, Decimal)>>,
    }

    impl Delay for LockCheckingDelay<'_> {
        fn pause(&self) {
            let mut observed = self.observed.lock().unwrap_or_else(PoisonError::into_inner);
            for account in self.accounts {
                let locked = account.is_locked();
                // reading a balance would block on a held guard
                let balance = if locked { Decimal::ZERO } else { account.balance() };
                observed.push((locked, balance));
            }
        }
    }

    #[test]
    fn no_guard_is_held_during_latency() {
        let sink = MemorySink::default();
        let a = account("A", 1200);
        let b = account("B", 300);
        let delay = LockCheckingDelay {
            accounts: [&a, &b],
            observed: Mutex::default(),
        };

        for (source, destination) in [(&a, &b), (&b, &a)] {
            let outcome = Transfer::new(source, destination, Decimal::from(100), &delay, &sink)
                .execute();
            assert_eq!(outcome, TransferOutcome::Completed);
        }

        let observed = delay.observed.into_inner().unwrap();
        assert_eq!(
            observed,
            [
                (false, Decimal::from(1200)),
                (false, Decimal::from(300)),
                (false, Decimal::from(1100)),
                (false, Decimal::from(400)),
            ]
        );
        assert_eq!(a.balance(), Decimal::from(1200));
    }

    #[test]
    fn outcome_display() {
        assert_eq!(TransferOutcome::Completed.to_string(), "completed");
        assert_eq!(
            TransferOutcome::Rejected(RejectReason::InsufficientFunds).to_string(),
            "rejected (insufficient funds)"
        );
        assert!(!TransferOutcome::Invalid(InvalidReason::SameAccount).is_completed());
    }
}
