/// A single account: identifier plus a balance behind its own guard.
/// Debit and credit are atomic check-and-mutate operations.
pub mod account;

/// Events reported by accounts and transfers, and the sinks receiving them.
pub mod event;

/// Simulated pre-commit latency.
pub mod latency;

/// Registry owning every account; entry point for creating transfers.
pub mod ledger;

/// Moves funds between two accounts. Guards are always taken in ascending
/// account id order, whatever the direction of the transfer.
pub mod transfer;

/// CSV batch runner used by the binary and the integration tests.
pub mod bin_utils;
