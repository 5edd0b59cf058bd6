//! CSV front end for [`crate::ledger::Ledger`]: load accounts, run a batch of
//! transfers concurrently, print final balances.

use std::{
    io::{Read, Write},
    sync::Arc,
    thread,
};

use crate::{
    event::TracingSink,
    ledger::{Ledger, LedgerConfig, LedgerError},
    transfer::TransferOutcome,
};
use anyhow::{Context, Result, anyhow};
use csv_parser::{AccountRecord, CsvRecordParser, TransferRecord};
use csv_printer::{Balance, print_balances};
pub mod csv_parser;
pub mod csv_printer;

/// Upper bound on transfers running at the same time.
const MAX_WORKERS: usize = 64;

#[derive(Debug)]
pub enum TransferReport {
    Executed(TransferOutcome),
    Failed(LedgerError),
}

pub struct Service<'w, A, T, W: 'w> {
    pub accounts: A,
    pub transfers: T,
    pub output: &'w mut W,
    pub config: LedgerConfig,
    /// Called once per transfer row, in line order, after the batch ran.
    pub report_printer: Box<dyn FnMut(u64, TransferReport)>,
}

impl<'w, A, T, W> Service<'w, A, T, W>
where
    A: Read,
    T: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let accounts = CsvRecordParser::<_, AccountRecord>::new(self.accounts)
            .context("Failed to read accounts header")?
            .map(|(line, row)| {
                row.map(|acc| (acc.account, acc.balance))
                    .with_context(|| format!("Invalid account at line {line}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let ledger = Ledger::new(&self.config, accounts, Arc::new(TracingSink))?;

        let transfers = CsvRecordParser::<_, TransferRecord>::new(self.transfers)
            .context("Failed to read transfers header")?
            .map(|(line, row)| {
                row.map(|tx| (line, tx))
                    .with_context(|| format!("Invalid transfer at line {line}"))
            })
            .collect::<Result<Vec<_>>>()?;

        for batch in transfers.chunks(MAX_WORKERS) {
            for (line, report) in run_batch(&ledger, batch)? {
                (self.report_printer)(line, report);
            }
        }

        print_balances(
            self.output,
            ledger
                .snapshot()
                .into_iter()
                .map(|(account, balance)| Balance { account, balance }),
        )
    }
}

fn run_batch(
    ledger: &Ledger,
    batch: &[(u64, TransferRecord)],
) -> Result<Vec<(u64, TransferReport)>> {
    thread::scope(|scope| {
        let handles: Vec<_> = batch
            .iter()
            .map(|(line, tx)| {
                scope.spawn(move || {
                    let report = match ledger.transfer(&tx.from, &tx.to, tx.amount) {
                        Ok(transfer) => TransferReport::Executed(transfer.execute()),
                        Err(err) => TransferReport::Failed(err),
                    };
                    (*line, report)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| anyhow!("Transfer worker panicked")))
            .collect()
    })
}
