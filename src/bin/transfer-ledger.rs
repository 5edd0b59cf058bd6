use std::fs::File;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use transfer_ledger::{
    bin_utils::{Service, TransferReport},
    latency::LatencyRange,
    ledger::LedgerConfig,
    transfer::TransferOutcome,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let accounts_file = args
        .next()
        .context("Expected the accounts file name as the first argument")?;
    let transfers_file = args
        .next()
        .context("Expected the transfers file name as the second argument")?;

    let latency = match std::env::var("LEDGER_LATENCY_MS") {
        Ok(range) => range
            .parse::<LatencyRange>()
            .context("Invalid LEDGER_LATENCY_MS")?,
        Err(_) => LatencyRange::default(),
    };

    let accounts = File::open(&accounts_file)
        .with_context(|| format!("Failed to open `{accounts_file}`"))?;
    let transfers = File::open(&transfers_file)
        .with_context(|| format!("Failed to open `{transfers_file}`"))?;

    let service = Service {
        accounts,
        transfers,
        output: &mut std::io::stdout(),
        config: LedgerConfig { latency },
        report_printer: Box::new(|line, report| match report {
            TransferReport::Executed(TransferOutcome::Completed) => {}
            TransferReport::Executed(outcome) => {
                eprintln!("Transfer at line {line}: {outcome}")
            }
            TransferReport::Failed(err) => eprintln!("Error at line {line}: {err}"),
        }),
    };
    service.run()
}
