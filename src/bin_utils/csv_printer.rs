use std::io::Write;

use crate::account::AccountId;
use anyhow::{Context, Result};
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Balance {
    pub account: AccountId,
    pub balance: Decimal,
}

pub fn print_balances<W>(output: &mut W, balances: impl Iterator<Item = Balance>) -> Result<()>
where
    W: Write,
{
    let mut writer = Writer::from_writer(output);
    for balance in balances {
        let account = balance.account.clone();
        writer
            .serialize(balance)
            .with_context(|| format!("Failed to write balance of account {account}"))?;
    }
    writer.flush().context("Failed to flush balances")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_header_and_rows() {
        let mut output = Vec::new();
        print_balances(
            &mut output,
            [
                Balance {
                    account: AccountId::from("A"),
                    balance: Decimal::new(7005, 1),
                },
                Balance {
                    account: AccountId::from("B"),
                    balance: Decimal::ZERO,
                },
            ]
            .into_iter(),
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "account,balance\nA,700.5\nB,0\n"
        );
    }
}
