use std::io::Read;

use crate::account::AccountId;
use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::{Deserialize, de::DeserializeOwned};

#[derive(Debug, Deserialize)]
pub struct AccountRecord {
    pub account: AccountId,
    pub balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TransferRecord {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
}

/// Parses CSV rows into `T`, yielding each with its line number.
pub struct CsvRecordParser<R, T> {
    iter: DeserializeRecordsIntoIter<R, T>,
}

impl<R, T> CsvRecordParser<R, T>
where
    R: Read,
    T: DeserializeOwned,
{
    pub fn new(source: R) -> csv::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);
        // read the header row up front, so the reader position always
        // points at the line of the next record
        reader.headers()?;

        Ok(Self {
            iter: reader.into_deserialize(),
        })
    }
}

impl<R, T> Iterator for CsvRecordParser<R, T>
where
    R: Read,
    T: DeserializeOwned,
{
    type Item = (u64, csv::Result<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}
