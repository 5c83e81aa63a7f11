// Day-scoped human-readable identifiers.
//
//   Medical record number   MRN20250615007
//   Visit queue number      250615-007
//   Invoice number          INV20250615007
//
// The sequence is fixed at three digits so that the greatest existing value
// for a day is also the lexicographically greatest one.

use chrono::NaiveDate;
use thiserror::Error;

/// Last sequence number a single day can issue.
pub const MAX_DAILY_SEQUENCE: u32 = 999;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Daily sequence exhausted for {prefix}: at most {max} identifiers can be issued per day")]
    SequenceExhausted { prefix: String, max: u32 },

    #[error("Malformed identifier in storage: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    MedicalRecordNumber,
    QueueNumber,
    InvoiceNumber,
}

impl IdentifierKind {
    pub fn label(&self) -> &'static str {
        match self {
            IdentifierKind::MedicalRecordNumber => "medical record number",
            IdentifierKind::QueueNumber => "queue number",
            IdentifierKind::InvoiceNumber => "invoice number",
        }
    }

    /// Date part of the identifier, e.g. `MRN20250615` or `250615`.
    pub fn prefix(&self, date: NaiveDate) -> String {
        match self {
            IdentifierKind::MedicalRecordNumber => format!("MRN{}", date.format("%Y%m%d")),
            IdentifierKind::QueueNumber => date.format("%y%m%d").to_string(),
            IdentifierKind::InvoiceNumber => format!("INV{}", date.format("%Y%m%d")),
        }
    }

    /// Every identifier issued on `date` starts with this string.
    pub fn day_pattern(&self, date: NaiveDate) -> String {
        match self {
            IdentifierKind::QueueNumber => format!("{}-", self.prefix(date)),
            _ => self.prefix(date),
        }
    }

    pub fn compose(&self, date: NaiveDate, sequence: u32) -> Result<String, IdentifierError> {
        if sequence == 0 || sequence > MAX_DAILY_SEQUENCE {
            return Err(IdentifierError::SequenceExhausted {
                prefix: self.prefix(date),
                max: MAX_DAILY_SEQUENCE,
            });
        }

        Ok(format!("{}{:03}", self.day_pattern(date), sequence))
    }

    /// Extracts the sequence suffix of an identifier previously issued.
    pub fn parse_sequence(&self, value: &str) -> Result<u32, IdentifierError> {
        let digits = match self {
            IdentifierKind::QueueNumber => value.split_once('-').map(|(_, seq)| seq),
            _ => value
                .len()
                .checked_sub(3)
                .and_then(|start| value.get(start..)),
        };

        digits
            .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|d| d.parse::<u32>().ok())
            .ok_or_else(|| IdentifierError::Malformed(value.to_string()))
    }

    /// Identifier following `last` (the greatest one already issued on
    /// `date`), or the first of the day when there is none.
    pub fn next_after(&self, date: NaiveDate, last: Option<&str>) -> Result<String, IdentifierError> {
        let sequence = match last {
            None => 1,
            Some(value) => self.parse_sequence(value)? + 1,
        };

        self.compose(date, sequence)
    }
}
