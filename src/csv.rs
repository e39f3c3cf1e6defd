use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::model::{Command, DiscountKind, NewDiscount};
use crate::{Amount, Wallet};

/// Errors that can occur when reading csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open csv file: {0}")]
    Open(csv::Error),

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{command}'")]
    UnrecognizedType { line: usize, command: String },

    #[error("line {line}: {command} missing {field}")]
    Missing {
        line: usize,
        command: String,
        field: &'static str,
    },

    #[error("line {line}: {reason}")]
    InvalidKind { line: usize, reason: String },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    phone: Option<String>,
    amount: Option<i64>,
    code: Option<String>,
    limit: Option<u64>,
    kind: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    phone: &'a str,
    balance: String,
    entries: usize,
}

/// Read commands from a csv file
///
/// Columns: `type,phone,amount,code,limit,kind,description`; unused cells
/// may be left empty.
pub fn read_commands(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Command, CsvError>>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(CsvError::Open)?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_row(line, row)
        }))
}

fn parse_row(line: usize, row: InputRow) -> Result<Command, CsvError> {
    let command = row.r#type.as_str();
    let missing = |field: &'static str| CsvError::Missing {
        line,
        command: command.to_string(),
        field,
    };

    match command {
        "register" => Ok(Command::Register {
            phone: row.phone.ok_or_else(|| missing("phone"))?,
        }),
        "deposit" | "withdrawal" => {
            let phone = row.phone.ok_or_else(|| missing("phone"))?;
            let amount = Amount::from_units(row.amount.ok_or_else(|| missing("amount"))?);
            let description = row.description.unwrap_or_else(|| command.to_string());
            if command == "deposit" {
                Ok(Command::Deposit {
                    phone,
                    amount,
                    description,
                })
            } else {
                Ok(Command::Withdrawal {
                    phone,
                    amount,
                    description,
                })
            }
        }
        "discount" => {
            let kind = match row.kind {
                Some(kind) => kind
                    .parse::<DiscountKind>()
                    .map_err(|reason| CsvError::InvalidKind { line, reason })?,
                None => DiscountKind::default(),
            };
            Ok(Command::CreateDiscount(NewDiscount {
                code: row.code,
                description: row.description.unwrap_or_default(),
                amount: Amount::from_units(row.amount.ok_or_else(|| missing("amount"))?),
                usage_limit: row.limit.ok_or_else(|| missing("limit"))?,
                expires_at: None,
                kind,
            }))
        }
        "redeem" => Ok(Command::Redeem {
            code: row.code.ok_or_else(|| missing("code"))?,
            phone: row.phone.ok_or_else(|| missing("phone"))?,
        }),
        "delete" => Ok(Command::DeleteWallet {
            phone: row.phone.ok_or_else(|| missing("phone"))?,
        }),
        other => Err(CsvError::UnrecognizedType {
            line,
            command: other.to_string(),
        }),
    }
}

/// Write wallet balances in csv format
pub fn write_wallets<'a>(
    writer: impl io::Write,
    wallets: impl IntoIterator<Item = &'a Wallet>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    for wallet in wallets {
        writer.serialize(OutputRow {
            phone: &wallet.phone,
            balance: wallet.balance.to_string(),
            entries: wallet.entries.len(),
        })?;
    }

    writer.flush()?;
    Ok(())
}
