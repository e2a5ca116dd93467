// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use wallet_ledger::{
    Account, AccountId, DocumentStore, Engine, MemoryStore, Operation, Settings, StoreError,
    SystemClock, TransactionError,
};

/// Wallet Ledger - Apply wallet operations from a CSV file
///
/// Reads operations from a CSV file, applies them to the ledger and writes
/// the resulting account summary to stdout. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "Applies wallet operations from a CSV file", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: type,account,amount,counterparty
    /// Example: cargo run -- operations.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// JSON snapshot of the store, loaded before and saved after the run
    #[arg(long, value_name = "STATE")]
    state: Option<PathBuf>,

    /// Settings file (defaults to ./ledger.toml when present)
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("cannot read settings: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed state file: {0}")]
    State(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] TransactionError),
}

fn main() {
    let args = Args::parse();

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&args, &settings) {
        tracing::error!(error = %e, "run failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &Args, settings: &Settings) -> Result<(), CliError> {
    let store = match &args.state {
        Some(path) if path.exists() => load_state(path)?,
        _ => MemoryStore::new(),
    };
    let engine = Engine::new(store)
        .with_limits(settings.limit_policy())
        .with_fees(settings.fee_schedule());

    let file = File::open(&args.input)?;
    process_operations(&engine, BufReader::new(file))?;
    write_accounts(&engine, std::io::stdout())?;

    if let Some(path) = &args.state {
        save_state(&engine, path)?;
    }
    Ok(())
}

fn load_state(path: &Path) -> Result<MemoryStore, CliError> {
    let document = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    Ok(MemoryStore::from_json(document, Arc::new(SystemClock))?)
}

fn save_state(engine: &Engine, path: &Path) -> Result<(), CliError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &engine.store().to_json())?;
    writer.flush()?;
    Ok(())
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, account, amount, counterparty`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    op_type: String,
    #[serde(default)]
    account: String,
    #[serde(default)]
    amount: String,
    /// Recipient, biller, cause or instrument depending on `type`.
    #[serde(default)]
    counterparty: String,
}

/// One row of the input, resolved.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Open(AccountId),
    Apply(Operation),
    Lock(AccountId, bool),
    IssueCard(AccountId),
    Reconcile,
}

impl CsvRecord {
    /// Returns `None` for unknown types.
    fn into_command(self) -> Option<Command> {
        let account = AccountId::new(self.account);
        let (amount, counterparty) = (self.amount, self.counterparty);

        match self.op_type.to_lowercase().as_str() {
            "open" => Some(Command::Open(account)),
            "deposit" => Some(Command::Apply(Operation::Deposit { account, amount })),
            "transfer" => Some(Command::Apply(Operation::Transfer {
                account,
                to: AccountId::new(counterparty),
                amount,
            })),
            "bill" => Some(Command::Apply(Operation::BillPayment {
                account,
                biller: counterparty,
                amount,
            })),
            "donate" => Some(Command::Apply(Operation::Donation {
                account,
                cause: counterparty,
                amount,
            })),
            "invest" => Some(Command::Apply(Operation::Investment {
                account,
                instrument: counterparty,
                amount,
            })),
            "lock" => Some(Command::Lock(account, true)),
            "unlock" => Some(Command::Lock(account, false)),
            "card" => Some(Command::IssueCard(account)),
            "reconcile" => Some(Command::Reconcile),
            _ => None,
        }
    }
}

fn execute<S: DocumentStore>(engine: &Engine<S>, command: Command) -> Result<(), TransactionError> {
    match command {
        Command::Open(id) => engine.open_account(&id).map(drop),
        Command::Apply(operation) => engine.process(operation).map(drop),
        Command::Lock(id, locked) => engine.set_lock(&id, locked).map(drop),
        Command::IssueCard(id) => engine.issue_card(&id).map(drop),
        Command::Reconcile => engine.reconcile().map(drop),
    }
}

/// Applies operations from a CSV reader.
///
/// Rows are streamed. Malformed rows, unknown types and refused operations
/// are logged and skipped; processing continues with the next row.
///
/// # CSV Format
///
/// Expected columns: `type, account, amount, counterparty`
/// - `type`: open, deposit, transfer, bill, donate, invest, lock, unlock, card, reconcile
/// - `account`: initiating account id
/// - `amount`: amount as typed by the user (monetary operations only)
/// - `counterparty`: recipient, biller, cause or instrument
///
/// # Example
///
/// ```csv
/// type,account,amount,counterparty
/// open,alice,,
/// deposit,alice,1000,
/// bill,alice,1500,meralco
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_operations<R: Read, S: DocumentStore>(
    engine: &Engine<S>,
    reader: R,
) -> Result<usize, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut applied = 0;
    for (row, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(row, error = %e, "skipping malformed row");
                continue;
            }
        };
        let Some(command) = record.into_command() else {
            tracing::warn!(row, "skipping row with unknown type");
            continue;
        };
        match execute(engine, command) {
            Ok(()) => applied += 1,
            Err(e) => tracing::debug!(row, error = %e, "row refused"),
        }
    }
    Ok(applied)
}

/// Output row of the account summary.
#[derive(Debug, Serialize)]
struct AccountRow {
    account: AccountId,
    balance: Decimal,
    daily_outgoing: Decimal,
    monthly_incoming: Decimal,
    locked: bool,
    entries: usize,
}

impl AccountRow {
    fn new<S: DocumentStore>(engine: &Engine<S>, account: &Account) -> Self {
        let usage = engine
            .limit_policy()
            .report(account, engine.store().server_timestamp());
        Self {
            account: account.id().clone(),
            balance: account.balance().round_dp(Account::DECIMAL_PRECISION),
            daily_outgoing: usage.daily_outgoing.used.round_dp(Account::DECIMAL_PRECISION),
            monthly_incoming: usage.monthly_incoming.used.round_dp(Account::DECIMAL_PRECISION),
            locked: account.locked(),
            entries: account.transactions().len(),
        }
    }
}

/// Writes the account summary as CSV.
///
/// Columns: `account, balance, daily_outgoing, monthly_incoming, locked, entries`
///
/// ```csv
/// account,balance,daily_outgoing,monthly_incoming,locked,entries
/// alice,700,300,1000,false,2
/// ```
fn write_accounts<W: Write, S: DocumentStore>(
    engine: &Engine<S>,
    writer: W,
) -> Result<(), CliError> {
    let mut wtr = Writer::from_writer(writer);
    for account in engine.accounts()? {
        wtr.serialize(AccountRow::new(engine, &account))?;
    }
    wtr.flush()?;
    Ok(())
}
