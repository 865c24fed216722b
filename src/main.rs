use bank_ledger::{output, run, Bank, BankConfig, SettlementScheduler};

use clap::Parser;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bank_ledger", version, about = "Apply a batch of bank operations")]
struct Cli {
    /// Operations CSV (stdin by default)
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Accounts CSV (stdout by default)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Also write the journal to this file
    #[arg(short = 'j', long = "journal")]
    journal: Option<PathBuf>,

    /// Run the settlement scheduler while the batch is applied, at the
    /// cadence set by BANK_SCHEDULER_CADENCE_SECS
    #[arg(short = 's', long = "scheduler")]
    scheduler: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to stderr: stdout may be carrying the accounts CSV.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = BankConfig::from_env()?;
    let bank = Arc::new(Bank::new(config));

    let input: Box<dyn Read + Send> = match &cli.input {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };
    let mut output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    };

    let scheduler = cli
        .scheduler
        .then(|| SettlementScheduler::new(bank.clone()).start());
    let summary = run::run(bank.clone(), input, &mut output)?;
    if let Some(scheduler) = scheduler {
        scheduler.stop();
    }
    output.flush()?;
    tracing::info!(malformed = summary.malformed, failed = summary.failed, "batch applied");

    if let Some(path) = &cli.journal {
        let file = BufWriter::new(File::create(path)?);
        output::write_journal(file, &bank.journal())?;
    }

    Ok(())
}
