#![forbid(unsafe_code)]
//! Command-line access to the CampusChain ledger

use campuschain::blockchain::{Block, BlockRef};
use campuschain::cli::{init_tracing, open_ledger};
use campuschain::config::{load_config, load_config_from};
use campuschain::events::LedgerEvent;
use campuschain::persistence::{JsonFileStore, Persistence};
use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "campuschain", version, about = "Append-only ledger for campus issue events")]
struct Cli {
    /// Config file (defaults to $CAMPUSCHAIN_CONFIG or ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the genesis block if the ledger does not exist yet
    Init,
    /// Append a raw payload string
    Append { payload: String },
    /// Append a typed issue lifecycle event
    #[command(subcommand)]
    Record(RecordCommand),
    /// Verify the chain, stopping at the first invalid block (exit code 1 if invalid)
    Verify,
    /// List every fault in the chain
    Audit,
    /// Print the most recent blocks
    Show {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Write the full chain to a JSON file
    Export { path: PathBuf },
}

#[derive(Subcommand)]
enum RecordCommand {
    Issue {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        reporter: String,
        #[arg(long)]
        severity: i64,
    },
    Report {
        #[arg(long)]
        issue_id: String,
        #[arg(long)]
        vendor: String,
        #[arg(long, default_value = "")]
        transcript: String,
        #[arg(long)]
        summary: String,
    },
    Complaint {
        #[arg(long)]
        complaint_id: String,
        #[arg(long)]
        severity: i64,
        #[arg(long)]
        title: String,
    },
}

impl From<RecordCommand> for LedgerEvent {
    fn from(cmd: RecordCommand) -> Self {
        match cmd {
            RecordCommand::Issue { id, title, reporter, severity } => {
                LedgerEvent::IssueRaised { id, title, reporter, severity }
            }
            RecordCommand::Report { issue_id, vendor, transcript, summary } => {
                LedgerEvent::ReportSubmitted { issue_id, vendor, transcript, summary }
            }
            RecordCommand::Complaint { complaint_id, severity, title } => {
                LedgerEvent::ComplaintFiled { complaint_id, severity, title }
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    init_tracing(&config.log_level);
    let ledger = open_ledger(&config)?;

    match cli.command {
        Command::Init => {
            if let Some(genesis) = ledger.block(0) {
                println!("{}", "Ledger ready".bright_green().bold());
                println!("  genesis: {}", genesis.hash.cyan());
                println!("  blocks:  {}", ledger.len());
            }
        }
        Command::Append { payload } => print_block_ref(&ledger.append(payload)?),
        Command::Record(record) => print_block_ref(&ledger.append_event(&record.into())?),
        Command::Verify => {
            let report = ledger.verify();
            match report.first_invalid_index {
                None => println!("{} ({} blocks)", "Chain valid".bright_green().bold(), ledger.len()),
                Some(index) => {
                    println!("{} at block #{}", "Chain INVALID".red().bold(), index);
                    std::process::exit(1);
                }
            }
        }
        Command::Audit => {
            let faults = ledger.audit();
            if faults.is_empty() {
                println!("{}", "No faults found".bright_green().bold());
            } else {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_header(vec![header("Block"), header("Fault")]);
                for fault in &faults {
                    table.add_row(vec![
                        Cell::new(format!("#{}", fault.index)).fg(TableColor::Red),
                        Cell::new(fault.kind.to_string()),
                    ]);
                }
                println!("{}", table);
                std::process::exit(1);
            }
        }
        Command::Show { limit } => {
            let chain = ledger.get_chain();
            let start = chain.len().saturating_sub(limit);
            print_chain(&chain[start..]);
        }
        Command::Export { path } => {
            let chain = ledger.get_chain();
            JsonFileStore::new(&path).save_chain(&chain)?;
            println!("Exported {} blocks to {}", chain.len(), path.display());
        }
    }

    Ok(())
}

fn header(title: &str) -> Cell {
    Cell::new(title)
        .fg(TableColor::Cyan)
        .add_attribute(Attribute::Bold)
}

fn print_block_ref(reference: &BlockRef) {
    println!(
        "{} #{} {}",
        "Recorded block".bright_green().bold(),
        reference.index,
        reference.hash.cyan()
    );
}

fn print_chain(blocks: &[Block]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header("Block"),
            header("Date"),
            header("Hash"),
            header("Prev"),
            header("Payload"),
        ]);

    for block in blocks {
        table.add_row(vec![
            Cell::new(format!("#{}", block.index)).fg(TableColor::White),
            Cell::new(format_timestamp(block.timestamp)).fg(TableColor::Grey),
            Cell::new(short_hash(&block.hash)).fg(TableColor::Cyan),
            Cell::new(short_hash(&block.prev_hash)).fg(TableColor::DarkCyan),
            Cell::new(describe_payload(&block.payload)),
        ]);
    }

    println!("{}", table);
}

fn short_hash(hash: &str) -> String {
    if hash.chars().count() > 16 {
        format!("{}...", hash.chars().take(13).collect::<String>())
    } else {
        hash.to_string()
    }
}

fn describe_payload(payload: &str) -> String {
    match LedgerEvent::from_payload(payload) {
        Ok(event) => format!("{} {}", event.kind(), event.issue_id()),
        Err(_) if payload.chars().count() > 40 => {
            format!("{}...", payload.chars().take(37).collect::<String>())
        }
        Err(_) => payload.to_string(),
    }
}

fn format_timestamp(timestamp: i64) -> String {
    use chrono::DateTime;

    if let Some(dt) = DateTime::from_timestamp(timestamp, 0) {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        "Invalid".to_string()
    }
}
