//! # procura-cli
//!
//! Operator console for the procura record store.

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use config::AppConfig;
use procura_fx::{stamp_base_amount, touches_amount, CurrencyConverter};
use procura_sheet::{CellValue, Record};
use procura_store::{SchemaReport, SnapshotOrigin, Storage, StoreError};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Tables whose rows carry a converted base amount.
const MONEY_TABLES: [&str; 2] = ["requisitions", "landings"];

/// 0/1 flag columns; `true`/`false` on the command line become 1/0.
const FLAG_COLUMNS: [&str; 2] = ["paid", "delivered"];

/// procura - procurement records on a workbook file
#[derive(Parser)]
#[command(name = "procura")]
#[command(author, version, about = "Procurement record store console", long_about = None)]
struct Cli {
    /// Config file (defaults to ./procura.yaml if present)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Name recorded in the activity log
    #[arg(short, long, default_value = "admin", global = true)]
    user: String,

    /// Output format (json, csv, table)
    #[arg(short = 'f', long = "format", default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or migrate the workbook
    Init,
    /// List the tables in the workbook
    Tables,
    /// List every row of a table
    List { table: String },
    /// Show one row
    Get { table: String, id: i64 },
    /// Show the id the next row would get
    NextId { table: String },
    /// Append a row
    Add {
        table: String,
        /// Field to set (key=value)
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },
    /// Patch one or more rows
    Update {
        table: String,
        #[arg(required = true)]
        ids: Vec<i64>,
        /// Field to set (key=value)
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },
    /// Delete a row
    Delete { table: String, id: i64 },
    /// Manage snapshots
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Replace the workbook with an .xlsx file (snapshots the current one first)
    Import { file: PathBuf },
    /// Show current exchange rates
    Rates {
        /// Base currency (defaults to the configured one)
        #[arg(long)]
        base: Option<String>,
    },
    /// Convert an amount between currencies
    Convert {
        amount: f64,
        from: String,
        /// Target currency (defaults to the base currency)
        #[arg(long)]
        to: Option<String>,
    },
    /// Show recent activity
    Audit {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum BackupCommand {
    /// Take a manual snapshot
    Create,
    /// List snapshots, newest first
    List,
    /// Restore a snapshot over the live workbook
    Restore { name: String },
    /// Delete a snapshot
    Delete { name: String },
    /// Keep only the newest snapshots
    Prune {
        #[arg(long)]
        keep: usize,
    },
}

/// Output format for results.
#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Aligned table output (default)
    #[default]
    Table,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {e:#}", "Error:".red().bold());
        let fatal = e
            .downcast_ref::<StoreError>()
            .is_some_and(StoreError::is_fatal);
        std::process::exit(if fatal { 2 } else { 1 });
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    debug!(workbook = %config.store.workbook_path.display(), "loaded configuration");

    let storage = Storage::new(&config.store);
    let report = storage.schema().ensure()?;
    if let Some(name) = storage.auto_backup().on_request() {
        println!("{} {name}", "Automatic snapshot:".dimmed());
    }
    let fx = CurrencyConverter::from_config(&config.fx)?;
    let user = cli.user.as_str();

    match cli.command {
        Command::Init => print_report(&report),
        Command::Tables => {
            for name in storage.records().table_names()? {
                println!("{name}");
            }
        }
        Command::List { table } => {
            print_records(&storage.records().list_rows(&table)?, cli.format)?;
        }
        Command::Get { table, id } => match storage.records().find_by_id(&table, id)? {
            Some(record) => print_records(&[record], cli.format)?,
            None => bail!("No row with id {id} in {table}"),
        },
        Command::NextId { table } => {
            println!("{}", storage.records().next_id(&table)?);
        }
        Command::Add { table, fields } => {
            let mut record = parse_assignments(&fields)?;
            if MONEY_TABLES.contains(&table.as_str()) {
                stamp_base_amount(&fx, &mut record).await;
            }
            set_if_defined(&storage, &table, &mut record, "created_by", user);
            set_if_defined(&storage, &table, &mut record, "created_at", &now(&config));

            let stored = storage.records().append_row(&table, record)?;
            let id = stored.get("id").map(CellValue::as_str).unwrap_or_default();
            storage
                .audit()
                .record(user, "create", &format!("{table}/{id}"), &summarize(&stored));
            print_records(&[stored], cli.format)?;
        }
        Command::Update { table, ids, fields } => {
            let patch = parse_assignments(&fields)?;
            let matched = update(&storage, &fx, &config, &table, &ids, patch.clone()).await?;
            if matched == 0 {
                bail!("No matching rows in {table}");
            }
            let target = format!("{table}/{}", join_ids(&ids));
            storage
                .audit()
                .record(user, "update", &target, &summarize(&patch));
            println!("{} {matched} row(s)", "Updated".green().bold());
        }
        Command::Delete { table, id } => {
            if !storage.records().delete_row_by_id(&table, id)? {
                bail!("No row with id {id} in {table}");
            }
            storage
                .audit()
                .record(user, "delete", &format!("{table}/{id}"), "");
            println!("{} {table}/{id}", "Deleted".green().bold());
        }
        Command::Backup(command) => run_backup(&storage, user, command, cli.format)?,
        Command::Import { file } => {
            let report = storage
                .backups()
                .import_workbook(&file)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            storage
                .audit()
                .record(user, "import", &file.display().to_string(), "");
            println!("{} {}", "Imported".green().bold(), file.display());
            print_report(&report);
        }
        Command::Rates { base } => {
            let base = base.unwrap_or_else(|| fx.base().to_string());
            let (rates, source) = fx.resolve(&base).await;
            println!(
                "{} {} ({source}, fetched {})",
                "Base:".cyan().bold(),
                rates.base,
                rates.timestamp.to_rfc3339()
            );
            for (code, rate) in &rates.rates {
                println!("  {code:<4} {rate}");
            }
        }
        Command::Convert { amount, from, to } => {
            let converted = fx.convert(amount, &from, to.as_deref()).await;
            let to = to.unwrap_or_else(|| fx.base().to_string());
            println!("{converted:.2} {}", to.to_uppercase());
        }
        Command::Audit { limit } => {
            print_records(&storage.audit().recent(limit)?, cli.format)?;
        }
    }

    Ok(())
}

/// Apply `patch` to `ids`. Patches that touch money are re-priced per row,
/// filling the missing half of amount/currency from the stored row.
async fn update(
    storage: &Storage,
    fx: &CurrencyConverter,
    config: &AppConfig,
    table: &str,
    ids: &[i64],
    mut patch: Record,
) -> Result<usize> {
    let records = storage.records();
    set_if_defined(storage, table, &mut patch, "updated_at", &now(config));

    if !(MONEY_TABLES.contains(&table) && touches_amount(&patch)) {
        return Ok(records.update_rows_by_ids(table, ids, &patch)?);
    }

    let mut matched = 0;
    for &id in ids {
        let Some(current) = records.find_by_id(table, id)? else {
            continue;
        };
        let mut row_patch = patch.clone();
        if !row_patch.contains_key("amount") && !row_patch.contains_key("amount_original") {
            if let Some(amount) = current.get("amount_original") {
                row_patch.insert("amount_original".to_string(), amount.clone());
            }
        }
        if !row_patch.contains_key("currency") {
            if let Some(currency) = current.get("currency") {
                row_patch.insert("currency".to_string(), currency.clone());
            }
        }
        stamp_base_amount(fx, &mut row_patch).await;
        if records.update_row_by_id(table, id, &row_patch)? {
            matched += 1;
        }
    }
    Ok(matched)
}

fn run_backup(
    storage: &Storage,
    user: &str,
    command: BackupCommand,
    format: OutputFormat,
) -> Result<()> {
    let backups = storage.backups();
    match command {
        BackupCommand::Create => {
            let snapshot = backups.create_snapshot(SnapshotOrigin::Manual)?;
            storage.audit().record(user, "backup", &snapshot.name, "");
            println!("{} {}", "Created".green().bold(), snapshot.name);
        }
        BackupCommand::List => {
            let rows: Vec<Record> = backups
                .list_snapshots()?
                .into_iter()
                .map(|s| {
                    let mut row = Record::new();
                    row.insert("name".to_string(), CellValue::from(s.name));
                    row.insert("size".to_string(), CellValue::Int(s.size as i64));
                    row.insert(
                        "created_at".to_string(),
                        CellValue::from(s.created_at.to_rfc3339()),
                    );
                    row.insert(
                        "origin".to_string(),
                        CellValue::from(s.origin.map(|o| o.to_string())),
                    );
                    row
                })
                .collect();
            print_records(&rows, format)?;
        }
        BackupCommand::Restore { name } => {
            let report = backups.restore_snapshot(&name)?;
            storage.audit().record(user, "restore", &name, "");
            println!("{} {name}", "Restored".green().bold());
            print_report(&report);
        }
        BackupCommand::Delete { name } => {
            backups.delete_snapshot(&name)?;
            storage.audit().record(user, "delete_backup", &name, "");
            println!("{} {name}", "Deleted".green().bold());
        }
        BackupCommand::Prune { keep } => {
            let removed = backups.prune_snapshots(keep)?;
            println!("{} {} snapshot(s)", "Pruned".green().bold(), removed.len());
        }
    }
    Ok(())
}

/// Parse `key=value` arguments into a record.
fn parse_assignments(fields: &[String]) -> Result<Record> {
    let mut record = Record::new();
    for field in fields {
        let (key, value) = field.split_once('=').with_context(|| {
            format!("Invalid field format: '{field}'. Expected KEY=VALUE format")
        })?;
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid field format: '{field}'. Empty key");
        }
        let mut value = parse_cli_value(value);
        if FLAG_COLUMNS.contains(&key) {
            if let CellValue::Bool(b) = value {
                value = CellValue::Int(i64::from(b));
            }
        }
        record.insert(key.to_string(), value);
    }
    Ok(record)
}

/// Parse a CLI value string into a cell value.
fn parse_cli_value(s: &str) -> CellValue {
    if s.eq_ignore_ascii_case("null") || s.is_empty() {
        CellValue::Null
    } else if s.eq_ignore_ascii_case("true") {
        CellValue::Bool(true)
    } else if s.eq_ignore_ascii_case("false") {
        CellValue::Bool(false)
    } else if let Ok(n) = s.parse::<i64>() {
        CellValue::Int(n)
    } else if let Ok(f) = s.parse::<f64>() {
        CellValue::Float(f)
    } else {
        CellValue::String(s.to_string())
    }
}

/// Set `column` only if the table definition has it.
fn set_if_defined(storage: &Storage, table: &str, record: &mut Record, column: &str, value: &str) {
    let defined = storage
        .schema()
        .tables()
        .iter()
        .any(|def| def.name == table && def.columns.iter().any(|c| c == column));
    if defined && !record.contains_key(column) {
        record.insert(column.to_string(), CellValue::from(value));
    }
}

fn now(config: &AppConfig) -> String {
    procura_store::clock::now_iso(config.store.utc_offset_hours)
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}

/// One-line `key=value` rendering for the activity log.
fn summarize(record: &Record) -> String {
    record
        .iter()
        .filter(|(k, v)| !v.is_blank() && k.as_str() != "password_hash")
        .map(|(k, v)| format!("{k}={}", format_cell(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_report(report: &SchemaReport) {
    if report.created_file {
        println!("{} workbook", "Created".green().bold());
    }
    for table in &report.tables_created {
        println!("{} table {table}", "Added".green().bold());
    }
    for (table, column) in &report.columns_added {
        println!("{} column {table}.{column}", "Added".green().bold());
    }
    if report.bootstrap_seeded {
        println!("{} bootstrap account", "Seeded".yellow().bold());
    }
    if report.bootstrap_repaired {
        println!("{} bootstrap account password", "Repaired".yellow().bold());
    }
    if !report.changed() {
        println!("Schema up to date");
    }
}

/// Print records in the specified format.
fn print_records(records: &[Record], format: OutputFormat) -> Result<()> {
    if records.is_empty() {
        if let OutputFormat::Json = format {
            println!("[]");
        } else {
            println!("(no rows)");
        }
        return Ok(());
    }

    let headers: Vec<&str> = records[0].keys().map(String::as_str).collect();
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
        OutputFormat::Csv => {
            println!("{}", headers.join(","));
            for record in records {
                let values: Vec<String> = headers
                    .iter()
                    .map(|h| csv_value(record.get(*h).unwrap_or(&CellValue::Null)))
                    .collect();
                println!("{}", values.join(","));
            }
        }
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = records
                .iter()
                .map(|r| {
                    headers
                        .iter()
                        .map(|h| r.get(*h).map(format_cell).unwrap_or_default())
                        .collect()
                })
                .collect();
            let widths: Vec<usize> = headers
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    rows.iter()
                        .map(|r| r[i].chars().count())
                        .max()
                        .unwrap_or(0)
                        .max(h.chars().count())
                })
                .collect();

            let header_line: Vec<String> = headers
                .iter()
                .zip(&widths)
                .map(|(h, w)| format!("{h:<width$}", width = *w))
                .collect();
            println!("{}", header_line.join("  ").cyan().bold());
            for row in rows {
                let line: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(v, w)| format!("{v:<width$}", width = *w))
                    .collect();
                println!("{}", line.join("  ").trim_end());
            }
        }
    }
    Ok(())
}

/// Format a cell for display. Integral numbers print without a fraction.
#[allow(clippy::float_cmp)]
fn format_cell(value: &CellValue) -> String {
    match value {
        CellValue::Float(f) if f.is_finite() && f.trunc() == *f && f.abs() < 1e15 => {
            format!("{}", *f as i64)
        }
        other => other.as_str(),
    }
}

/// Format a cell for CSV output.
fn csv_value(value: &CellValue) -> String {
    let s = format_cell(value);
    // Escape quotes and wrap in quotes if contains comma or quote
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_value() {
        assert_eq!(parse_cli_value("null"), CellValue::Null);
        assert_eq!(parse_cli_value(""), CellValue::Null);
        assert_eq!(parse_cli_value("TRUE"), CellValue::Bool(true));
        assert_eq!(parse_cli_value("42"), CellValue::Int(42));
        assert_eq!(parse_cli_value("-2.5"), CellValue::Float(-2.5));
        assert_eq!(
            parse_cli_value("MV Aurora"),
            CellValue::String("MV Aurora".to_string())
        );
    }

    #[test]
    fn test_parse_assignments() {
        let fields = vec![
            "number=PO-1".to_string(),
            "amount=100".to_string(),
            "paid=true".to_string(),
            "remarks=a=b".to_string(),
        ];
        let record = parse_assignments(&fields).unwrap();

        assert_eq!(record["number"].as_str(), "PO-1");
        assert_eq!(record["amount"], CellValue::Int(100));
        assert_eq!(record["paid"], CellValue::Int(1));
        assert_eq!(record["remarks"].as_str(), "a=b");
    }

    #[test]
    fn test_parse_assignments_rejects_bad_fields() {
        assert!(parse_assignments(&["novalue".to_string()]).is_err());
        assert!(parse_assignments(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_format_cell() {
        assert_eq!(format_cell(&CellValue::Float(3.0)), "3");
        assert_eq!(format_cell(&CellValue::Float(111.11)), "111.11");
        assert_eq!(format_cell(&CellValue::Null), "");
        assert_eq!(csv_value(&CellValue::from("a, b")), "\"a, b\"");
    }

    #[test]
    fn test_summarize_skips_blanks_and_hashes() {
        let mut record = Record::new();
        record.insert("id".to_string(), CellValue::Float(1.0));
        record.insert("username".to_string(), CellValue::from("ops"));
        record.insert("password_hash".to_string(), CellValue::from("abc"));
        record.insert("role".to_string(), CellValue::Null);
        assert_eq!(summarize(&record), "id=1, username=ops");
    }

    #[test]
    fn test_cli_parses_nested_backup_command() {
        let cli = Cli::try_parse_from(["procura", "backup", "prune", "--keep", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Backup(BackupCommand::Prune { keep: 5 })
        ));

        let cli = Cli::try_parse_from([
            "procura", "update", "requisitions", "1", "2", "-s", "paid=1",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Update { ref ids, .. } if ids == &[1, 2]));
    }
}
