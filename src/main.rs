// Membership Metrics - CLI
//
//   membership-metrics import <dump.json> [--db <path>]
//   membership-metrics report <merchant> <MM-YYYY> [--db <path>]
//   membership-metrics daily  <merchant> <MM-YYYY> [--db <path>]

use anyhow::{bail, Context, Result};
use serde_json::json;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use membership_metrics::{config, collections, Month, MetricsEngine, SqliteStore};

const USAGE: &str = "usage:
  membership-metrics import <dump.json> [--db <path>]
  membership-metrics report <merchant> <MM-YYYY> [--db <path>]
  membership-metrics daily <merchant> <MM-YYYY> [--db <path>]";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (positional, db_override) = split_db_flag(&args)?;

    let db_path = match db_override {
        Some(path) => path,
        None => config::load()?.store.path,
    };

    match positional.as_slice() {
        [cmd, dump] if cmd == "import" => run_import(Path::new(dump), &db_path),
        [cmd, merchant, month] if cmd == "report" => run_report(merchant, month, &db_path),
        [cmd, merchant, month] if cmd == "daily" => run_daily(merchant, month, &db_path),
        _ => bail!("{}", USAGE),
    }
}

/// Pulls `--db <path>` out of the argument list.
fn split_db_flag(args: &[String]) -> Result<(Vec<String>, Option<PathBuf>)> {
    let mut positional = Vec::new();
    let mut db = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--db" {
            let path = iter.next().context("--db needs a path")?;
            db = Some(PathBuf::from(path));
        } else {
            positional.push(arg.clone());
        }
    }
    Ok((positional, db))
}

fn run_import(dump: &Path, db_path: &Path) -> Result<()> {
    println!("Importing {} into {}", dump.display(), db_path.display());

    let store = SqliteStore::open(db_path)?;
    let summary = store.import_dump_file(dump)?;

    println!("✓ Inserted {} documents", summary.inserted);
    println!("✓ Updated {} changed since the last import", summary.updated);
    println!("✓ Skipped {} already imported", summary.duplicates);

    for collection in collections::ALL {
        println!("  {:<10} {}", collection, store.count_documents(collection)?);
    }

    Ok(())
}

fn open_engine(db_path: &Path) -> Result<MetricsEngine> {
    if !db_path.exists() {
        bail!(
            "database not found at {}; run `membership-metrics import <dump.json>` first",
            db_path.display()
        );
    }
    let store = SqliteStore::open(db_path)?;
    Ok(MetricsEngine::new(Arc::new(store)))
}

fn run_report(merchant: &str, month: &str, db_path: &Path) -> Result<()> {
    let month = Month::parse(month)?;
    let engine = open_engine(db_path)?;

    let report = json!({
        "merchant": merchant,
        "month": month.to_string(),
        "summary": engine.month_summary(merchant, month)?,
        "collections": engine.collections_summary(merchant, month)?,
        "revenue_share": engine.revenue_share(merchant, month)?,
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_daily(merchant: &str, month: &str, db_path: &Path) -> Result<()> {
    let month = Month::parse(month)?;
    let engine = open_engine(db_path)?;
    let daily = engine.daily_collections(merchant, month)?;

    let mut writer = csv::Writer::from_writer(io::stdout());
    for day in &daily.days {
        writer.serialize(day)?;
    }
    writer.flush()?;

    Ok(())
}
