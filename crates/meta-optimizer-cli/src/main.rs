use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use meta_optimizer_storage::{
    codec, human_file_size, DefaultPolicy, LegacyMetaStore, MetaOptimizer, MetaType, MetaValue,
    OptimizerConfig, Storage, WriteOutcome, WriteRequest,
};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

#[derive(Debug, Parser)]
#[command(name = "meta-optimizer")]
#[command(about = "Flatten key-value object metadata into wide SQLite tables.")]
struct Cli {
    /// SQLite database file (created when missing).
    #[arg(long, global = true, default_value = "meta.sqlite")]
    db: PathBuf,

    /// JSON configuration file; missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write one value through the upsert rules.
    Set(SetArgs),
    /// Read one key, or the whole row when `--key` is omitted.
    Get(ObjectArgs),
    /// Clear one key, or remove the whole row when `--key` is omitted.
    Delete(ObjectArgs),
    /// List the dynamic columns of a wide table.
    Columns(TypeArgs),
    /// Copy legacy key-value rows into the wide table.
    Import(ImportArgs),
    /// Drop every row and dynamic column of a wide table.
    Reset(TypeArgs),
    /// Row counts, sizes and cache statistics.
    Report(ReportArgs),
    /// Add a row to a legacy key-value table.
    SeedLegacy(SeedArgs),
}

#[derive(Debug, Args)]
struct TypeArgs {
    /// `post`, `comment`, `user` or `term`.
    #[arg(long = "type")]
    meta_type: MetaType,
}

#[derive(Debug, Args)]
struct ObjectArgs {
    #[arg(long = "type")]
    meta_type: MetaType,
    #[arg(long)]
    id: u64,
    #[arg(long)]
    key: Option<String>,
}

#[derive(Debug, Args)]
struct SetArgs {
    #[arg(long = "type")]
    meta_type: MetaType,
    #[arg(long)]
    id: u64,
    #[arg(long)]
    key: String,
    #[arg(long)]
    value: String,
    /// Parse `--value` and `--prev` as JSON instead of plain text.
    #[arg(long)]
    json: bool,
    /// Allow several values for the key.
    #[arg(long)]
    non_unique: bool,
    /// Treat the write as an addition; skips the legacy lookup.
    #[arg(long)]
    add: bool,
    /// Value to replace for non-unique keys.
    #[arg(long)]
    prev: Option<String>,
    /// Overwrite without looking at the stored value.
    #[arg(long)]
    no_check: bool,
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[arg(long = "type")]
    meta_type: MetaType,
    /// Only objects with a lower id (the `lastObjectId` of a previous run).
    #[arg(long)]
    before: Option<u64>,
    /// Objects per batch; defaults to the configured batch size.
    #[arg(long)]
    batch: Option<usize>,
    /// Keep importing batches until the legacy table is exhausted.
    #[arg(long)]
    all: bool,
}

#[derive(Debug, Args)]
struct ReportArgs {
    #[arg(long = "type")]
    meta_type: Option<MetaType>,
}

#[derive(Debug, Args)]
struct SeedArgs {
    #[arg(long = "type")]
    meta_type: MetaType,
    #[arg(long)]
    id: u64,
    #[arg(long)]
    key: String,
    #[arg(long)]
    value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TableReport {
    #[serde(flatten)]
    stats: meta_optimizer_storage::TableStats,
    size: Option<String>,
    columns: Vec<meta_optimizer_storage::ColumnReport>,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<OptimizerConfig> {
    let Some(path) = path else {
        return Ok(OptimizerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    OptimizerConfig::from_json(&text).with_context(|| format!("parse config {}", path.display()))
}

fn parse_value(text: &str, json: bool) -> anyhow::Result<MetaValue> {
    if !json {
        return Ok(MetaValue::text(text));
    }
    let parsed: JsonValue =
        serde_json::from_str(text).with_context(|| format!("invalid JSON value: {text}"))?;
    Ok(codec::from_json(parsed))
}

/// JSON for output: containers are shown as arrays.
fn value_json(value: &MetaValue) -> JsonValue {
    match value.items() {
        Some(items) => JsonValue::Array(items.iter().map(value_json).collect()),
        None => codec::to_json(value),
    }
}

fn outcome_json(outcome: &WriteOutcome) -> JsonValue {
    match outcome {
        WriteOutcome::Inserted(row_id) => json!({ "ok": true, "inserted": row_id }),
        WriteOutcome::Updated(rows) => json!({ "ok": true, "updated": rows }),
        WriteOutcome::Rejected(reason) => json!({ "ok": false, "rejected": format!("{reason:?}") }),
    }
}

fn run(cli: Cli) -> anyhow::Result<JsonValue> {
    let config = load_config(cli.config.as_deref())?;
    let storage = Storage::open_path_with(&cli.db, config.table_names())
        .with_context(|| format!("open database {}", cli.db.display()))?;
    let optimizer = MetaOptimizer::new(storage, config);

    let output = match cli.command {
        Command::Set(args) => {
            let value = parse_value(&args.value, args.json)?;
            let mut request = WriteRequest::new(args.meta_type, args.id, args.key, value)
                .unique(!args.non_unique)
                .add_meta(args.add)
                .check_current_value(!args.no_check);
            if let Some(prev) = &args.prev {
                request = request.prev_value(parse_value(prev, args.json)?);
            }
            outcome_json(&optimizer.write(request)?)
        }
        Command::Get(args) => match &args.key {
            Some(key) => {
                let value = optimizer.get_meta(args.meta_type, args.id, key)?;
                json!({ "key": key, "value": value.as_ref().map(value_json) })
            }
            None => {
                let row = optimizer.get_row(args.meta_type, args.id)?.unwrap_or_default();
                let fields: serde_json::Map<String, JsonValue> =
                    row.iter().map(|(key, value)| (key.clone(), value_json(value))).collect();
                JsonValue::Object(fields)
            }
        },
        Command::Delete(args) => {
            let rows = match &args.key {
                Some(key) => optimizer.delete_meta(args.meta_type, args.id, key)?,
                None => optimizer.delete_object(args.meta_type, args.id)?,
            };
            json!({ "ok": true, "rows": rows })
        }
        Command::Columns(args) => serde_json::to_value(optimizer.column_report(args.meta_type)?)?,
        Command::Import(args) => {
            let policy = DefaultPolicy::from_config(optimizer.config());
            let mut cursor = args.before;
            let mut batches = Vec::new();
            loop {
                let progress = optimizer.import_batch(args.meta_type, &policy, cursor, args.batch)?;
                cursor = progress.last_object_id.or(cursor);
                let finished = progress.finished;
                batches.push(progress);
                if finished || !args.all {
                    break;
                }
            }
            serde_json::to_value(batches)?
        }
        Command::Reset(args) => {
            optimizer.reset_table(args.meta_type)?;
            json!({ "ok": true, "table": optimizer.table(args.meta_type).name })
        }
        Command::Report(args) => {
            let types = match args.meta_type {
                Some(meta_type) => vec![meta_type],
                None => MetaType::ALL.to_vec(),
            };
            let mut tables = Vec::new();
            for meta_type in types {
                let stats = optimizer.table_stats(meta_type)?;
                tables.push(TableReport {
                    size: stats.size_bytes.map(|bytes| human_file_size(bytes, 1)),
                    columns: optimizer.column_report(meta_type)?,
                    stats,
                });
            }
            let cache = optimizer.cache().stats();
            json!({
                "tables": tables,
                "cache": { "hits": cache.hits, "misses": cache.misses, "loads": cache.loads },
            })
        }
        Command::SeedLegacy(args) => {
            if args.id == 0 || args.key.is_empty() {
                bail!("seed-legacy needs a non-zero --id and a non-empty --key");
            }
            let row_id = optimizer
                .store()
                .add_legacy_meta(args.meta_type, args.id, &args.key, &args.value)?;
            json!({ "ok": true, "rowId": row_id })
        }
    };
    Ok(output)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let output = run(Cli::parse())?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    if output.get("ok") == Some(&JsonValue::Bool(false)) {
        std::process::exit(2);
    }
    Ok(())
}
