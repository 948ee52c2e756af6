mod config;
mod logging;
mod serve;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use proctrack_core::{validate, ListQuery, ProcessInput, ValidationRules};
use proctrack_storage::conformance::{run_conformance_suite, ConformanceReport};
use proctrack_storage::{FileStorage, MemoryStorage, ProcessStore};

use crate::config::{ServeArgs, ServeConfig, StorageArgs};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Backends the conformance command can exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendChoice {
    Memory,
    File,
    All,
}

/// Finance process tracking service.
#[derive(Parser)]
#[command(name = "proctrack", version, about = "Finance process tracking service")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve(ServeArgs),

    /// List stored processes
    List {
        #[command(flatten)]
        storage: StorageArgs,
        /// Only processes of this department (AP, AR, GL, Payroll)
        #[arg(long)]
        department: Option<String>,
        /// Only processes with this status
        #[arg(long)]
        status: Option<String>,
        /// Number of matching processes to skip
        #[arg(long)]
        skip: Option<String>,
        /// Maximum number of processes to show (1-100)
        #[arg(long)]
        limit: Option<String>,
    },

    /// Import processes from a CSV file into the process table
    Import {
        /// Path to the CSV file
        file: PathBuf,
        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Validate a JSON process document (or array of documents) without storing it
    Validate {
        /// Path to the JSON file
        file: PathBuf,
        /// Restrict appsUsed entries to the known application list
        #[arg(long)]
        strict_apps: bool,
    },

    /// Run the storage backend conformance suite
    Conformance {
        /// Backend to check
        #[arg(long, value_enum, default_value = "all")]
        backend: BackendChoice,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve(_) => "info",
        _ => "warn",
    };
    logging::init(default_level);

    match cli.command {
        Commands::Serve(args) => {
            let config = match ServeConfig::resolve(&args, |key| std::env::var(key).ok()) {
                Ok(config) => config,
                Err(e) => {
                    report_error(&format!("configuration error: {e}"), cli.output, cli.quiet);
                    process::exit(1);
                }
            };
            let rt = runtime(cli.output, cli.quiet);
            if let Err(e) = rt.block_on(serve::start_server(config)) {
                report_error(&format!("server error: {e}"), cli.output, cli.quiet);
                process::exit(1);
            }
        }
        Commands::List {
            storage,
            department,
            status,
            skip,
            limit,
        } => {
            let params = [
                ("department", department),
                ("status", status),
                ("skip", skip),
                ("limit", limit),
            ];
            cmd_list(&storage, &params, cli.output, cli.quiet);
        }
        Commands::Import { file, storage } => {
            cmd_import(&file, &storage, cli.output, cli.quiet);
        }
        Commands::Validate { file, strict_apps } => {
            cmd_validate(&file, ValidationRules { strict_apps }, cli.output, cli.quiet);
        }
        Commands::Conformance { backend } => {
            cmd_conformance(backend, cli.output, cli.quiet);
        }
    }
}

fn runtime(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start async runtime: {e}"), output, quiet);
            process::exit(1);
        }
    }
}

/// Open the process table for an offline command.
fn open_store(storage: &StorageArgs, output: OutputFormat, quiet: bool) -> ProcessStore {
    let env = |key: &str| std::env::var(key).ok();
    let path = config::resolve_data_path(storage, env);
    match FileStorage::open(&path) {
        Ok(backend) => {
            ProcessStore::new(Arc::new(backend)).with_rules(config::resolve_rules(storage, env))
        }
        Err(e) => {
            report_error(&format!("error opening '{}': {e}", path.display()), output, quiet);
            process::exit(1);
        }
    }
}

fn print_json(value: &impl serde::Serialize, output: OutputFormat, quiet: bool) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            report_error(&format!("failed to encode output: {e}"), output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_list(
    storage: &StorageArgs,
    params: &[(&str, Option<String>)],
    output: OutputFormat,
    quiet: bool,
) {
    let query = match ListQuery::from_params(
        params
            .iter()
            .filter_map(|(key, value)| value.as_deref().map(|v| (*key, v))),
    ) {
        Ok(query) => query,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    let store = open_store(storage, output, quiet);
    let rt = runtime(output, quiet);
    let page = match rt.block_on(store.list(&query)) {
        Ok(page) => page,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => print_json(&page, output, quiet),
        OutputFormat::Text => {
            for record in &page.processes {
                let fields = &record.fields;
                println!(
                    "{:>5}  {:<7} {:<12} {:<9} {:>5} x{:<4} {}",
                    record.id,
                    fields.department.as_str(),
                    fields.status.as_str(),
                    fields.frequency.as_str(),
                    fields.duration.to_string(),
                    fields.volume,
                    fields.process_name
                );
            }
            if !quiet {
                println!("{} of {} processes", page.processes.len(), page.total);
            }
        }
    }
}

fn cmd_import(file: &Path, storage: &StorageArgs, output: OutputFormat, quiet: bool) {
    let text = match std::fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            report_error(&format!("error reading file '{}': {e}", file.display()), output, quiet);
            process::exit(1);
        }
    };

    let store = open_store(storage, output, quiet);
    let rt = runtime(output, quiet);
    let report = match rt.block_on(store.import_csv(&text)) {
        Ok(report) => report,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(store.close()) {
        report_error(&e.to_string(), output, quiet);
        process::exit(1);
    }

    match output {
        OutputFormat::Json => print_json(&report, output, quiet),
        OutputFormat::Text => {
            println!(
                "imported {} processes, {} rows rejected",
                report.success_count, report.error_count
            );
            for error in &report.errors {
                println!("  {error}");
            }
        }
    }
}

fn cmd_validate(file: &Path, rules: ValidationRules, output: OutputFormat, quiet: bool) {
    let text = match std::fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            report_error(&format!("error reading file '{}': {e}", file.display()), output, quiet);
            process::exit(1);
        }
    };
    let doc: serde_json::Value = match serde_json::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => {
            report_error(&format!("error parsing JSON in '{}': {e}", file.display()), output, quiet);
            process::exit(1);
        }
    };

    let items = match doc {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    let results: Vec<serde_json::Value> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let outcome = ProcessInput::from_json(item).and_then(|input| validate(&input, &rules));
            match outcome {
                Ok(_) => serde_json::json!({ "index": index, "valid": true }),
                Err(e) => serde_json::json!({
                    "index": index,
                    "valid": false,
                    "error": e.to_string(),
                    "violations": e.violations,
                }),
            }
        })
        .collect();
    let invalid = results.iter().filter(|r| r["valid"] == false).count();

    match output {
        OutputFormat::Json => print_json(
            &serde_json::json!({ "valid": invalid == 0, "results": results }),
            output,
            quiet,
        ),
        OutputFormat::Text => {
            for result in results.iter().filter(|r| r["valid"] == false) {
                println!(
                    "item {}: {}",
                    result["index"],
                    result["error"].as_str().unwrap_or("invalid")
                );
            }
            if !quiet {
                println!("{} of {} documents valid", results.len() - invalid, results.len());
            }
        }
    }

    if invalid > 0 {
        process::exit(1);
    }
}

fn cmd_conformance(backend: BackendChoice, output: OutputFormat, quiet: bool) {
    let rt = runtime(output, quiet);
    let mut reports: Vec<(&str, ConformanceReport)> = Vec::new();

    if matches!(backend, BackendChoice::Memory | BackendChoice::All) {
        let report = rt.block_on(run_conformance_suite(|| async { MemoryStorage::new() }));
        reports.push(("memory", report));
    }

    if matches!(backend, BackendChoice::File | BackendChoice::All) {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                report_error(&format!("failed to create scratch directory: {e}"), output, quiet);
                process::exit(1);
            }
        };
        let counter = std::sync::atomic::AtomicUsize::new(0);
        let report = rt.block_on(run_conformance_suite(|| {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let path = dir.path().join(format!("table-{n}.json"));
            async move {
                match FileStorage::open(&path) {
                    Ok(storage) => storage,
                    Err(e) => {
                        report_error(&format!("failed to open scratch table: {e}"), output, quiet);
                        process::exit(1);
                    }
                }
            }
        }));
        reports.push(("file", report));
    }

    let failed: usize = reports.iter().map(|(_, r)| r.failed).sum();
    match output {
        OutputFormat::Json => {
            let body: serde_json::Map<String, serde_json::Value> = reports
                .iter()
                .map(|(name, report)| {
                    (
                        name.to_string(),
                        serde_json::to_value(report).unwrap_or(serde_json::Value::Null),
                    )
                })
                .collect();
            print_json(&body, output, quiet);
        }
        OutputFormat::Text => {
            for (name, report) in &reports {
                print!("[{name}] {report}");
            }
        }
    }

    if failed > 0 {
        process::exit(1);
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}
