//! Markdown Schema CLI
//!
//! Command-line interface for validating markdown documents against schemas.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use md_schema::{
    check, parse, synthesize, synthesize_metadata, write_skeleton, FileStatus, Settings, Workspace,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "md-schema")]
#[command(about = "Validate markdown documents against JSON Schemas")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate documents against the schema named in their header
    Check {
        /// File or directory to check
        path: PathBuf,

        /// Directory that $schema values are resolved against
        #[arg(long)]
        schema_root: Option<PathBuf>,

        /// Settings file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Suppress progress output, only show failures
        #[arg(long, short)]
        quiet: bool,
    },

    /// Print the positioned tree of a document
    Tree {
        /// Document to parse
        document: PathBuf,

        /// Print the validation instance (no positions) instead
        #[arg(long)]
        instance: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Derive a schema skeleton from an example document
    Synthesize {
        /// Example document
        document: PathBuf,

        /// Describe only the header data
        #[arg(long)]
        metadata: bool,

        /// Write the skeleton to the document's $schema path
        #[arg(long, conflicts_with_all = ["output", "metadata"])]
        write: bool,

        /// Directory that $schema values are resolved against
        #[arg(long)]
        schema_root: Option<PathBuf>,

        /// Settings file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            path,
            schema_root,
            config,
            json,
            quiet,
        } => load_settings(config.as_deref(), schema_root)
            .and_then(|settings| run_check(&path, settings, json, quiet)),

        Commands::Tree {
            document,
            instance,
            pretty,
        } => run_tree(&document, instance, pretty),

        Commands::Synthesize {
            document,
            metadata,
            write,
            schema_root,
            config,
            output,
            pretty,
        } => load_settings(config.as_deref(), schema_root).and_then(|settings| {
            run_synthesize(SynthesizeArgs {
                document,
                metadata,
                write,
                settings,
                output,
                pretty,
            })
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Settings from the config file (if any), with flags taking precedence.
fn load_settings(config: Option<&Path>, schema_root: Option<PathBuf>) -> Result<Settings, u8> {
    let settings = match config {
        Some(path) => Settings::load(path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?,
        None => Settings::default(),
    };

    Ok(match schema_root {
        Some(root) => settings.schema_root(root),
        None => settings,
    })
}

fn read_document(path: &Path) -> Result<String, u8> {
    std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error reading {}: {}", path.display(), e);
        3u8
    })
}

fn to_json(value: &impl serde::Serialize, pretty: bool) -> Result<String, u8> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })
}

fn run_check(path: &Path, settings: Settings, json_output: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(3);
    }

    let workspace = Workspace::on_disk(settings);
    let result = check(&workspace, path);

    if json_output {
        println!("{}", to_json(&result, true)?);
    } else {
        if !quiet {
            println!("Checking {} ...\n", path.display());
        }

        for report in &result.results {
            let status_icon = match report.status {
                FileStatus::Valid => "\x1b[32m✓\x1b[0m",
                FileStatus::Skipped => "\x1b[33m-\x1b[0m",
                FileStatus::Invalid | FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            let failing = matches!(report.status, FileStatus::Invalid | FileStatus::Error);
            if !quiet || failing {
                match report.status {
                    FileStatus::Skipped => {
                        println!("  {} {} (no schema)", status_icon, report.file.display())
                    }
                    _ => println!("  {} {}", status_icon, report.file.display()),
                }
            }

            if let Some(failure) = &report.failure {
                println!("    \x1b[31merror\x1b[0m: {}", failure);
            }

            for error in &report.errors {
                let location = error
                    .location
                    .map(|span| span.start.to_string())
                    .unwrap_or_else(|| "document".to_string());
                println!(
                    "    \x1b[31m{}[{}]\x1b[0m: {} - {}",
                    location, error.keyword, error.path, error.message
                );
            }
        }

        println!();
        if result.is_ok() {
            println!(
                "\x1b[32m✓ {} files checked, all passed ({} without schema)\x1b[0m",
                result.files_checked, result.skipped
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed, {} without schema ({} errors)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.skipped, result.errors
            );
        }
    }

    match result.exit_code() {
        0 => Ok(()),
        code => Err(code as u8),
    }
}

fn run_tree(path: &Path, instance: bool, pretty: bool) -> Result<(), u8> {
    let text = read_document(path)?;
    let document = parse(&text);

    let output = if instance {
        to_json(&document.root.to_instance(), pretty)?
    } else {
        to_json(&document.root, pretty)?
    };
    println!("{}", output);
    Ok(())
}

struct SynthesizeArgs {
    document: PathBuf,
    metadata: bool,
    write: bool,
    settings: Settings,
    output: Option<PathBuf>,
    pretty: bool,
}

fn run_synthesize(args: SynthesizeArgs) -> Result<(), u8> {
    let SynthesizeArgs {
        document: path,
        metadata,
        write,
        settings,
        output,
        pretty,
    } = args;

    let text = read_document(&path)?;
    let document = parse(&text);

    if write {
        let written = write_skeleton(&document, &settings.schema_root).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;
        println!("Wrote {}", written.display());
        return Ok(());
    }

    let schema = if metadata {
        let Some(map) = document.metadata.as_ref() else {
            eprintln!("Error: {} has no header data", path.display());
            return Err(2);
        };
        synthesize_metadata(map)
    } else {
        synthesize(&document.root)
    };

    let json_output = to_json(&schema, pretty)?;
    match output {
        Some(out) => {
            std::fs::write(&out, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", out.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}
