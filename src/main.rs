//! Purpose: `kvit` CLI entry point.
//! Role: Binary crate root; parses args, resolves settings once, dispatches commands.
//! Invariants: Malformed invocations print usage to stderr and exit 0.
//! Invariants: Failures print `kvit: <error>` to stderr; exit code derives from `api::to_exit_code`.
//! Invariants: Writes are always local; reads follow the current context when one is set.
#![allow(clippy::result_large_err)]
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};

mod command_dispatch;

use kvit::api::{Error, ErrorKind, LocalClient, RemoteClient, is_plural_bucket, to_exit_code};
use kvit::config::Config;
use kvit::paths::{default_config_path, default_db_path};
use kvit::serve::init_tracing;

const USAGE: &str = "Usage:
  kvit <bucket> add <value>
  kvit <bucket> add <subkey> <value>
  kvit <bucket> get [subkey]
  kvit list-keys
  kvit context add <name> <address>
  kvit context use <name>
  kvit context unset

Examples:
  kvit servers add 127.0.0.1
  kvit servers add personal 127.0.0.1
  kvit servers get
  kvit servers get personal
  kvit config get db
  kvit list-keys
  kvit context add loopback 127.0.0.1
  kvit context use loopback
  kvit context unset
";

const UNENCRYPTED_WARNING: &str = "Warning: Data is sent unencrypted over the network. \
Ensure sensitive data is properly encapsulated.";

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

/// Paths resolved once at startup from flags and environment.
#[derive(Clone, Debug)]
struct Settings {
    db_path: PathBuf,
    config_path: PathBuf,
}

impl Settings {
    fn resolve(db: Option<PathBuf>, config: Option<PathBuf>) -> Self {
        Self {
            db_path: db.unwrap_or_else(default_db_path),
            config_path: config.unwrap_or_else(default_config_path),
        }
    }
}

enum ReadTarget {
    Local(LocalClient),
    Remote(RemoteClient),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BucketAction {
    Add { subkey: String, value: String },
    Get { subkey: String },
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                return Ok(RunOutcome::ok());
            }
            _ => return Ok(emit_usage()),
        },
    };

    init_tracing("warn");

    let settings = Settings::resolve(cli.db, cli.config);
    let config = Config::load(&settings.config_path)?;

    command_dispatch::dispatch_command(cli.command, &settings, config)
        .map_err(add_corrupt_hint)
        .map_err(add_io_hint)
}

#[derive(Parser)]
#[command(
    name = "kvit",
    version,
    about = "Personal key-value store with list buckets",
    long_about = None,
    after_help = USAGE,
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        help = "Database file (default: $KVIT_DB or $XDG_DATA_HOME/kvit/data.db)",
        value_hint = ValueHint::FilePath
    )]
    db: Option<PathBuf>,
    #[arg(
        long,
        help = "Contexts file (default: $XDG_CONFIG_HOME/kvit/config.yaml)",
        value_hint = ValueHint::FilePath
    )]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(name = "list-keys", about = "Print every stored key, sorted")]
    ListKeys,
    #[command(about = "Manage named remote daemon addresses")]
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },
    #[command(external_subcommand)]
    Bucket(Vec<String>),
}

#[derive(Subcommand)]
enum ContextCommand {
    #[command(about = "Add or replace a context")]
    Add { name: String, address: String },
    #[command(about = "Route reads to a context's daemon")]
    Use { name: String },
    #[command(about = "Go back to the local database")]
    Unset,
}

/// `<bucket> add [<subkey>] <value>` or `<bucket> get [<subkey>]`.
fn parse_bucket_args(args: &[String]) -> Option<(String, BucketAction)> {
    let (bucket, rest) = args.split_first()?;
    let (verb, rest) = rest.split_first()?;
    let action = match (verb.as_str(), rest) {
        ("add", [value]) => BucketAction::Add {
            subkey: String::new(),
            value: value.clone(),
        },
        ("add", [subkey, value]) => BucketAction::Add {
            subkey: subkey.clone(),
            value: value.clone(),
        },
        ("get", []) => BucketAction::Get {
            subkey: String::new(),
        },
        ("get", [subkey]) => BucketAction::Get {
            subkey: subkey.clone(),
        },
        _ => return None,
    };
    Some((bucket.clone(), action))
}

fn read_target(settings: &Settings, config: &Config) -> Result<ReadTarget, Error> {
    match config.remote_address() {
        Some(address) => {
            eprintln!("{UNENCRYPTED_WARNING}");
            Ok(ReadTarget::Remote(RemoteClient::for_address(address)?))
        }
        None => Ok(ReadTarget::Local(
            LocalClient::new().with_db_path(&settings.db_path),
        )),
    }
}

fn add_message(bucket: &str, subkey: &str, key: &str, value: &str) -> String {
    if !is_plural_bucket(bucket) {
        return format!("stored {key} = {value}");
    }
    if subkey.is_empty() {
        format!("appended to {bucket}: {value}")
    } else {
        format!("appended to {bucket} ({subkey}): {value}")
    }
}

fn emit_lines(lines: &[String]) -> Result<(), Error> {
    let mut out = io::stdout().lock();
    for line in lines {
        writeln!(out, "{line}").map_err(stdout_error)?;
    }
    out.flush().map_err(stdout_error)
}

fn stdout_error(err: io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write output")
        .with_source(err)
}

fn emit_usage() -> RunOutcome {
    eprint!("{USAGE}");
    RunOutcome::ok()
}

fn emit_error(err: &Error) {
    eprintln!("kvit: {err}");
    if let Some(hint) = err.hint() {
        eprintln!("hint: {hint}");
    }
}

fn add_io_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() {
        return err;
    }
    err.with_hint("I/O error. Check the database path (--db or KVIT_DB) and the daemon address.")
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Corrupt || err.hint().is_some() {
        return err;
    }
    err.with_hint("Stored state is malformed. Inspect it with `kvit list-keys`.")
}
