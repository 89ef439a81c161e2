//! Purpose: `kvitd` daemon entry point serving the local store over HTTP.
//! Role: Parses flags, builds a `ServeConfig`, and runs `kvit::serve::serve`.
//! Invariants: Defaults to port 14250 on all interfaces.
//! Invariants: Startup failures print `kvitd: <error>` and exit nonzero.
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::{Parser, ValueHint};
use kvit::api::{DEFAULT_PORT, to_exit_code};
use kvit::paths::default_db_path;
use kvit::serve::{ServeConfig, serve};

#[derive(Parser)]
#[command(name = "kvitd", version, about = "Serve a kvit database over HTTP")]
struct Args {
    #[arg(long, default_value_t = DEFAULT_PORT, help = "Port to listen on")]
    port: u16,
    #[arg(long, default_value = "0.0.0.0", help = "Address to bind")]
    bind: IpAddr,
    #[arg(
        long,
        help = "Database file (default: $KVIT_DB or $XDG_DATA_HOME/kvit/data.db)",
        value_hint = ValueHint::FilePath
    )]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = ServeConfig {
        bind: SocketAddr::new(args.bind, args.port),
        db_path: args.db.unwrap_or_else(default_db_path),
    };
    if let Err(err) = serve(config).await {
        eprintln!("kvitd: {err}");
        std::process::exit(to_exit_code(err.kind()));
    }
}
