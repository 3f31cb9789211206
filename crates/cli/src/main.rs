use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod args;
mod blob;
mod convert;
mod retention;
mod scans;

use args::{Cli, Command};

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dropzone=info".into());
    let json = json || std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.cmd {
        Command::Convert(args) => convert::run_convert(args),
        Command::Watch(args) => convert::run_watch(args).await,
        Command::Retention(args) => retention::run_retention(args),
        Command::Blob(cmd) => blob::run_blob(cmd).await,
        Command::Scans(cmd) => scans::run_scans(cmd).await,
    }
}
