#![cfg(not(tarpaulin_include))]

use asset_register::app;
use asset_register::config::Settings;
use clap::Parser;
use std::path::PathBuf;

/// Web server for browsing fixed-asset registers
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the settings
    #[arg(short, long)]
    bind: Option<String>,

    /// Zero-based sheet row holding the column names
    #[arg(long)]
    header_row: Option<usize>,
}

/// Main entry point for the web application
///
/// Settings come from defaults, the optional `--config` file, the
/// `ASSET_REGISTER_*` environment variables and finally the flags.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }
    if let Some(row) = args.header_row {
        settings.header_row = row;
    }

    app::run(settings).await
}
