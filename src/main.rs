mod collection;
mod config;
mod error;
mod extract;
mod openapi;
mod render;
mod report;
mod sync;

use std::env;

use anyhow::Result;
use clap::{Arg, Command};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, DEFAULT_OPENAPI_JSON, OPENAPI_JSON_ENV, TARGET_DIR_ENV};

fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = build_cli().get_matches();

    let config = Config::from_matches(&matches, |key| env::var(key).ok())?;
    config.validate()?;

    let outcome = sync::run(&config)?;
    report::print_report(&outcome)
}

fn build_cli() -> Command {
    Command::new("opencollection-sync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Sync endpoint files from an OpenAPI JSON document into a collection directory")
        .arg(
            Arg::new("openapi_json")
                .long("openapi-json")
                .value_name("PATH")
                .help(format!(
                    "Path to openapi.json (default: ${OPENAPI_JSON_ENV} or {DEFAULT_OPENAPI_JSON})"
                )),
        )
        .arg(
            Arg::new("target_dir")
                .long("target-dir")
                .value_name("PATH")
                .help(format!(
                    "Target directory for endpoint yml files (default: ${TARGET_DIR_ENV})"
                )),
        )
}
