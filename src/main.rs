#![warn(clippy::all)]

use clap::Parser;

use crate::helpers::tracing::format_elapsed;
use crate::opts::{Opts, Subcommand};
use crate::prelude::*;

mod database;
mod helpers;
mod opts;
mod prelude;
mod provisioner;
mod schema;
mod verifier;

#[tokio::main]
async fn main() -> Result {
    let opts = Opts::parse();
    let _sentry_guard = helpers::tracing::init(opts.sentry_dsn.clone(), opts.traces_sample_rate)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting…");

    let start_instant = Instant::now();
    let result = match opts.subcommand.unwrap_or(Subcommand::Provision) {
        Subcommand::Provision => provisioner::run(opts).await,
        Subcommand::Verify => verifier::run(opts).await,
    };
    finish(result, start_instant)
}

/// Reports the outcome. The error itself is printed once, by the runtime, when returned from `main`.
fn finish(result: Result, start_instant: Instant) -> Result {
    match result {
        Ok(_) => info!(elapsed = format_elapsed(start_instant).as_str(), "finished"),
        Err(ref error) => {
            sentry::integrations::anyhow::capture_anyhow(error);
        }
    }
    result
}
