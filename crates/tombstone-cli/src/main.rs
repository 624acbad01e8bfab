//! tombstone - soft-delete object generator.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tombstone_cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "tombstone=debug"
    } else {
        "tombstone=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting tombstone");
    tombstone_cli::run(args)
}
