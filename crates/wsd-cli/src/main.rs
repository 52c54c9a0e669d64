//! wsd CLI
//!
//! Renders the ws-daemon DaemonSet from an installation config and a version
//! manifest.

use clap::Parser;

use wsd_cli::{Cli, Result};
use wsd_common::telemetry::{init_telemetry, TelemetryConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        json: cli.log_json,
        ..Default::default()
    })?;

    cli.run()
}
