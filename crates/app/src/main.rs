mod config;
mod html;
mod server;
mod telemetry;
mod tracking;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::{
    config::{TrackerCliArgs, TrackerConfig},
    server::{ServerState, run_server},
    tracking::{DefaultSessionFactory, SessionController},
};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = TrackerConfig::try_from(TrackerCliArgs::parse())?;
    telemetry::init_tracing(config.verbose);
    telemetry::init_metrics_recorder();

    info!(
        source = %config.capture.uri,
        kind = ?config.capture.source_kind,
        width = config.capture.width,
        height = config.capture.height,
        "Starting rep tracker"
    );

    let factory = Arc::new(DefaultSessionFactory::new(&config));
    let controller = Arc::new(SessionController::new(factory, config.retry_backoff));
    let state = ServerState {
        controller: controller.clone(),
        stream: config.stream,
    };

    let served = run_server(state, config.host.clone(), config.port);
    if let Some(summary) = controller.shutdown() {
        info!(reps = summary.reps, frames = summary.frames, "Final tracking session closed");
    }
    served
}
