//! # Feed Poster
//!
//! A one-shot agent that keeps a graphic design Facebook page fed. Each run
//! picks a design news feed, drafts a short post about its newest story with
//! Gemini, and publishes the draft to the page.
//!
//! ## Usage
//!
//! ```sh
//! GEMINI_API_KEY=... FACEBOOK_PAGE_ID=... FACEBOOK_PAGE_ACCESS_TOKEN=... feed_poster
//! feed_poster --dry-run --report-json ./runs/latest.json
//! feed_poster --check-env
//! ```
//!
//! ## Architecture
//!
//! The run is a strict three-stage pipeline:
//! 1. **Acquisition**: Try up to `--max-attempts` distinct feeds in random
//!    order and keep the first entry of the first feed that parses
//! 2. **Generation**: One Gemini call turns the entry into a post body
//! 3. **Publication**: One form POST to the page's Graph API feed edge
//!
//! A failed stage ends the run. The process still exits normally; the
//! outcome is carried by the logs and the JSON run report.

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod attempts;
mod cli;
mod config;
mod error;
mod feeds;
mod generator;
mod models;
mod outputs;
mod pipeline;
mod publisher;
mod selector;
mod utils;

use api::{GeminiClient, RetryAsk};
use cli::Cli;
use config::Config;
use feeds::HttpFeedFetcher;
use generator::ContentGenerator;
use outputs::report;
use pipeline::Pipeline;
use publisher::{GraphApiTransport, Publisher};
use selector::SourceSelector;

/// Base delay between generation retries when `--generation-retries` is set.
const GENERATION_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("Agent starting up");

    let args = Cli::parse();
    let config = match Config::from_cli(&args).await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    debug!(?config, "Resolved configuration");

    if args.check_env {
        for status in config.check_environment() {
            info!(
                name = status.name,
                present = status.present,
                shown = status.shown.as_deref().unwrap_or("<missing>"),
                "Credential check"
            );
            println!(
                "{}: {}",
                status.name,
                status.shown.as_deref().unwrap_or("MISSING")
            );
        }
        return Ok(());
    }

    // One client shared by every stage
    let client = config.http_client()?;

    let pipeline = Pipeline::new(
        SourceSelector::new(HttpFeedFetcher::new(client.clone())),
        ContentGenerator::new(RetryAsk::new(
            GeminiClient::from_config(&config, client.clone()),
            config.generation_retries,
            GENERATION_RETRY_BASE_DELAY,
        )),
        Publisher::from_config(&config, GraphApiTransport::new(client)),
        config.attempt_policy(),
        config.dry_run,
    );

    let run = pipeline.run(&config.catalog, &mut rand::rng()).await;

    if run.succeeded() {
        info!(state = ?run.final_state, elapsed_ms = run.elapsed_ms, "Pipeline finished");
    } else {
        error!(
            state = ?run.final_state,
            elapsed_ms = run.elapsed_ms,
            failure = ?run.failure(),
            "Pipeline stopped early"
        );
    }

    match report::report_json_line(&run) {
        Ok(line) => info!(report = %line, "Run report"),
        Err(e) => error!(error = %e, "Failed to serialize run report"),
    }

    if let Some(path) = &config.report_json {
        if let Err(e) = report::write_report(&run, path).await {
            error!(path = %path.display(), error = %e, "Failed to write run report");
        }
    }

    info!("Agent run complete");
    Ok(())
}
