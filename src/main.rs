//! # Food Scene Images
//!
//! Finds stills of food scenes from a fixed list of films, ranks them, and
//! downloads the best ones.
//!
//! ## Sources
//!
//! - Editorial "best food scenes" listicles (HTML, alt text plus captions)
//! - A movie stills database (search page, then result pages)
//! - Reddit's search JSON API across food and film subreddits
//!
//! ## Usage
//!
//! ```sh
//! food_scene_images -o ./scrape-output -n 30
//! ```
//!
//! ## Architecture
//!
//! 1. **Planning**: one crawl target per page, subject, or (subreddit, query)
//! 2. **Crawling**: targets run concurrently, paced per host
//! 3. **Classification**: keyword and subject matching; irrelevant images dropped
//! 4. **Ranking**: additive capped score, stable sort
//! 5. **Output**: `image_metadata.json`, `image_mapping.json`, and the
//!    top-ranked images under `downloaded/`

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod caption;
mod classify;
mod cli;
mod config;
mod download;
mod error;
mod http;
mod models;
mod outputs;
mod pipeline;
mod scheduler;
mod scoring;
mod scrapers;
#[cfg(test)]
mod test_support;
mod utils;

use cli::Cli;
use config::Config;
use http::Fetcher;
use scrapers::WebAdapter;

#[tokio::main]
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

    let start_time = std::time::Instant::now();
    info!("food_scene_images starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    let fetcher = Fetcher::new(&config.crawl)?;
    let adapter = WebAdapter::new(&fetcher, &config.sources);

    let summary = match pipeline::run(&config, &adapter, &fetcher).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(
                path = %config.output_dir.display(),
                error = %e,
                "Could not write run output (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        images = summary.kept(),
        metadata = %summary.metadata_path.display(),
        "Execution complete"
    );

    Ok(())
}
