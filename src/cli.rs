//! Command-line interface definitions.
//!
//! Every flag is optional: with none, a run crawls the built-in sources for
//! the built-in subjects and writes to `./scrape-output`.

use crate::config::SourceFamily;
use clap::Parser;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Full run with defaults
/// food_scene_images
///
/// # Two films, Reddit only, no downloads
/// food_scene_images -s "Goodfellas,Big Night" --sources reddit --skip-downloads
///
/// # Settings from a YAML file, slower pacing
/// food_scene_images -c scrape.yaml --delay-ms 4000 -o ./images
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory for the metadata files and downloaded images
    #[arg(short, long, env = "SCRAPE_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// Optional path to a YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Comma-separated subjects replacing the configured taxonomy subjects
    #[arg(short, long, value_delimiter = ',')]
    pub subjects: Vec<String>,

    /// Minimum delay between requests to the same host, applied to every source
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Maximum number of download attempts
    #[arg(short = 'n', long)]
    pub download_cap: Option<usize>,

    /// Number of crawl targets processed concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Restrict the crawl to these source families
    #[arg(long, value_enum, value_delimiter = ',')]
    pub sources: Vec<SourceFamily>,

    /// Write metadata only; do not download any images
    #[arg(long)]
    pub skip_downloads: bool,
}
