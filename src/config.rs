//! Run configuration.
//!
//! A [`Config`] is built once in `main` from the built-in defaults, an
//! optional YAML file, and the command-line overrides, then passed by
//! reference to every stage. Nothing reads configuration from globals.
//!
//! ```yaml
//! taxonomy:
//!   subjects:
//!     - name: Julie & Julia
//!       aliases: [Julie and Julia]
//!     - name: Ratatouille
//! crawl:
//!   concurrency: 2
//!   delays_ms:
//!     reddit: 1500
//! download:
//!   cap: 10
//! ```

use crate::cli::Cli;
use crate::error::ConfigError;
use clap::ValueEnum;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// The three families of sources the crawler knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SourceFamily {
    Editorial,
    StillsDb,
    Reddit,
}

/// Request classes that are paced and identified separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Editorial,
    StillsDb,
    Reddit,
    Download,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub taxonomy: TargetTaxonomy,
    pub sources: SourcesConfig,
    pub crawl: CrawlConfig,
    pub download: DownloadConfig,
    pub scoring: ScoreWeights,
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            taxonomy: TargetTaxonomy::default(),
            sources: SourcesConfig::default(),
            crawl: CrawlConfig::default(),
            download: DownloadConfig::default(),
            scoring: ScoreWeights::default(),
            output_dir: PathBuf::from("scrape-output"),
        }
    }
}

/// One target subject, with alternative spellings that count as a match.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Subject {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// The canonical name followed by every alias.
    pub fn spellings(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Subjects and keywords the classifier matches against. Read-only for the
/// whole run; order matters, since the first matching subject wins.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TargetTaxonomy {
    pub subjects: Vec<Subject>,
    pub keywords: Vec<String>,
    /// Keywords too generic to earn a scoring bonus on their own.
    pub generic_keywords: Vec<String>,
}

impl Default for TargetTaxonomy {
    fn default() -> Self {
        let subjects = vec![
            Subject::new("Goodfellas"),
            Subject::new("Ratatouille"),
            Subject::new("Pulp Fiction"),
            Subject::new("Chef"),
            Subject::with_aliases("Julie & Julia", &["Julie and Julia"]),
            Subject::new("Big Night"),
            Subject::new("Eat Pray Love"),
            Subject::new("The Hundred-Foot Journey"),
            Subject::new("Burnt"),
            Subject::new("No Reservations"),
        ];
        let keywords = [
            "food", "meal", "dinner", "breakfast", "lunch", "cook", "restaurant", "chef", "dish",
            "recipe", "kitchen", "bake", "dessert", "feast", "cuisine", "pasta", "pizza", "burger",
            "sushi", "chocolate", "wine", "coffee", "bread", "ratatouille", "aglio e olio",
            "bruschetta", "cannoli", "big kahuna burger", "prison dinner", "cooking scene",
            "food scene",
        ];
        Self {
            subjects,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            generic_keywords: ["food", "meal", "cook"].iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl TargetTaxonomy {
    pub fn subject_names(&self) -> impl Iterator<Item = &str> {
        self.subjects.iter().map(|s| s.name.as_str())
    }

    pub fn contains_subject(&self, name: &str) -> bool {
        self.subjects.iter().any(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub enabled: Vec<SourceFamily>,
    pub editorial_pages: Vec<String>,
    pub stills_base_url: String,
    /// Search results followed per subject on the stills database.
    pub stills_max_results: usize,
    pub reddit_base_url: String,
    pub subreddits: Vec<String>,
    pub reddit_queries: Vec<String>,
    /// Subreddits that also get a `"{subject} food"` query per subject.
    pub subject_query_subreddits: Vec<String>,
    pub subject_query_limit: usize,
    pub reddit_result_limit: u32,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            enabled: vec![SourceFamily::Editorial, SourceFamily::StillsDb, SourceFamily::Reddit],
            editorial_pages: strings(&[
                "https://editorial.rottentomatoes.com/guide/best-food-movies/",
                "https://www.tasteofcinema.com/2015/the-30-most-memorable-food-scenes-in-movies/",
                "https://screenrant.com/best-food-movies-scenes-ever-iconic-ranked/",
                "https://www.eater.com/food-scenes-movies-tv-best-iconic",
                "https://fictionalfood.net/pages/movie-foods",
                "https://www.eatthis.com/iconic-food-scenes-movies/",
                "https://www.bonappetit.com/story/best-food-scenes-movies",
                "https://www.foodandwine.com/lifestyle/entertainment/iconic-food-scenes-movies",
            ]),
            stills_base_url: "https://www.moviestillsdb.com".to_string(),
            stills_max_results: 3,
            reddit_base_url: "https://www.reddit.com".to_string(),
            subreddits: strings(&[
                "food",
                "FoodPorn",
                "Cooking",
                "moviefood",
                "MovieDetails",
                "movies",
                "CookingForOne",
                "MealPrepSunday",
                "tonightsdinner",
                "DailyFood",
                "FoodPics",
            ]),
            reddit_queries: strings(&[
                "movie food",
                "film food scene",
                "cooking movie",
                "food in movies",
                "iconic food scene",
            ]),
            subject_query_subreddits: strings(&["movies", "MovieDetails"]),
            subject_query_limit: 5,
            reddit_result_limit: 50,
        }
    }
}

impl SourcesConfig {
    pub fn is_enabled(&self, family: SourceFamily) -> bool {
        self.enabled.contains(&family)
    }
}

/// Minimum spacing between two requests to the same host, per request kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelaysMs {
    pub editorial: u64,
    pub stills_db: u64,
    pub reddit: u64,
    pub download: u64,
}

impl Default for DelaysMs {
    fn default() -> Self {
        Self {
            editorial: 3000,
            stills_db: 2000,
            reddit: 1000,
            download: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub delays_ms: DelaysMs,
    /// Crawl targets in flight at once.
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub reddit_user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            delays_ms: DelaysMs::default(),
            concurrency: 4,
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            reddit_user_agent: "FoodInMoviesImageScraper/1.0".to_string(),
        }
    }
}

impl CrawlConfig {
    pub fn delay(&self, kind: RequestKind) -> Duration {
        let ms = match kind {
            RequestKind::Editorial => self.delays_ms.editorial,
            RequestKind::StillsDb => self.delays_ms.stills_db,
            RequestKind::Reddit => self.delays_ms.reddit,
            RequestKind::Download => self.delays_ms.download,
        };
        Duration::from_millis(ms)
    }

    pub fn user_agent(&self, kind: RequestKind) -> &str {
        match kind {
            RequestKind::Reddit => &self.reddit_user_agent,
            _ => &self.user_agent,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub enabled: bool,
    /// Download attempts made per run, counted over candidates that have an
    /// image URL.
    pub cap: usize,
    /// Subdirectory of the output directory that receives image files.
    pub subdir: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cap: 30,
            subdir: "downloaded".to_string(),
        }
    }
}

pub const DEFAULT_ENGAGEMENT_DIVISOR: f64 = 100.0;
pub const DEFAULT_ENGAGEMENT_CAP: f64 = 10.0;
pub const DEFAULT_SUBJECT_BONUS: f64 = 20.0;
pub const DEFAULT_KEYWORD_BONUS: f64 = 2.0;
pub const DEFAULT_DISCUSSION_DIVISOR: f64 = 10.0;
pub const DEFAULT_DISCUSSION_CAP: f64 = 5.0;

/// Weights of the additive quality score.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub engagement_divisor: f64,
    pub engagement_cap: f64,
    pub subject_bonus: f64,
    pub keyword_bonus: f64,
    pub discussion_divisor: f64,
    pub discussion_cap: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            engagement_divisor: DEFAULT_ENGAGEMENT_DIVISOR,
            engagement_cap: DEFAULT_ENGAGEMENT_CAP,
            subject_bonus: DEFAULT_SUBJECT_BONUS,
            keyword_bonus: DEFAULT_KEYWORD_BONUS,
            discussion_divisor: DEFAULT_DISCUSSION_DIVISOR,
            discussion_cap: DEFAULT_DISCUSSION_CAP,
        }
    }
}

impl Config {
    /// Build the run configuration: defaults, then the YAML file named by
    /// `--config`, then individual flags.
    #[instrument(level = "info", skip_all)]
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        config.validate()?;
        info!(
            subjects = config.taxonomy.subjects.len(),
            keywords = config.taxonomy.keywords.len(),
            output_dir = %config.output_dir.display(),
            download_cap = config.download.cap,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })?;
        debug!(path, "Parsed YAML configuration");
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(dir) = &cli.output_dir {
            self.output_dir = PathBuf::from(dir);
        }
        if !cli.subjects.is_empty() {
            self.taxonomy.subjects = cli
                .subjects
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(Subject::new)
                .collect();
        }
        if let Some(ms) = cli.delay_ms {
            self.crawl.delays_ms = DelaysMs {
                editorial: ms,
                stills_db: ms,
                reddit: ms,
                download: ms,
            };
        }
        if let Some(cap) = cli.download_cap {
            self.download.cap = cap;
        }
        if let Some(n) = cli.concurrency {
            self.crawl.concurrency = n;
        }
        if !cli.sources.is_empty() {
            self.sources.enabled = cli.sources.clone();
        }
        if cli.skip_downloads {
            self.download.enabled = false;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.crawl.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "crawl.concurrency",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.taxonomy.subjects.is_empty() && self.taxonomy.keywords.is_empty() {
            return Err(ConfigError::Invalid {
                field: "taxonomy",
                reason: "needs at least one subject or keyword".to_string(),
            });
        }
        for (field, divisor) in [
            ("scoring.engagement_divisor", self.scoring.engagement_divisor),
            ("scoring.discussion_divisor", self.scoring.discussion_divisor),
        ] {
            if divisor <= 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be positive, got {divisor}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_builtin_defaults() {
        let config = Config::default();
        assert_eq!(config.taxonomy.subjects.len(), 10);
        assert_eq!(config.sources.editorial_pages.len(), 8);
        assert_eq!(config.sources.subreddits.len(), 11);
        assert_eq!(config.download.cap, 30);
        assert_eq!(config.crawl.delay(RequestKind::Editorial), Duration::from_secs(3));
        assert_eq!(config.crawl.delay(RequestKind::Reddit), Duration::from_secs(1));
        assert_eq!(config.crawl.user_agent(RequestKind::Reddit), "FoodInMoviesImageScraper/1.0");
        assert_eq!(config.scoring, ScoreWeights::default());
    }

    #[test]
    fn test_yaml_overrides_only_named_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "taxonomy:\n  subjects:\n    - name: Chef\n      aliases: [Chef 2014]\ncrawl:\n  delays_ms:\n    reddit: 1500\nscoring:\n  subject_bonus: 25\n"
        )
        .unwrap();

        let config = Config::from_yaml_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.taxonomy.subjects, vec![Subject::with_aliases("Chef", &["Chef 2014"])]);
        // keywords section absent: defaults kept
        assert!(config.taxonomy.keywords.contains(&"dinner".to_string()));
        assert_eq!(config.crawl.delays_ms.reddit, 1500);
        assert_eq!(config.crawl.delays_ms.editorial, 3000);
        assert_eq!(config.scoring.subject_bonus, 25.0);
        assert_eq!(config.scoring.keyword_bonus, DEFAULT_KEYWORD_BONUS);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "crawl: [not, a, map]").unwrap();
        let err = Config::from_yaml_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "food_scene_images",
            "-o",
            "/tmp/out",
            "--subjects",
            "Burnt, Chef",
            "--delay-ms",
            "10",
            "-n",
            "5",
            "--sources",
            "reddit",
            "--skip-downloads",
        ]);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.taxonomy.subject_names().collect::<Vec<_>>(), vec!["Burnt", "Chef"]);
        assert_eq!(config.crawl.delay(RequestKind::Download), Duration::from_millis(10));
        assert_eq!(config.download.cap, 5);
        assert!(!config.download.enabled);
        assert!(config.sources.is_enabled(SourceFamily::Reddit));
        assert!(!config.sources.is_enabled(SourceFamily::Editorial));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let cli = Cli::parse_from(["food_scene_images", "--concurrency", "0"]);
        assert!(matches!(
            Config::load(&cli),
            Err(ConfigError::Invalid { field: "crawl.concurrency", .. })
        ));
    }
}
