use serde::Deserialize;

/// Main configuration structure for Immo-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub blocking: BlockingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

impl Config {
    /// Builds a configuration with every section at its defaults
    pub fn with_seeds(seeds: Vec<String>) -> Self {
        Self {
            crawler: CrawlerConfig {
                seeds,
                max_pages: None,
                workers: default_workers(),
                request_timeout_secs: default_request_timeout(),
                allowed_domains: Vec::new(),
            },
            retry: RetryConfig::default(),
            politeness: PolitenessConfig::default(),
            identity: IdentityConfig::default(),
            blocking: BlockingConfig::default(),
            output: OutputConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

/// Crawl scope and scheduling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Search-result URLs, one independent pagination traversal each
    pub seeds: Vec<String>,

    /// Stop requesting listing pages for a seed after this many
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Number of seeds crawled concurrently
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Hosts detail and next-page links may point to. Empty means the seed hosts.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

/// Transport retry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in seconds, doubled on every retry
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound for a single backoff delay, in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff: f64,

    /// Randomize each delay by ±20%
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// HTTP statuses that are retried
    #[serde(default = "default_retry_statuses")]
    pub statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            max_backoff: default_max_backoff(),
            jitter: true,
            statuses: default_retry_statuses(),
        }
    }
}

/// Politeness delay ranges, inclusive, in milliseconds
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolitenessConfig {
    /// Delay before fetching the next listing page
    #[serde(default = "default_listing_delay")]
    pub listing_delay_ms: [u64; 2],

    /// Delay before fetching a detail page
    #[serde(default = "default_detail_delay")]
    pub detail_delay_ms: [u64; 2],
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            listing_delay_ms: default_listing_delay(),
            detail_delay_ms: default_detail_delay(),
        }
    }
}

/// When the rotator draws a fresh preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RotationMode {
    #[default]
    PerRequest,
    PerSession,
}

/// Request identity configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct IdentityConfig {
    #[serde(default)]
    pub rotation: RotationMode,

    /// Replaces the built-in user-agent pool when non-empty
    #[serde(default)]
    pub user_agents: Vec<String>,

    /// Replaces the built-in accept-language pool when non-empty
    #[serde(default)]
    pub accept_languages: Vec<String>,

    /// External user-agent list, one per line
    #[serde(default)]
    pub user_agent_file: Option<String>,

    /// Referer sent on the first request of a seed
    #[serde(default)]
    pub referer: Option<String>,

    /// Query parameter carrying the cache-buster nonce, if any
    #[serde(default)]
    pub cache_buster_param: Option<String>,
}

/// Soft-block detection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlockingConfig {
    /// Case-insensitive body substrings that signal an anti-bot page
    #[serde(default = "default_block_markers")]
    pub markers: Vec<String>,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            markers: default_block_markers(),
        }
    }
}

/// Record store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Path of the record store (JSON lines file or SQLite database)
    #[serde(default = "default_records_path")]
    pub records_path: String,

    /// Path of the persisted seen-id set
    #[serde(default = "default_seen_ids_path")]
    pub seen_ids_path: String,

    /// Replace stored records whose content changed
    #[serde(default)]
    pub replace_existing: bool,

    /// Where bodies of blocked responses are saved
    #[serde(default)]
    pub debug_dir: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            records_path: default_records_path(),
            seen_ids_path: default_seen_ids_path(),
            replace_existing: false,
            debug_dir: None,
        }
    }
}

/// Overrides for the structural selector chains of the site profile
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    #[serde(default)]
    pub result_card: Option<Vec<String>>,
    #[serde(default)]
    pub card_link: Option<Vec<String>>,
    #[serde(default)]
    pub card_title: Option<Vec<String>>,
    #[serde(default)]
    pub card_price: Option<Vec<String>>,
    #[serde(default)]
    pub card_features: Option<Vec<String>>,
    #[serde(default)]
    pub card_image: Option<Vec<String>>,
    #[serde(default)]
    pub next_page: Option<Vec<String>>,
}

fn default_workers() -> u32 {
    2
}

fn default_request_timeout() -> u64 {
    20
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_factor() -> f64 {
    0.5
}

fn default_max_backoff() -> f64 {
    8.0
}

fn default_true() -> bool {
    true
}

fn default_retry_statuses() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

fn default_listing_delay() -> [u64; 2] {
    [2000, 5000]
}

fn default_detail_delay() -> [u64; 2] {
    [1000, 3000]
}

fn default_block_markers() -> Vec<String> {
    [
        "captcha",
        "are you a robot",
        "verify you are human",
        "access denied",
        "px-captcha",
        "cf-chl",
        "datadome",
        "please enable cookies",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_records_path() -> String {
    "./listings.jsonl".to_string()
}

fn default_seen_ids_path() -> String {
    "./seen_ids.json".to_string()
}
