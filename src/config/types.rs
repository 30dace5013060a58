use serde::Deserialize;

/// Main configuration structure for Quote-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where to crawl and how the rendered page is structured
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// First page of the paginated listing
    pub url: String,

    /// Container holding one quote
    #[serde(rename = "quote-selector", default = "default_quote_selector")]
    pub quote_selector: String,

    /// Quote body, relative to the container
    #[serde(rename = "text-selector", default = "default_text_selector")]
    pub text_selector: String,

    /// Author name, relative to the container
    #[serde(rename = "author-selector", default = "default_author_selector")]
    pub author_selector: String,

    /// Tag labels, relative to the container
    #[serde(rename = "tag-selector", default = "default_tag_selector")]
    pub tag_selector: String,

    /// The "next page" control, relative to the document
    #[serde(rename = "next-selector", default = "default_next_selector")]
    pub next_selector: String,
}

/// Pagination loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pages to visit
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Upper bound for each page load, render wait, and next-page navigation (milliseconds)
    #[serde(rename = "page-timeout-ms", default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,

    /// Interval between readiness checks (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Extra delay after the page reports ready (milliseconds)
    #[serde(rename = "settle-delay-ms", default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// How long a ready page without quote blocks is given to render them (milliseconds)
    #[serde(rename = "empty-page-grace-ms", default = "default_empty_page_grace_ms")]
    pub empty_page_grace_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            page_timeout_ms: default_page_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            empty_page_grace_ms: default_empty_page_grace_ms(),
        }
    }
}

/// Headless browser launch options
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(rename = "disable-gpu", default = "default_true")]
    pub disable_gpu: bool,

    /// Running without the Chrome sandbox is a deployment choice; prefer `false`
    /// where the host allows it
    #[serde(rename = "no-sandbox", default = "default_true")]
    pub no_sandbox: bool,

    /// Explicit Chrome/Chromium binary; auto-detected when absent
    #[serde(default)]
    pub executable: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            disable_gpu: true,
            no_sandbox: true,
            executable: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,

    /// How long a write waits on a locked database (milliseconds)
    #[serde(rename = "busy-timeout-ms", default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl SourceConfig {
    /// Builds a source section for `url` with the default selectors
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quote_selector: default_quote_selector(),
            text_selector: default_text_selector(),
            author_selector: default_author_selector(),
            tag_selector: default_tag_selector(),
            next_selector: default_next_selector(),
        }
    }
}

fn default_quote_selector() -> String {
    "div.quote".to_string()
}

fn default_text_selector() -> String {
    ".text".to_string()
}

fn default_author_selector() -> String {
    ".author".to_string()
}

fn default_tag_selector() -> String {
    ".tag".to_string()
}

fn default_next_selector() -> String {
    "li.next > a".to_string()
}

fn default_max_pages() -> u32 {
    5
}

fn default_page_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_settle_delay_ms() -> u64 {
    250
}

fn default_empty_page_grace_ms() -> u64 {
    1_000
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> String {
    "quotes.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}
