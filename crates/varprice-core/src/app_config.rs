use std::path::PathBuf;
use std::time::Duration;

/// Serialization used for the run's output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}' (expected csv or json)")),
        }
    }
}

/// Which render capability drives the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Headless Chromium over the DevTools protocol. Runs client-side scripts.
    Chromium,
    /// Plain HTTP fetch + static HTML parsing. Only for server-rendered sites.
    Http,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Chromium => write!(f, "chromium"),
            Backend::Http => write!(f, "http"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Backend::Chromium),
            "http" => Ok(Backend::Http),
            other => Err(format!("unknown backend '{other}' (expected chromium or http)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub target_url: String,
    pub requests_per_second: f64,
    pub pagination_timeout_ms: u64,
    pub stabilization_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub navigation_timeout_ms: u64,
    pub profile_path: Option<PathBuf>,
    pub output_path: PathBuf,
    pub output_format: OutputFormat,
    pub workers: usize,
    pub shared_rate_limit: bool,
    pub record_unavailable: bool,
    pub max_pages: Option<usize>,
    pub backend: Backend,
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub user_agent: String,
    pub log_level: String,
}

impl AppConfig {
    #[must_use]
    pub fn pagination_timeout(&self) -> Duration {
        Duration::from_millis(self.pagination_timeout_ms)
    }

    #[must_use]
    pub fn stabilization_timeout(&self) -> Duration {
        Duration::from_millis(self.stabilization_timeout_ms)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}
