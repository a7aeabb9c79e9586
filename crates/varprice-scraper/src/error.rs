use thiserror::Error;

/// Failures reported by a [`crate::navigator::PageNavigator`] backend.
#[derive(Debug, Error)]
pub enum NavigatorError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no element matched \"{selector}\" within {timeout_ms}ms")]
    NotFound { selector: String, timeout_ms: u64 },

    #[error("\"{value}\" is not a selectable option of \"{selector}\"")]
    InvalidOption { selector: String, value: String },

    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("render backend error: {0}")]
    Backend(String),
}

impl From<chromiumoxide::error::CdpError> for NavigatorError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        NavigatorError::Backend(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error(transparent)]
    Navigator(#[from] NavigatorError),

    /// The run's entry point could not be loaded at all. This is the only
    /// navigation failure that ends a run.
    #[error("target {url} is unreachable: {source}")]
    TargetUnreachable {
        url: String,
        #[source]
        source: NavigatorError,
    },

    #[error("could not select \"{value}\" for dimension {dimension}: {source}")]
    SelectionFailed {
        dimension: String,
        value: String,
        #[source]
        source: NavigatorError,
    },

    #[error(transparent)]
    Config(#[from] varprice_core::ConfigError),

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
