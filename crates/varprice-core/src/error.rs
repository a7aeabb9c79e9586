use thiserror::Error;

/// Configuration problems. All of these are fatal and surface before the
/// first navigation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read site profile {path}: {source}")]
    ProfileFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse site profile: {0}")]
    ProfileFileParse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}
