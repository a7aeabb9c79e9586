pub mod app_config;
pub mod config;
pub mod error;
pub mod products;
pub mod profile;

pub use app_config::{AppConfig, Backend, OutputFormat};
pub use config::load_app_config_with_overrides;
pub use error::ConfigError;
pub use products::{
    PriceQuote, ProductReference, RunSummary, SelectedOption, VariantCombination,
    VariantDimension, VariantOption, DEFAULT_VARIANT_LABEL,
};
pub use profile::{load_profile, parse_profile, DimensionSelector, PaginationStyle, SiteProfile};
