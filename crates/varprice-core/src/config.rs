use std::collections::HashMap;
use std::path::PathBuf;

use crate::app_config::{AppConfig, Backend, OutputFormat};
use crate::ConfigError;

/// Load configuration where `overrides` (keyed by env var name) win over the
/// process environment. `.env` is loaded first. The CLI feeds its flags
/// through here.
///
/// # Errors
///
/// Returns `ConfigError` if required values are missing or invalid.
pub fn load_app_config_with_overrides(
    overrides: &HashMap<&str, String>,
) -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_app_config(|key| match overrides.get(key) {
        Some(value) => Ok(value.clone()),
        None => std::env::var(key),
    })
}

/// Core parsing/validation, decoupled from the real environment so it can be
/// tested with a `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        parse_bool_flag(&or_default(var, default)).ok_or_else(|| {
            invalid(
                var,
                "expected one of true/false/1/0/yes/no/on/off".to_string(),
            )
        })
    };

    let target_url = require("VARPRICE_TARGET_URL")?;
    if !(target_url.starts_with("http://") || target_url.starts_with("https://")) {
        return Err(invalid(
            "VARPRICE_TARGET_URL",
            format!("'{target_url}' is not an http(s) URL"),
        ));
    }

    let requests_per_second = parse_rate(&or_default("VARPRICE_REQUESTS_PER_SECOND", "1.0"))
        .map_err(|reason| invalid("VARPRICE_REQUESTS_PER_SECOND", reason))?;

    let pagination_timeout_ms = parse_u64("VARPRICE_PAGINATION_TIMEOUT_MS", "5000")?;
    let stabilization_timeout_ms = parse_u64("VARPRICE_STABILIZATION_TIMEOUT_MS", "5000")?;
    let settle_delay_ms = parse_u64("VARPRICE_SETTLE_DELAY_MS", "200")?;
    let poll_interval_ms = parse_u64("VARPRICE_POLL_INTERVAL_MS", "100")?;
    if poll_interval_ms == 0 {
        return Err(invalid(
            "VARPRICE_POLL_INTERVAL_MS",
            "must be greater than zero".to_string(),
        ));
    }
    let navigation_timeout_ms = parse_u64("VARPRICE_NAVIGATION_TIMEOUT_MS", "30000")?;

    let profile_path = lookup("VARPRICE_PROFILE_PATH")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let output_path = PathBuf::from(or_default("VARPRICE_OUTPUT_PATH", "./variants.csv"));
    let output_format = or_default("VARPRICE_OUTPUT_FORMAT", "csv")
        .parse::<OutputFormat>()
        .map_err(|reason| invalid("VARPRICE_OUTPUT_FORMAT", reason))?;

    let workers = parse_usize("VARPRICE_WORKERS", "1")?;
    if workers == 0 {
        return Err(invalid(
            "VARPRICE_WORKERS",
            "must be at least 1".to_string(),
        ));
    }
    let shared_rate_limit = parse_bool("VARPRICE_SHARED_RATE_LIMIT", "false")?;
    let record_unavailable = parse_bool("VARPRICE_RECORD_UNAVAILABLE", "false")?;
    let max_pages = match lookup("VARPRICE_MAX_PAGES") {
        Ok(raw) => Some(
            raw.parse::<usize>()
                .map_err(|e| invalid("VARPRICE_MAX_PAGES", e.to_string()))?,
        ),
        Err(_) => None,
    };

    let backend = or_default("VARPRICE_BACKEND", "chromium")
        .parse::<Backend>()
        .map_err(|reason| invalid("VARPRICE_BACKEND", reason))?;
    let chrome_path = lookup("VARPRICE_CHROME_PATH")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let headless = parse_bool("VARPRICE_HEADLESS", "true")?;
    let user_agent = or_default(
        "VARPRICE_USER_AGENT",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) varprice/0.1",
    );
    let log_level = or_default("VARPRICE_LOG_LEVEL", "info");

    Ok(AppConfig {
        target_url,
        requests_per_second,
        pagination_timeout_ms,
        stabilization_timeout_ms,
        settle_delay_ms,
        poll_interval_ms,
        navigation_timeout_ms,
        profile_path,
        output_path,
        output_format,
        workers,
        shared_rate_limit,
        record_unavailable,
        max_pages,
        backend,
        chrome_path,
        headless,
        user_agent,
        log_level,
    })
}

/// Parse a requests-per-second value. Non-positive and non-finite rates are
/// rejected here so the rate limiter itself never has to fail.
fn parse_rate(raw: &str) -> Result<f64, String> {
    let rate = raw.trim().parse::<f64>().map_err(|e| e.to_string())?;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(format!("rate must be a positive number, got {raw}"));
    }
    Ok(rate)
}

fn parse_bool_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
