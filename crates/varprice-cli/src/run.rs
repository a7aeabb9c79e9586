//! Command handlers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use varprice_core::{AppConfig, Backend, RunSummary, SiteProfile};
use varprice_scraper::{
    open_writer, ChromiumNavigatorFactory, ChromiumOptions, Coordinator, HttpNavigatorFactory,
    NavigatorFactory, OutputLayout, QuoteWriter, RunSettings, ScraperError, ThrottledFactory,
};

use crate::init_tracing;

/// `varprice run`: crawl, extract, write, summarize.
pub(crate) async fn run_scrape(overrides: &HashMap<&'static str, String>) -> anyhow::Result<()> {
    let config = varprice_core::load_app_config_with_overrides(overrides)?;
    init_tracing(&config.log_level);

    let profile = load_site_profile(config.profile_path.as_deref())?;
    let settings = RunSettings::from_config(&config);
    let cancel = CancellationToken::new();
    spawn_interrupt_listener(cancel.clone());

    let layout = OutputLayout::new(profile.dimension_keys());
    let mut sink = open_writer(&config.output_path, config.output_format, layout)
        .with_context(|| format!("opening output file {}", config.output_path.display()))?;

    tracing::info!(
        target_url = %config.target_url,
        backend = %config.backend,
        rate = config.requests_per_second,
        workers = config.workers,
        output = %config.output_path.display(),
        "starting run"
    );

    let summary = match config.backend {
        Backend::Chromium => {
            let factory = ThrottledFactory::new(
                ChromiumNavigatorFactory::launch(chromium_options(&config))
                    .await
                    .context("launching Chromium")?,
                config.requests_per_second,
                config.shared_rate_limit,
            );
            let result = execute(&factory, &profile, settings, cancel, sink.as_mut()).await;
            factory.into_inner().shutdown().await;
            result?
        }
        Backend::Http => {
            let factory = ThrottledFactory::new(
                HttpNavigatorFactory::new(config.navigation_timeout(), &config.user_agent)
                    .context("building HTTP client")?,
                config.requests_per_second,
                config.shared_rate_limit,
            );
            execute(&factory, &profile, settings, cancel, sink.as_mut()).await?
        }
    };

    report(&summary, &config);
    Ok(())
}

/// `varprice profile`: the profile a run would use, as YAML.
pub(crate) fn print_profile(path: Option<PathBuf>) -> anyhow::Result<()> {
    init_tracing("warn");
    let path = path.or_else(|| {
        std::env::var("VARPRICE_PROFILE_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    });
    let profile = load_site_profile(path.as_deref())?;
    let yaml = serde_yaml::to_string(&profile).context("serializing site profile")?;
    print!("{yaml}");
    Ok(())
}

fn load_site_profile(path: Option<&Path>) -> anyhow::Result<SiteProfile> {
    match path {
        Some(path) => {
            let profile = varprice_core::load_profile(path)?;
            tracing::info!(path = %path.display(), "loaded site profile");
            Ok(profile)
        }
        None => Ok(SiteProfile::default()),
    }
}

fn chromium_options(config: &AppConfig) -> ChromiumOptions {
    ChromiumOptions {
        executable: config.chrome_path.clone(),
        headless: config.headless,
        user_agent: config.user_agent.clone(),
        navigation_timeout: config.navigation_timeout(),
    }
}

async fn execute<F: NavigatorFactory>(
    factory: &F,
    profile: &SiteProfile,
    settings: RunSettings,
    cancel: CancellationToken,
    sink: &mut dyn QuoteWriter,
) -> Result<RunSummary, ScraperError> {
    Coordinator::new(factory, profile, settings, cancel)?
        .run(sink)
        .await
}

/// First Ctrl-C cancels between products/combinations; the run then flushes
/// what it has.
fn spawn_interrupt_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("interrupt received; stopping after the current combination");
                cancel.cancel();
            }
            Err(err) => tracing::warn!(error = %err, "could not listen for Ctrl-C"),
        }
    });
}

fn report(summary: &RunSummary, config: &AppConfig) {
    if summary.cancelled {
        tracing::warn!("run was cancelled; output holds partial results");
    }
    println!("{summary}");
    println!(
        "wrote {} record(s) to {}",
        summary.combinations_recorded,
        config.output_path.display()
    );
}
