use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{poll_for_selector, Element, NavigatorFactory, PageNavigator, WaitPolicy};
use crate::error::NavigatorError;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub user_agent: String,
    pub navigation_timeout: Duration,
}

/// Owns one Chromium process; every [`ChromiumNavigator`] it creates is a
/// separate tab in that process.
pub struct ChromiumNavigatorFactory {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    options: ChromiumOptions,
}

impl ChromiumNavigatorFactory {
    /// Launches Chromium.
    ///
    /// # Errors
    ///
    /// [`NavigatorError::Backend`] if the browser config is rejected or the
    /// process cannot be started.
    pub async fn launch(options: ChromiumOptions) -> Result<Self, NavigatorError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(options.navigation_timeout)
            .args(vec![
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--no-first-run".to_string(),
                format!("--user-agent={}", options.user_agent),
            ]);
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(NavigatorError::Backend)?;

        info!(headless = options.headless, "launching Chromium");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| NavigatorError::Backend(format!("chromium launch failed: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "chromium handler reported error");
                }
            }
        });

        Ok(Self {
            browser,
            handler_task: Some(handler_task),
            options,
        })
    }

    /// Closes the browser and waits for its event handler to finish.
    pub async fn shutdown(mut self) {
        info!("shutting down Chromium");
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "browser handler join error");
            }
        }
    }
}

#[async_trait]
impl NavigatorFactory for ChromiumNavigatorFactory {
    type Navigator = ChromiumNavigator;

    async fn create(&self) -> Result<ChromiumNavigator, NavigatorError> {
        let page = self.browser.new_page("about:blank").await?;
        page.set_user_agent(SetUserAgentOverrideParams::new(
            self.options.user_agent.clone(),
        ))
        .await?;
        Ok(ChromiumNavigator {
            page,
            navigation_timeout: self.options.navigation_timeout,
        })
    }
}

/// One Chromium tab.
pub struct ChromiumNavigator {
    page: Page,
    navigation_timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScriptOutcome<T> {
    Ok(T),
    Error(String),
}

impl ChromiumNavigator {
    async fn run_script<T>(&self, selector: &str, script: String) -> Result<T, NavigatorError>
    where
        T: serde::de::DeserializeOwned,
    {
        let result = self.page.evaluate(script).await?;
        let outcome: ScriptOutcome<T> = result
            .into_value()
            .map_err(|e| NavigatorError::Backend(format!("unexpected script result: {e}")))?;
        match outcome {
            ScriptOutcome::Ok(value) => Ok(value),
            ScriptOutcome::Error(reason) => Err(NavigatorError::InvalidSelector {
                selector: selector.to_string(),
                reason,
            }),
        }
    }
}

#[async_trait]
impl PageNavigator for ChromiumNavigator {
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> Result<(), NavigatorError> {
        let navigation_error = |reason: String| NavigatorError::Navigation {
            url: url.to_string(),
            reason,
        };
        let page = &self.page;
        let load = async {
            match wait {
                WaitPolicy::Load => {
                    page.goto(url).await.map_err(|e| navigation_error(e.to_string()))?;
                }
                WaitPolicy::Commit => {
                    let params = NavigateParams::builder()
                        .url(url)
                        .build()
                        .map_err(&navigation_error)?;
                    let response = page
                        .execute(params)
                        .await
                        .map_err(|e| navigation_error(e.to_string()))?;
                    if let Some(reason) = response.result.error_text.clone() {
                        return Err(navigation_error(reason));
                    }
                }
            }
            Ok::<(), NavigatorError>(())
        };
        match tokio::time::timeout(self.navigation_timeout, load).await {
            Ok(result) => result,
            Err(_) => Err(navigation_error(format!(
                "timed out after {}ms",
                self.navigation_timeout.as_millis()
            ))),
        }
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), NavigatorError> {
        poll_for_selector(self, selector, timeout, SELECTOR_POLL_INTERVAL).await
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Element>, NavigatorError> {
        self.run_script(selector, query_script(selector)?).await
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), NavigatorError> {
        let status: String = self
            .run_script(selector, select_script(selector, value)?)
            .await?;
        match status.as_str() {
            "selected" => Ok(()),
            "missing" => Err(NavigatorError::NotFound {
                selector: selector.to_string(),
                timeout_ms: 0,
            }),
            _ => Err(NavigatorError::InvalidOption {
                selector: selector.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

fn js_string(value: &str) -> Result<String, NavigatorError> {
    serde_json::to_string(value)
        .map_err(|e| NavigatorError::Backend(format!("cannot encode script argument: {e}")))
}

fn query_script(selector: &str) -> Result<String, NavigatorError> {
    let selector = js_string(selector)?;
    Ok(format!(
        r"(() => {{
    let nodes;
    try {{
        nodes = document.querySelectorAll({selector});
    }} catch (e) {{
        return {{ error: String(e && e.message || e) }};
    }}
    return {{ ok: Array.from(nodes).map((el) => {{
        const tag = el.tagName.toLowerCase();
        const text = (tag === 'option' || tag === 'select') ? el.textContent : (el.innerText ?? el.textContent);
        const attributes = {{}};
        for (const attr of Array.from(el.attributes)) {{
            attributes[attr.name] = attr.value;
        }}
        if (tag === 'option' && el.selected) {{
            attributes['selected'] = attributes['selected'] ?? '';
        }}
        const visible = !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
        return {{ tag, text: text || '', attributes, visible }};
    }}) }};
}})()"
    ))
}

fn select_script(selector: &str, value: &str) -> Result<String, NavigatorError> {
    let selector = js_string(selector)?;
    let value = js_string(value)?;
    Ok(format!(
        r"(() => {{
    let control;
    try {{
        control = document.querySelector({selector});
    }} catch (e) {{
        return {{ error: String(e && e.message || e) }};
    }}
    if (!control) {{
        return {{ ok: 'missing' }};
    }}
    const option = Array.from(control.options || []).find((o) => o.value === {value} && !o.disabled);
    if (!option) {{
        return {{ ok: 'invalid' }};
    }}
    control.value = {value};
    control.dispatchEvent(new Event('input', {{ bubbles: true }}));
    control.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return {{ ok: 'selected' }};
}})()"
    ))
}
