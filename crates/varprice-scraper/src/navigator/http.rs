//! Static-render backend: fetch with `reqwest`, query with `scraper`.
//!
//! No scripts run, so the DOM never changes after `navigate`. Selections are
//! validated against the served markup and remembered so later queries see the
//! chosen `<option>` as selected. Suitable for server-rendered listing pages
//! and flat products. A selection never changes the served price, so every
//! combination of a variable product reads the same price.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use super::{Element, NavigatorFactory, PageNavigator, WaitPolicy};
use crate::error::NavigatorError;

pub struct HttpNavigatorFactory {
    client: Client,
}

impl HttpNavigatorFactory {
    /// # Errors
    ///
    /// Returns [`NavigatorError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, NavigatorError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NavigatorFactory for HttpNavigatorFactory {
    type Navigator = HttpNavigator;

    async fn create(&self) -> Result<HttpNavigator, NavigatorError> {
        Ok(HttpNavigator::with_client(self.client.clone()))
    }
}

pub struct HttpNavigator {
    client: Client,
    html: Option<String>,
    /// (control selector, chosen value), in the order they were applied.
    selections: Vec<(String, String)>,
}

impl HttpNavigator {
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            html: None,
            selections: Vec::new(),
        }
    }

    fn document(&self) -> Html {
        Html::parse_document(self.html.as_deref().unwrap_or_default())
    }

    /// Matches `selector` against the current markup, reflecting the
    /// selections applied so far on `<option>` elements.
    fn snapshot_matches(&self, selector: &str) -> Result<Vec<Element>, NavigatorError> {
        let sel = parse_selector(selector)?;
        let option_sel = parse_selector("option")?;
        let document = self.document();

        let mut selected = HashSet::new();
        let mut deselected = HashSet::new();
        for (control_selector, value) in &self.selections {
            let Ok(control_sel) = parse_selector(control_selector) else {
                continue;
            };
            if let Some(control) = document.select(&control_sel).next() {
                for option in control.select(&option_sel) {
                    if option.value().attr("value") == Some(value.as_str()) {
                        deselected.remove(&option.id());
                        selected.insert(option.id());
                    } else {
                        selected.remove(&option.id());
                        deselected.insert(option.id());
                    }
                }
            }
        }

        let elements = document
            .select(&sel)
            .map(|el| {
                let mut element = snapshot(el);
                if selected.contains(&el.id()) {
                    element
                        .attributes
                        .insert("selected".to_string(), String::new());
                } else if deselected.contains(&el.id()) {
                    element.attributes.remove("selected");
                }
                element
            })
            .collect();
        Ok(elements)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, NavigatorError> {
    Selector::parse(selector).map_err(|e| NavigatorError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn snapshot(el: ElementRef<'_>) -> Element {
    Element {
        tag: el.value().name().to_string(),
        text: el.text().collect::<String>(),
        attributes: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        visible: true,
    }
}

#[async_trait]
impl PageNavigator for HttpNavigator {
    async fn navigate(&mut self, url: &str, _wait: WaitPolicy) -> Result<(), NavigatorError> {
        let navigation_error = |reason: String| NavigatorError::Navigation {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(navigation_error(format!("HTTP status {}", status.as_u16())));
        }
        let body = response
            .text()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;

        self.html = Some(body);
        self.selections.clear();
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), NavigatorError> {
        // Static markup: whatever is missing now will never appear.
        if self.query_all(selector).await?.is_empty() {
            return Err(NavigatorError::NotFound {
                selector: selector.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Element>, NavigatorError> {
        self.snapshot_matches(selector)
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), NavigatorError> {
        let control_sel = parse_selector(selector)?;
        let option_sel = parse_selector("option")?;
        let outcome = {
            let document = self.document();
            document.select(&control_sel).next().map(|control| {
                control.select(&option_sel).any(|option| {
                    option.value().attr("value") == Some(value)
                        && option.value().attr("disabled").is_none()
                })
            })
        };
        match outcome {
            None => Err(NavigatorError::NotFound {
                selector: selector.to_string(),
                timeout_ms: 0,
            }),
            Some(false) => Err(NavigatorError::InvalidOption {
                selector: selector.to_string(),
                value: value.to_string(),
            }),
            Some(true) => {
                self.selections.retain(|(s, _)| s != selector);
                self.selections
                    .push((selector.to_string(), value.to_string()));
                Ok(())
            }
        }
    }
}
