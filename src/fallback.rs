//! Secondary knowledge source and the template-first lookup chain.
//!
//! Templates win whenever they exist. Only an explicit `NotFound` or
//! `Unavailable` from the [`TemplateService`] sends the query on to a
//! [`SecondarySource`], typically a search service. What that source
//! returns is opaque JSON and passed through untouched.
//!
//! ```text
//! lookup(term, category)
//!   ├─ Found        → LookupOutcome::Template
//!   ├─ NotFound     → secondary.search → LookupOutcome::Fallback { reason: Miss }
//!   └─ Unavailable  → secondary.search → LookupOutcome::Fallback { reason: Unavailable }
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::config::FallbackConfig;
use crate::models::Category;
use crate::template::{Template, TemplateResult, TemplateService};

/// A search-based knowledge source used when no template exists.
#[async_trait]
pub trait SecondarySource: Send + Sync {
    /// Short label for logs and tool output.
    fn name(&self) -> &str;

    /// Search for `query_term` within `category`.
    async fn search(&self, query_term: &str, category: &Category) -> Result<Value>;
}

/// Calls a search endpoint that speaks the `POST /tools/search` shape:
/// request `{ "query", "filters": { "category" } }`, response
/// `{ "result": ... }`.
pub struct HttpSearchSource {
    url: String,
    client: reqwest::Client,
}

impl HttpSearchSource {
    pub fn new(config: &FallbackConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            url: config.url.clone(),
            client,
        })
    }
}

#[async_trait]
impl SecondarySource for HttpSearchSource {
    fn name(&self) -> &str {
        "search"
    }

    async fn search(&self, query_term: &str, category: &Category) -> Result<Value> {
        let body = serde_json::json!({
            "query": query_term,
            "filters": { "category": category.as_str() },
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach secondary source at {}", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!(
                "Secondary source returned HTTP {}: {}",
                status,
                text.chars().take(500).collect::<String>()
            );
        }

        let mut json: Value = resp
            .json()
            .await
            .context("Secondary source returned invalid JSON")?;
        Ok(match json.get_mut("result") {
            Some(result) => result.take(),
            None => json,
        })
    }
}

/// Why the template path was not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No template under the resolved name.
    Miss,
    /// The template store could not be checked.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum LookupOutcome {
    Template(Template),
    Fallback {
        reason: FallbackReason,
        via: String,
        result: Value,
    },
    /// Neither a template nor a secondary answer is available.
    Miss {
        reason: FallbackReason,
        detail: String,
    },
}

/// Template first, secondary source second.
pub struct KnowledgeLookup {
    templates: Arc<TemplateService>,
    secondary: Option<Arc<dyn SecondarySource>>,
}

impl KnowledgeLookup {
    pub fn new(templates: Arc<TemplateService>, secondary: Option<Arc<dyn SecondarySource>>) -> Self {
        Self {
            templates,
            secondary,
        }
    }

    pub async fn lookup(&self, query_term: &str, category: &Category) -> LookupOutcome {
        let (reason, detail) = match self.templates.get_template(query_term, category).await {
            TemplateResult::Found(template) => return LookupOutcome::Template(template),
            TemplateResult::NotFound { name, reason, .. } => {
                let mut detail = format!("no template named '{}' in {}", name, category);
                if let Some(reason) = reason {
                    detail.push_str(&format!(" ({})", reason));
                }
                (FallbackReason::Miss, detail)
            }
            TemplateResult::Unavailable { reason } => (FallbackReason::Unavailable, reason),
        };

        let Some(ref secondary) = self.secondary else {
            return LookupOutcome::Miss { reason, detail };
        };

        tracing::info!(term = query_term, %category, ?reason, via = secondary.name(), "falling back");
        match secondary.search(query_term, category).await {
            Ok(result) => LookupOutcome::Fallback {
                reason,
                via: secondary.name().to_string(),
                result,
            },
            Err(e) => {
                tracing::warn!(error = %e, "secondary source failed");
                LookupOutcome::Miss {
                    reason,
                    detail: format!("{}; secondary source failed: {:#}", detail, e),
                }
            }
        }
    }
}
