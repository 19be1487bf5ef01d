//! Agent-facing template lookup.
//!
//! [`TemplateService::get_template`] resolves a query term to an artifact
//! name and reads it from the repository. The outcome is always data:
//!
//! | Outcome | Meaning | Caller should |
//! |---------|---------|---------------|
//! | [`TemplateResult::Found`] | template exists | use it verbatim |
//! | [`TemplateResult::NotFound`] | no such template | ask the secondary source |
//! | [`TemplateResult::Unavailable`] | store unreachable | retry or fall back |
//!
//! Content is returned byte-for-byte as stored. Placeholders such as
//! `<PRO_ID>` are reported but never substituted here.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;

use crate::error::RepositoryError;
use crate::models::{ArtifactFormat, ArtifactMeta, Category};
use crate::repository::ArtifactRepository;
use crate::resolver::NameResolver;

/// Usage contract attached to every served template.
pub const VERBATIM_NOTICE: &str = "Expert-verified template. Use the content exactly as returned \
and only replace the listed placeholder tokens with literal values. Do not rewrite or reformat it.";

/// A template ready to hand to a caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub category: Category,
    pub name: String,
    pub source_path: String,
    pub format: ArtifactFormat,
    /// Stored text, unmodified.
    pub content: String,
    /// Distinct `<UPPERCASE_TOKEN>` placeholders in order of first use.
    pub placeholders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TemplateResult {
    Found(Template),
    NotFound {
        category: Category,
        name: String,
        /// Why a stored object could not be served, when one exists.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Unavailable { reason: String },
}

impl TemplateResult {
    pub fn is_found(&self) -> bool {
        matches!(self, TemplateResult::Found(_))
    }

    pub fn template(&self) -> Option<&Template> {
        match self {
            TemplateResult::Found(t) => Some(t),
            _ => None,
        }
    }
}

pub struct TemplateService {
    resolver: NameResolver,
    repository: Arc<ArtifactRepository>,
}

impl TemplateService {
    pub fn new(resolver: NameResolver, repository: Arc<ArtifactRepository>) -> Self {
        Self {
            resolver,
            repository,
        }
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    pub fn repository(&self) -> &ArtifactRepository {
        &self.repository
    }

    /// Look up a template by free-form term within a category.
    pub async fn get_template(&self, query_term: &str, category: &Category) -> TemplateResult {
        let name = self.resolver.resolve(query_term, category);

        match self.repository.read_artifact(category, &name).await {
            Ok(artifact) => {
                let placeholders = placeholders(&artifact.content);
                tracing::info!(
                    term = query_term,
                    path = %artifact.path,
                    placeholders = placeholders.len(),
                    "served template"
                );
                TemplateResult::Found(Template {
                    category: artifact.category,
                    name: artifact.name,
                    source_path: artifact.path,
                    format: artifact.format,
                    content: artifact.content,
                    placeholders,
                })
            }
            Err(RepositoryError::BackendUnavailable(reason)) => {
                tracing::warn!(term = query_term, %category, %reason, "template store unavailable");
                TemplateResult::Unavailable { reason }
            }
            Err(RepositoryError::ArtifactNotFound { .. }) => {
                tracing::debug!(term = query_term, %category, %name, "no template");
                TemplateResult::NotFound {
                    category: category.clone(),
                    name,
                    reason: None,
                }
            }
            Err(RepositoryError::InvalidArtifact(constraint)) => {
                tracing::error!(term = query_term, %category, %constraint, "stored template is not servable");
                TemplateResult::NotFound {
                    category: category.clone(),
                    name,
                    reason: Some(constraint.to_string()),
                }
            }
            Err(other) => {
                tracing::warn!(term = query_term, %category, error = %other, "template not servable");
                TemplateResult::NotFound {
                    category: category.clone(),
                    name,
                    reason: Some(other.to_string()),
                }
            }
        }
    }

    /// Templates available for discovery, optionally narrowed to one
    /// format. `README.md` files document a category for humans and are
    /// left out.
    pub async fn list_templates(
        &self,
        category: Option<&Category>,
        format: Option<ArtifactFormat>,
    ) -> Result<Vec<ArtifactMeta>, RepositoryError> {
        let mut items = self.repository.list_artifacts(category, format).await?;
        items.retain(|m| !is_readme(&m.filename));
        Ok(items)
    }
}

fn is_readme(filename: &str) -> bool {
    filename.eq_ignore_ascii_case("README.md")
}

/// Extract distinct placeholder tokens (`<PRO_ID>`, `<START_DATE>`, ...).
pub fn placeholders(content: &str) -> Vec<String> {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER.get_or_init(|| {
        Regex::new(r"<[A-Z][A-Z0-9_]*>").expect("placeholder pattern is valid")
    });

    let mut found: Vec<String> = Vec::new();
    for m in re.find_iter(content) {
        if !found.iter().any(|t| t == m.as_str()) {
            found.push(m.as_str().to_string());
        }
    }
    found
}
