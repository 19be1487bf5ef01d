//! Service wiring shared by the CLI, the server, and tests.
//!
//! ```text
//! Config ─┬─▶ AliasTable ─▶ NameResolver ─┐
//!         │                               ├─▶ TemplateService ─▶ KnowledgeLookup
//! BlobStore ─▶ ArtifactRepository ────────┘                        ▲
//!         └─▶ [fallback] ─▶ HttpSearchSource ──────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::blob::azure::{AzureBlobStore, AzureCredentials};
use crate::blob::BlobStore;
use crate::config::Config;
use crate::fallback::{HttpSearchSource, KnowledgeLookup, SecondarySource};
use crate::repository::ArtifactRepository;
use crate::resolver::NameResolver;
use crate::template::TemplateService;
use crate::tools::ToolContext;

/// The assembled service graph.
#[derive(Clone)]
pub struct App {
    pub repository: Arc<ArtifactRepository>,
    pub templates: Arc<TemplateService>,
    pub lookup: Arc<KnowledgeLookup>,
}

impl App {
    /// Wire the services over `store`, using the `[fallback]` section (if
    /// any) for the secondary source.
    pub fn build(config: &Config, store: Arc<dyn BlobStore>) -> Result<Self> {
        let secondary = match config.fallback {
            Some(ref fallback) => {
                let source: Arc<dyn SecondarySource> = Arc::new(HttpSearchSource::new(fallback)?);
                Some(source)
            }
            None => None,
        };
        Self::with_secondary(config, store, secondary)
    }

    /// Like [`App::build`] with an explicit secondary source.
    pub fn with_secondary(
        config: &Config,
        store: Arc<dyn BlobStore>,
        secondary: Option<Arc<dyn SecondarySource>>,
    ) -> Result<Self> {
        let aliases = Arc::new(config.alias_table()?);
        let repository = Arc::new(ArtifactRepository::new(
            store,
            config.storage.categories.clone(),
            config.cache_ttl(),
        ));
        let templates = Arc::new(TemplateService::new(
            NameResolver::new(aliases),
            repository.clone(),
        ));
        let lookup = Arc::new(KnowledgeLookup::new(templates.clone(), secondary));

        Ok(Self {
            repository,
            templates,
            lookup,
        })
    }

    pub fn tool_context(&self) -> ToolContext {
        ToolContext::new(self.templates.clone(), self.lookup.clone())
    }
}

/// Open the Azure container named in `[storage]`.
pub fn connect_azure(config: &Config) -> Result<AzureBlobStore> {
    let conn = config.connection_string()?;
    let creds = AzureCredentials::from_connection_string(&conn)
        .context("Invalid storage connection string")?;
    tracing::debug!(
        account = creds.account_name(),
        container = %config.storage.container,
        "connecting to blob storage"
    );
    AzureBlobStore::new(creds, &config.storage.container, config.storage_timeout())
}
