//! # Template Vault CLI (`tvault`)
//!
//! Manage and serve expert-verified templates stored in Azure Blob Storage.
//!
//! ## Usage
//!
//! ```bash
//! tvault --config ./config/tvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tvault init` | Create the storage container if missing |
//! | `tvault list [--category sql] [--format sql]` | List stored templates |
//! | `tvault get "<query>" --category sql` | Resolve and print a template verbatim |
//! | `tvault put <category> <file>` | Upload one template |
//! | `tvault delete <category> <name>` | Remove one template |
//! | `tvault sync <dir>` | Upload a local `<category>/<file>` tree |
//! | `tvault aliases` | Show configured aliases |
//! | `tvault serve` | Start the HTTP tool server |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `info`). Command output goes to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use template_vault::app::{connect_azure, App};
use template_vault::config::{self, Config};
use template_vault::models::{ArtifactFormat, Category};
use template_vault::server;
use template_vault::sync::sync_directory;
use template_vault::template::TemplateResult;
use template_vault::tools::ToolRegistry;

/// Template Vault: expert-verified templates for AI agents.
#[derive(Parser)]
#[command(
    name = "tvault",
    about = "Template Vault: serve expert-verified templates to AI agents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the storage container. Safe to run repeatedly.
    Init,

    /// List stored templates.
    List {
        /// Only list this category.
        #[arg(long)]
        category: Option<String>,

        /// Only list this format (`sql`, `md`, `yaml`, ...).
        #[arg(long)]
        format: Option<ArtifactFormat>,
    },

    /// Resolve a name or alias and print the template exactly as stored.
    Get {
        /// Template name or alias.
        query: String,

        #[arg(long)]
        category: String,
    },

    /// Upload a single template file.
    Put {
        category: String,

        file: PathBuf,

        /// Stored filename (defaults to the file's own name).
        #[arg(long)]
        name: Option<String>,

        /// Replace an existing template with the same filename.
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete a template by name.
    Delete { category: String, name: String },

    /// Upload every template under `<dir>/<category>/`.
    Sync {
        dir: PathBuf,

        /// Report what would be uploaded without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show configured aliases.
    Aliases {
        #[arg(long)]
        category: Option<String>,
    },

    /// Start the HTTP tool server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Aliases { category } => {
            print_aliases(&cfg, category.as_deref())?;
        }
        Commands::Init => {
            let store = connect_azure(&cfg)?;
            if store.ensure_container().await? {
                println!("Created container '{}'.", store.container());
            } else {
                println!("Container '{}' already exists.", store.container());
            }
        }
        command => {
            let app = App::build(&cfg, Arc::new(connect_azure(&cfg)?))?;
            run_command(&cfg, &app, command).await?;
        }
    }

    Ok(())
}

async fn run_command(cfg: &Config, app: &App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::List { category, format } => {
            let category = category.as_deref().map(Category::new).transpose()?;
            let items = app.repository.list_artifacts(category.as_ref(), format).await?;
            if items.is_empty() {
                println!("No templates found.");
            }
            for m in items {
                println!(
                    "{:<14} {:<40} {:>8} bytes  {}",
                    m.category,
                    m.filename,
                    m.size_bytes,
                    m.format.description()
                );
            }
        }
        Commands::Get { query, category } => {
            let category = Category::new(&category)?;
            match app.templates.get_template(&query, &category).await {
                TemplateResult::Found(t) => {
                    eprintln!("# {}", t.source_path);
                    if !t.placeholders.is_empty() {
                        eprintln!("# placeholders: {}", t.placeholders.join(", "));
                    }
                    print!("{}", t.content);
                }
                TemplateResult::NotFound {
                    category,
                    name,
                    reason,
                } => match reason {
                    Some(reason) => bail!(
                        "template '{}' in '{}' is not servable: {}",
                        name,
                        category,
                        reason
                    ),
                    None => bail!("no template '{}' in category '{}'", name, category),
                },
                TemplateResult::Unavailable { reason } => {
                    bail!("template store unavailable: {}", reason);
                }
            }
        }
        Commands::Put {
            category,
            file,
            name,
            overwrite,
        } => {
            let category = Category::new(&category)?;
            let filename = match name {
                Some(n) => n,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .with_context(|| format!("No filename in path: {}", file.display()))?,
            };
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let artifact = app
                .repository
                .write_artifact(&category, &filename, &content, overwrite)
                .await?;
            println!(
                "Uploaded {} ({} bytes, version {})",
                artifact.path,
                artifact.size_bytes,
                artifact.version.as_deref().unwrap_or("-")
            );
        }
        Commands::Delete { category, name } => {
            let category = Category::new(&category)?;
            if app.repository.delete_artifact(&category, &name).await? {
                println!("Deleted {}/{}.", category, name);
            } else {
                println!("Nothing to delete: {}/{} not found.", category, name);
            }
        }
        Commands::Sync { dir, dry_run } => {
            println!("Syncing {} → container '{}'", dir.display(), cfg.storage.container);
            let report = sync_directory(&app.repository, &dir, dry_run).await?;
            println!(
                "{}uploaded: {}, unchanged: {}, skipped: {}, errors: {}",
                if dry_run { "[dry run] " } else { "" },
                report.uploaded,
                report.unchanged,
                report.skipped,
                report.errors
            );
            if report.errors > 0 {
                bail!("{} file(s) failed to sync", report.errors);
            }
        }
        Commands::Serve => {
            server::run_server(
                &cfg.server.bind,
                ToolRegistry::with_builtins(),
                app.tool_context(),
            )
            .await?;
        }
        Commands::Init | Commands::Aliases { .. } => unreachable!("handled before connecting"),
    }
    Ok(())
}

fn print_aliases(cfg: &Config, category: Option<&str>) -> anyhow::Result<()> {
    let table = cfg.alias_table()?;
    let categories = match category {
        Some(c) => vec![Category::new(c)?],
        None => table.categories().into_iter().cloned().collect(),
    };

    if categories.is_empty() {
        println!("No aliases configured.");
    }
    for category in categories {
        println!("[{}]", category);
        for (term, canonical) in table.entries(&category) {
            println!("  {:<30} → {}", term, canonical);
        }
    }
    Ok(())
}
