//! # Template Vault
//!
//! A template resolution layer for AI agents.
//!
//! Expert-verified artifacts (SQL queries, metric definitions, scripts, data
//! descriptions) live in a blob container under
//! `examples/<category>/<filename>`. Agents ask for them by name or by a
//! natural-language alias in any language and get the stored text back
//! byte-for-byte, or an explicit signal to use a search-based knowledge
//! source instead.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────────────┐   ┌─────────────┐
//! │  Resolver  │──▶│  Template    │──▶│ ArtifactRepository │──▶│  BlobStore  │
//! │  (aliases) │   │  Service     │   │  + listing cache   │   │ Azure / mem │
//! └────────────┘   └──────┬───────┘   └────────────────────┘   └─────────────┘
//!                         │ NotFound / Unavailable
//!                         ▼
//!                  ┌──────────────┐
//!                  │  Secondary   │
//!                  │  source      │
//!                  └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tvault init                              # create the container
//! tvault sync ./templates                  # upload <category>/<file> tree
//! tvault get "pro load" --category sql     # print a template verbatim
//! tvault serve                             # start the tool server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Categories, formats, artifact records |
//! | [`error`] | Typed store and repository errors |
//! | [`blob`] | Blob store trait with Azure and in-memory backends |
//! | [`cache`] | Listing cache |
//! | [`repository`] | Validated artifact access |
//! | [`resolver`] | Alias table and name resolution |
//! | [`template`] | Agent-facing template lookup |
//! | [`fallback`] | Secondary knowledge source and lookup chain |
//! | [`sync`] | Local directory upload |
//! | [`tools`] | Agent tools and registry |
//! | [`server`] | HTTP tool server |
//! | [`config`] | TOML configuration |
//! | [`app`] | Service wiring |

pub mod app;
pub mod blob;
pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod models;
pub mod repository;
pub mod resolver;
pub mod server;
pub mod sync;
pub mod template;
pub mod tools;
