//! Upload a local template directory into the store.
//!
//! The local layout mirrors the remote one:
//!
//! ```text
//! <root>/
//! ├── sql/
//! │   └── pro_load_calculation.sql   → examples/sql/pro_load_calculation.sql
//! ├── definitions/
//! │   └── metrics.md                 → examples/definitions/metrics.md
//! └── data/
//! ```
//!
//! Files nested deeper inside a category directory are uploaded under
//! their filename. Hidden entries, unknown categories, and unsupported
//! extensions are skipped. Files whose SHA-256 matches the digest recorded
//! on the stored blob are left alone. A failing file is counted and the
//! run continues.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use walkdir::WalkDir;

use crate::blob::content_sha256;
use crate::models::{ArtifactFormat, Category};
use crate::repository::{validate_write, ArtifactRepository};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Files written (or that would be written, in a dry run).
    pub uploaded: usize,
    /// Files identical to what is already stored.
    pub unchanged: usize,
    /// Files ignored: hidden, unsupported extension, or unknown category.
    pub skipped: usize,
    pub errors: usize,
    pub dry_run: bool,
}

/// Sync `root` into the repository with overwrite semantics.
pub async fn sync_directory(
    repo: &ArtifactRepository,
    root: &Path,
    dry_run: bool,
) -> Result<SyncReport> {
    let mut report = SyncReport {
        dry_run,
        ..Default::default()
    };

    let mut category_dirs: Vec<_> = std::fs::read_dir(root)
        .with_context(|| format!("Failed to read directory: {}", root.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .collect();
    category_dirs.sort_by_key(|e| e.file_name());

    for dir in category_dirs {
        let dir_name = dir.file_name().to_string_lossy().to_string();
        if dir_name.starts_with('.') {
            continue;
        }

        let category = match Category::new(&dir_name) {
            Ok(c) if repo.is_known_category(&c) => c,
            _ => {
                let files = count_files(&dir.path());
                tracing::warn!(dir = %dir_name, files, "skipping unknown category directory");
                report.skipped += files;
                continue;
            }
        };

        sync_category(repo, &category, &dir.path(), &mut report).await?;
    }

    tracing::info!(
        uploaded = report.uploaded,
        unchanged = report.unchanged,
        skipped = report.skipped,
        errors = report.errors,
        dry_run,
        "sync finished"
    );
    Ok(report)
}

async fn sync_category(
    repo: &ArtifactRepository,
    category: &Category,
    dir: &Path,
    report: &mut SyncReport,
) -> Result<()> {
    let stored: HashMap<String, Option<String>> = repo
        .list_artifacts(Some(category), None)
        .await
        .with_context(|| format!("Failed to list stored artifacts in {}", category))?
        .into_iter()
        .map(|m| (m.filename, m.sha256))
        .collect();

    let mut seen = HashSet::new();

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "failed to walk directory entry");
                report.errors += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().to_string();
        if ArtifactFormat::split_filename(&filename).is_none() {
            tracing::debug!(file = %entry.path().display(), "unsupported extension");
            report.skipped += 1;
            continue;
        }
        if !seen.insert(filename.clone()) {
            tracing::warn!(
                file = %entry.path().display(),
                "duplicate filename within category; only the first is synced"
            );
            report.errors += 1;
            continue;
        }

        let content = match std::fs::read_to_string(entry.path()) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(file = %entry.path().display(), error = %e, "failed to read file");
                report.errors += 1;
                continue;
            }
        };

        if let Err(c) = validate_write(category, &filename, &content) {
            tracing::warn!(file = %entry.path().display(), constraint = %c, "rejected file");
            report.errors += 1;
            continue;
        }

        let digest = content_sha256(content.as_bytes());
        if stored.get(&filename).and_then(|d| d.as_deref()) == Some(digest.as_str()) {
            report.unchanged += 1;
            continue;
        }

        if report.dry_run {
            println!("  would upload {}/{}", category, filename);
            report.uploaded += 1;
            continue;
        }

        match repo.write_artifact(category, &filename, &content, true).await {
            Ok(artifact) => {
                println!("  uploaded {}", artifact.path);
                report.uploaded += 1;
            }
            Err(e) => {
                tracing::warn!(file = %entry.path().display(), error = %e, "upload failed");
                report.errors += 1;
            }
        }
    }

    Ok(())
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}
