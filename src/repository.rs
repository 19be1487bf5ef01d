//! Category-aware artifact repository.
//!
//! Sits on top of a [`BlobStore`] and owns everything that turns a
//! `(category, name)` pair into a storage path:
//!
//! ```text
//! examples/<category>/<name>.<ext>
//! ```
//!
//! Writes are validated locally (category, name, extension, size) before
//! any remote call. Listings are cached per category in a
//! [`ListingCache`] and invalidated by every write and delete made through
//! this repository.
//!
//! # Lookup order
//!
//! Callers pass bare names. [`ArtifactRepository::read_artifact`] tries the
//! name as given when it already carries an allowed extension, then
//! `name.<ext>` for each extension in [`ArtifactFormat::EXTENSIONS`] order.

use std::sync::Arc;
use std::time::Duration;

use crate::blob::{content_sha256, BlobObject, BlobStore};
use crate::cache::ListingCache;
use crate::error::{BlobError, Constraint, RepositoryError};
use crate::models::{
    artifact_path, Artifact, ArtifactFormat, ArtifactMeta, Category, MAX_ARTIFACT_BYTES,
    ROOT_PREFIX,
};

pub struct ArtifactRepository {
    store: Arc<dyn BlobStore>,
    categories: Vec<Category>,
    cache: ListingCache,
}

impl ArtifactRepository {
    /// Create a repository accepting `categories`, caching listings for
    /// `cache_ttl` (zero disables the cache).
    pub fn new(store: Arc<dyn BlobStore>, categories: Vec<Category>, cache_ttl: Duration) -> Self {
        Self {
            store,
            categories,
            cache: ListingCache::new(cache_ttl),
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn is_known_category(&self, category: &Category) -> bool {
        self.categories.contains(category)
    }

    fn check_category(&self, category: &Category) -> Result<(), RepositoryError> {
        if self.is_known_category(category) {
            Ok(())
        } else {
            Err(RepositoryError::UnknownCategory(category.to_string()))
        }
    }

    /// List artifacts in one category, or in every configured category,
    /// optionally narrowed to one format.
    ///
    /// Objects with unsupported extensions, nested paths, or unknown
    /// categories are skipped. The format filter is applied to the cached
    /// category listing, so it never causes an extra remote call.
    pub async fn list_artifacts(
        &self,
        category: Option<&Category>,
        format: Option<ArtifactFormat>,
    ) -> Result<Vec<ArtifactMeta>, RepositoryError> {
        let items = self.category_listing(category).await?;
        Ok(items
            .iter()
            .filter(|m| format.map_or(true, |f| m.format == f))
            .cloned()
            .collect())
    }

    async fn category_listing(
        &self,
        category: Option<&Category>,
    ) -> Result<Arc<Vec<ArtifactMeta>>, RepositoryError> {
        if let Some(c) = category {
            self.check_category(c)?;
        }
        let key = category.cloned();

        if let Some(items) = self.cache.get(&key) {
            tracing::debug!(category = ?key, "listing cache hit");
            return Ok(items);
        }

        let generation = self.cache.generation();
        let prefix = match category {
            Some(c) => c.prefix(),
            None => format!("{}/", ROOT_PREFIX),
        };
        tracing::debug!(%prefix, "listing cache miss");

        let objects = self.store.list(&prefix).await.map_err(backend_error)?;

        let mut items: Vec<ArtifactMeta> = objects
            .into_iter()
            .filter_map(|obj| self.to_meta(obj))
            .filter(|meta| category.map_or(true, |c| &meta.category == c))
            .collect();
        items.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.filename.cmp(&b.filename))
        });

        let items = Arc::new(items);
        self.cache.put(key, generation, items.clone());
        Ok(items)
    }

    /// Version token of `path` from a fresh cached listing, provided the
    /// listed digest (or size, when no digest was recorded) matches `bytes`.
    fn cached_version(&self, category: &Category, path: &str, bytes: &[u8]) -> Option<String> {
        let listing = self
            .cache
            .get(&Some(category.clone()))
            .or_else(|| self.cache.get(&None))?;
        let meta = listing.iter().find(|m| m.path == path)?;
        let matches = match meta.sha256 {
            Some(ref digest) => *digest == content_sha256(bytes),
            None => meta.size_bytes == bytes.len() as u64,
        };
        if matches {
            meta.version.clone()
        } else {
            None
        }
    }

    /// Read an artifact by category and bare name (or filename).
    ///
    /// Returns [`RepositoryError::ArtifactNotFound`] when no candidate path
    /// exists, and [`RepositoryError::BackendUnavailable`] as soon as the
    /// store cannot be reached.
    pub async fn read_artifact(
        &self,
        category: &Category,
        name: &str,
    ) -> Result<Artifact, RepositoryError> {
        self.check_category(category)?;
        let not_found = || RepositoryError::ArtifactNotFound {
            category: category.clone(),
            name: name.to_string(),
        };

        let Some(candidates) = candidate_filenames(name) else {
            tracing::debug!(%category, name, "rejected artifact name");
            return Err(not_found());
        };

        for (filename, format) in candidates {
            let path = artifact_path(category, &filename);
            match self.store.read(&path).await {
                Ok(bytes) => {
                    let size_bytes = bytes.len() as u64;
                    let version = self.cached_version(category, &path, &bytes);
                    let content = String::from_utf8(bytes)
                        .map_err(|_| RepositoryError::InvalidArtifact(Constraint::Encoding(path.clone())))?;
                    tracing::debug!(%path, size_bytes, "read artifact");
                    return Ok(Artifact {
                        category: category.clone(),
                        name: stem_of(&filename).to_string(),
                        filename,
                        path,
                        format,
                        content,
                        size_bytes,
                        version,
                    });
                }
                Err(BlobError::NotFound(_)) => continue,
                Err(e) => return Err(backend_error(e)),
            }
        }

        Err(not_found())
    }

    /// Write an artifact after validating it locally.
    ///
    /// `name_or_filename` must carry an allowed extension. It may also be
    /// given as `<category>/<file>` or `examples/<category>/<file>`.
    pub async fn write_artifact(
        &self,
        category: &Category,
        name_or_filename: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<Artifact, RepositoryError> {
        self.check_category(category)?;
        let (filename, format) = validate_write(category, name_or_filename, content)?;
        let path = artifact_path(category, &filename);

        let version = self
            .store
            .write(&path, content.as_bytes(), overwrite)
            .await
            .map_err(|e| match e {
                BlobError::AlreadyExists(p) => RepositoryError::AlreadyExists(p),
                other => backend_error(other),
            })?;

        self.cache.invalidate(category);
        tracing::info!(%path, overwrite, version = %version, "wrote artifact");

        Ok(Artifact {
            category: category.clone(),
            name: stem_of(&filename).to_string(),
            filename,
            path,
            format,
            content: content.to_string(),
            size_bytes: content.len() as u64,
            version: (!version.is_empty()).then_some(version),
        })
    }

    /// Delete an artifact, resolving its path as [`read_artifact`] does.
    ///
    /// Returns `false` when nothing matched.
    ///
    /// [`read_artifact`]: ArtifactRepository::read_artifact
    pub async fn delete_artifact(
        &self,
        category: &Category,
        name: &str,
    ) -> Result<bool, RepositoryError> {
        self.check_category(category)?;
        let Some(candidates) = candidate_filenames(name) else {
            return Ok(false);
        };

        for (filename, _) in candidates {
            let path = artifact_path(category, &filename);
            if self.store.delete(&path).await.map_err(backend_error)? {
                self.cache.invalidate(category);
                tracing::info!(%path, "deleted artifact");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Drop every cached listing.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    fn to_meta(&self, obj: BlobObject) -> Option<ArtifactMeta> {
        let rest = obj.path.strip_prefix(ROOT_PREFIX)?.strip_prefix('/')?;
        let (category, filename) = rest.split_once('/')?;
        if filename.is_empty() || filename.contains('/') {
            return None;
        }
        let category = Category::new(category).ok()?;
        if !self.is_known_category(&category) {
            tracing::debug!(path = %obj.path, "skipping object in unknown category");
            return None;
        }
        let Some((stem, format)) = ArtifactFormat::split_filename(filename) else {
            tracing::debug!(path = %obj.path, "skipping unsupported format");
            return None;
        };
        Some(ArtifactMeta {
            name: stem.to_string(),
            filename: filename.to_string(),
            category,
            format,
            size_bytes: obj.size,
            version: obj.version,
            last_modified: obj.last_modified,
            sha256: obj.sha256,
            path: obj.path,
        })
    }
}

/// Validate a prospective write without touching the store.
///
/// Returns the filename to store and its format.
pub fn validate_write(
    category: &Category,
    name_or_filename: &str,
    content: &str,
) -> Result<(String, ArtifactFormat), Constraint> {
    let trimmed = name_or_filename.trim();
    let filename = trimmed
        .strip_prefix(&format!("{}/", ROOT_PREFIX))
        .unwrap_or(trimmed);
    let filename = filename
        .strip_prefix(&format!("{}/", category))
        .unwrap_or(filename);

    if !is_valid_name(filename) {
        return Err(Constraint::Name(name_or_filename.to_string()));
    }

    let format = match ArtifactFormat::split_filename(filename) {
        Some((_, format)) => format,
        None => {
            let extension = filename
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_string())
                .unwrap_or_default();
            return Err(Constraint::Format { extension });
        }
    };

    let size_bytes = content.len() as u64;
    if size_bytes > MAX_ARTIFACT_BYTES {
        return Err(Constraint::Size {
            size_bytes,
            max_bytes: MAX_ARTIFACT_BYTES,
        });
    }

    Ok((filename.to_string(), format))
}

/// Candidate filenames for a bare name, in lookup order.
///
/// `None` if the name can never map to a stored path.
fn candidate_filenames(name: &str) -> Option<Vec<(String, ArtifactFormat)>> {
    let name = name.trim();
    if !is_valid_name(name) {
        return None;
    }

    let mut candidates = Vec::with_capacity(ArtifactFormat::EXTENSIONS.len() + 1);
    if let Some((_, format)) = ArtifactFormat::split_filename(name) {
        candidates.push((name.to_string(), format));
    }
    for (ext, format) in ArtifactFormat::EXTENSIONS {
        candidates.push((format!("{}.{}", name, ext), format));
    }
    Some(candidates)
}

/// A single path segment with no traversal or control characters.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

fn stem_of(filename: &str) -> &str {
    ArtifactFormat::split_filename(filename)
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
}

fn backend_error(err: BlobError) -> RepositoryError {
    match err {
        BlobError::BackendUnavailable(msg) => RepositoryError::BackendUnavailable(msg),
        other => RepositoryError::BackendUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::memory::MemoryBlobStore;

    const PRO_LOAD_SQL: &str = "SELECT date, resourcename\n\
        FROM bookings\n\
        WHERE pro_id = <PRO_ID>\n  AND date BETWEEN '<START_DATE>' AND '<END_DATE>';\n";

    fn repo_with(store: Arc<MemoryBlobStore>, ttl: Duration) -> ArtifactRepository {
        ArtifactRepository::new(store, Category::builtin(), ttl)
    }

    fn setup() -> (Arc<MemoryBlobStore>, ArtifactRepository) {
        let store = Arc::new(MemoryBlobStore::new());
        let repo = repo_with(store.clone(), Duration::from_secs(300));
        (store, repo)
    }

    #[tokio::test]
    async fn test_read_bare_name_resolves_extension() {
        let (store, repo) = setup();
        store.insert("examples/sql/pro_load_calculation.sql", PRO_LOAD_SQL);

        let artifact = repo
            .read_artifact(&Category::sql(), "pro_load_calculation")
            .await
            .unwrap();
        assert_eq!(artifact.content, PRO_LOAD_SQL);
        assert_eq!(artifact.path, "examples/sql/pro_load_calculation.sql");
        assert_eq!(artifact.name, "pro_load_calculation");
        assert_eq!(artifact.format, ArtifactFormat::Sql);
        assert!(artifact.content.contains("<PRO_ID>"));
        assert!(artifact.content.contains("<START_DATE>"));
        assert!(artifact.content.contains("<END_DATE>"));
    }

    #[tokio::test]
    async fn test_read_exact_filename_first() {
        let (store, repo) = setup();
        store.insert("examples/definitions/metrics.md", "# Metrics");

        let artifact = repo
            .read_artifact(&Category::definitions(), "metrics.md")
            .await
            .unwrap();
        assert_eq!(artifact.content, "# Metrics");
        assert_eq!(store.calls().read, 1);
    }

    #[tokio::test]
    async fn test_read_prefers_sql_over_md() {
        let (store, repo) = setup();
        store.insert("examples/sql/report.md", "docs");
        store.insert("examples/sql/report.sql", "SELECT 1;");

        let artifact = repo.read_artifact(&Category::sql(), "report").await.unwrap();
        assert_eq!(artifact.format, ArtifactFormat::Sql);
    }

    #[tokio::test]
    async fn test_read_missing_is_artifact_not_found() {
        let (store, repo) = setup();
        let err = repo.read_artifact(&Category::sql(), "nope").await.unwrap_err();
        assert!(matches!(err, RepositoryError::ArtifactNotFound { .. }));
        assert_eq!(store.calls().read, ArtifactFormat::EXTENSIONS.len());
    }

    #[tokio::test]
    async fn test_read_traversal_never_reaches_store() {
        let (store, repo) = setup();
        let err = repo
            .read_artifact(&Category::sql(), "../secrets")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::ArtifactNotFound { .. }));
        assert_eq!(store.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_read_backend_unavailable() {
        let (store, repo) = setup();
        store.set_offline(true);
        let err = repo.read_artifact(&Category::sql(), "x").await.unwrap_err();
        assert!(matches!(err, RepositoryError::BackendUnavailable(_)));
        assert_eq!(store.calls().read, 1);
    }

    #[tokio::test]
    async fn test_read_invalid_utf8() {
        let (store, repo) = setup();
        store.insert("examples/data/blob.csv", vec![0xff, 0xfe, 0x00]);
        let err = repo.read_artifact(&Category::new("data").unwrap(), "blob").await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::InvalidArtifact(Constraint::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let (_store, repo) = setup();
        let content = "-- keep trailing spaces   \r\nSELECT '<PRO_ID>';\n\n";
        let written = repo
            .write_artifact(&Category::sql(), "q.sql", content, false)
            .await
            .unwrap();
        assert_eq!(written.path, "examples/sql/q.sql");
        assert!(written.version.is_some());

        let read = repo.read_artifact(&Category::sql(), "q").await.unwrap();
        assert_eq!(read.content.as_bytes(), content.as_bytes());
    }

    #[tokio::test]
    async fn test_write_unsupported_format_makes_no_remote_call() {
        let (store, repo) = setup();
        for name in ["image.png", "binary.exe", "noext", "archive.tar.gz"] {
            let err = repo
                .write_artifact(&Category::sql(), name, "data", true)
                .await
                .unwrap_err();
            assert!(
                matches!(err, RepositoryError::InvalidArtifact(Constraint::Format { .. })),
                "{}: {:?}",
                name,
                err
            );
        }
        assert_eq!(store.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_write_oversized_names_size_constraint() {
        let (store, repo) = setup();
        let big = "x".repeat(60 * 1024 * 1024);
        let err = repo
            .write_artifact(&Category::new("data").unwrap(), "big.csv", &big, true)
            .await
            .unwrap_err();
        match err {
            RepositoryError::InvalidArtifact(Constraint::Size {
                size_bytes,
                max_bytes,
            }) => {
                assert_eq!(size_bytes, 60 * 1024 * 1024);
                assert_eq!(max_bytes, MAX_ARTIFACT_BYTES);
            }
            other => panic!("expected size violation, got {:?}", other),
        }
        assert_eq!(store.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_write_exactly_at_limit_is_accepted() {
        let (_store, repo) = setup();
        let content = "x".repeat(MAX_ARTIFACT_BYTES as usize);
        assert!(repo
            .write_artifact(&Category::new("data").unwrap(), "edge.txt", &content, true)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_write_without_overwrite_surfaces_already_exists() {
        let (store, repo) = setup();
        store.insert("examples/sql/q.sql", "old");
        let err = repo
            .write_artifact(&Category::sql(), "q.sql", "new", false)
            .await
            .unwrap_err();
        assert_eq!(err, RepositoryError::AlreadyExists("examples/sql/q.sql".into()));
    }

    #[tokio::test]
    async fn test_overwrite_twice_is_idempotent() {
        let (_store, repo) = setup();
        let cat = Category::sql();
        repo.write_artifact(&cat, "q.sql", "SELECT 1;", true).await.unwrap();
        repo.write_artifact(&cat, "q.sql", "SELECT 1;", true).await.unwrap();
        let listed = repo.list_artifacts(Some(&cat), None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(repo.read_artifact(&cat, "q").await.unwrap().content, "SELECT 1;");
    }

    #[tokio::test]
    async fn test_write_accepts_category_qualified_path() {
        let (_store, repo) = setup();
        let a = repo
            .write_artifact(&Category::sql(), "examples/sql/x.sql", "1", true)
            .await
            .unwrap();
        assert_eq!(a.path, "examples/sql/x.sql");
        let err = repo
            .write_artifact(&Category::sql(), "data/x.sql", "1", true)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidArtifact(Constraint::Name(_))));
    }

    #[tokio::test]
    async fn test_unknown_category_rejected_locally() {
        let (store, repo) = setup();
        let err = repo
            .write_artifact(&Category::new("secrets").unwrap(), "a.txt", "x", true)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownCategory(_)));
        assert_eq!(store.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_list_skips_unsupported_and_nested() {
        let (store, repo) = setup();
        store.insert("examples/sql/a.sql", "a");
        store.insert("examples/sql/logo.png", "png");
        store.insert("examples/sql/nested/b.sql", "b");
        store.insert("examples/unknown/c.sql", "c");
        store.insert("examples/definitions/metrics.md", "m");
        store.insert("other/d.sql", "d");

        let all = repo.list_artifacts(None, None).await.unwrap();
        let paths: Vec<_> = all.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["examples/definitions/metrics.md", "examples/sql/a.sql"]);

        let sql = repo.list_artifacts(Some(&Category::sql()), None).await.unwrap();
        assert_eq!(sql.len(), 1);
        assert_eq!(sql[0].name, "a");
        assert_eq!(sql[0].size_bytes, 1);
    }

    #[tokio::test]
    async fn test_list_is_cached_until_write() {
        let (store, repo) = setup();
        let cat = Category::sql();
        store.insert("examples/sql/a.sql", "a");

        assert_eq!(repo.list_artifacts(Some(&cat), None).await.unwrap().len(), 1);
        assert_eq!(repo.list_artifacts(Some(&cat), None).await.unwrap().len(), 1);
        assert_eq!(store.calls().list, 1);

        repo.write_artifact(&cat, "b.sql", "b", false).await.unwrap();
        let listed = repo.list_artifacts(Some(&cat), None).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|m| m.name == "b"));
        assert_eq!(store.calls().list, 2);
    }

    #[tokio::test]
    async fn test_write_invalidates_all_categories_listing() {
        let (store, repo) = setup();
        repo.list_artifacts(None, None).await.unwrap();
        repo.write_artifact(&Category::sql(), "b.sql", "b", false).await.unwrap();
        let all = repo.list_artifacts(None, None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(store.calls().list, 2);
    }

    #[tokio::test]
    async fn test_external_write_is_stale_until_ttl() {
        let (store, repo) = setup();
        let cat = Category::sql();
        repo.list_artifacts(Some(&cat), None).await.unwrap();
        store.insert("examples/sql/late.sql", "x");
        assert!(repo.list_artifacts(Some(&cat), None).await.unwrap().is_empty());

        repo.invalidate_all();
        assert_eq!(repo.list_artifacts(Some(&cat), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_lists_remote() {
        let store = Arc::new(MemoryBlobStore::new());
        let repo = repo_with(store.clone(), Duration::ZERO);
        repo.list_artifacts(None, None).await.unwrap();
        repo.list_artifacts(None, None).await.unwrap();
        assert_eq!(store.calls().list, 2);
    }

    #[tokio::test]
    async fn test_delete_resolves_and_invalidates() {
        let (store, repo) = setup();
        let cat = Category::sql();
        store.insert("examples/sql/old.sql", "x");
        assert_eq!(repo.list_artifacts(Some(&cat), None).await.unwrap().len(), 1);

        assert!(repo.delete_artifact(&cat, "old").await.unwrap());
        assert!(repo.list_artifacts(Some(&cat), None).await.unwrap().is_empty());
        assert!(!repo.delete_artifact(&cat, "old").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_write_backend_unavailable() {
        let (store, repo) = setup();
        let cat = Category::sql();
        store.insert("examples/sql/a.sql", "a");
        assert_eq!(repo.list_artifacts(Some(&cat), None).await.unwrap().len(), 1);

        store.set_offline(true);
        let err = repo
            .write_artifact(&cat, "b.sql", "b", true)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::BackendUnavailable(_)));
        assert_eq!(store.calls().write, 1);

        store.set_offline(false);
        let listed = repo.list_artifacts(Some(&cat), None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "a");
        assert_eq!(store.calls().list, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_backend_unavailable() {
        let (store, repo) = setup();
        let cat = Category::sql();
        store.insert("examples/sql/a.sql", "a");
        assert_eq!(repo.list_artifacts(Some(&cat), None).await.unwrap().len(), 1);

        store.set_offline(true);
        let err = repo.delete_artifact(&cat, "a").await.unwrap_err();
        assert!(matches!(err, RepositoryError::BackendUnavailable(_)));
        assert_eq!(store.calls().delete, 1);

        store.set_offline(false);
        assert_eq!(repo.list_artifacts(Some(&cat), None).await.unwrap().len(), 1);
        assert_eq!(store.calls().list, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_format_from_cache() {
        let (store, repo) = setup();
        let cat = Category::sql();
        store.insert("examples/sql/a.sql", "a");
        store.insert("examples/sql/README.md", "# SQL");
        store.insert("examples/sql/notes.txt", "n");

        let sql = repo
            .list_artifacts(Some(&cat), Some(ArtifactFormat::Sql))
            .await
            .unwrap();
        assert_eq!(sql.len(), 1);
        assert_eq!(sql[0].filename, "a.sql");

        let md = repo
            .list_artifacts(Some(&cat), Some(ArtifactFormat::Md))
            .await
            .unwrap();
        assert_eq!(md.len(), 1);
        assert_eq!(md[0].filename, "README.md");

        assert_eq!(repo.list_artifacts(Some(&cat), None).await.unwrap().len(), 3);
        assert_eq!(store.calls().list, 1);
    }

    #[tokio::test]
    async fn test_read_takes_version_from_fresh_listing() {
        let (store, repo) = setup();
        let cat = Category::sql();
        store.insert("examples/sql/a.sql", "a");

        let uncached = repo.read_artifact(&cat, "a").await.unwrap();
        assert_eq!(uncached.version, None);

        let listed = repo.list_artifacts(Some(&cat), None).await.unwrap();
        let read = repo.read_artifact(&cat, "a").await.unwrap();
        assert!(read.version.is_some());
        assert_eq!(read.version, listed[0].version);

        // Changed behind the cache's back: the cached token no longer applies.
        store.insert("examples/sql/a.sql", "changed");
        let read = repo.read_artifact(&cat, "a").await.unwrap();
        assert_eq!(read.content, "changed");
        assert_eq!(read.version, None);
    }
}
