//! Query-term to artifact-name resolution.
//!
//! An [`AliasTable`] maps normalized terms (trimmed, lowercased, any
//! language) to canonical artifact names per category. It is built once at
//! startup and never mutated afterwards; the [`NameResolver`] only reads it.
//!
//! Matching is exact after normalization. There is no fuzzy or substring
//! matching: a template is either named precisely or not served.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use thiserror::Error;

use crate::models::Category;

/// Two terms in one category normalize to the same key but point at
/// different artifacts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("alias '{term}' in category '{category}' maps to both '{existing}' and '{conflicting}'")]
pub struct AliasConflict {
    pub category: Category,
    pub term: String,
    pub existing: String,
    pub conflicting: String,
}

/// Normalize a query term for lookup.
pub fn normalize(term: &str) -> String {
    term.trim().to_lowercase()
}

/// Static, per-category alias table.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    tables: HashMap<Category, HashMap<String, String>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `category -> (term -> canonical)` maps.
    pub fn from_entries<'a, I>(entries: I) -> Result<Self, AliasConflict>
    where
        I: IntoIterator<Item = (&'a Category, &'a BTreeMap<String, String>)>,
    {
        let mut table = Self::new();
        for (category, aliases) in entries {
            for (term, canonical) in aliases {
                table.insert(category, term, canonical)?;
            }
        }
        Ok(table)
    }

    /// Register `term` (and `canonical` itself) as aliases of `canonical`.
    pub fn insert(
        &mut self,
        category: &Category,
        term: &str,
        canonical: &str,
    ) -> Result<(), AliasConflict> {
        let canonical = canonical.trim();
        let map = self.tables.entry(category.clone()).or_default();
        for key in [normalize(term), normalize(canonical)] {
            match map.get(&key) {
                Some(existing) if existing != canonical => {
                    return Err(AliasConflict {
                        category: category.clone(),
                        term: key,
                        existing: existing.clone(),
                        conflicting: canonical.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    map.insert(key, canonical.to_string());
                }
            }
        }
        Ok(())
    }

    pub fn lookup(&self, category: &Category, term: &str) -> Option<&str> {
        self.tables
            .get(category)
            .and_then(|m| m.get(&normalize(term)))
            .map(String::as_str)
    }

    /// All `(term, canonical)` pairs of a category, sorted by term.
    pub fn entries(&self, category: &Category) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .tables
            .get(category)
            .map(|m| m.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect())
            .unwrap_or_default();
        entries.sort();
        entries
    }

    pub fn categories(&self) -> Vec<&Category> {
        let mut cats: Vec<&Category> = self.tables.keys().collect();
        cats.sort();
        cats
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Maps a free-form query term to a canonical artifact name.
#[derive(Debug, Clone)]
pub struct NameResolver {
    aliases: Arc<AliasTable>,
}

impl NameResolver {
    pub fn new(aliases: Arc<AliasTable>) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Resolve `query_term` within `category`. Never fails.
    ///
    /// Unknown terms come back trimmed but otherwise unchanged, so callers
    /// that already know the exact artifact name can pass it straight
    /// through. Whether the name exists is the repository's concern.
    ///
    /// Stored names are matched case-sensitively. A canonical name only
    /// matches case-insensitively once it appears as an alias target, since
    /// the table is built from configuration and never from the store.
    /// `PRO_LOAD_CALCULATION` therefore reaches `pro_load_calculation` only
    /// when some alias in the category points there.
    pub fn resolve(&self, query_term: &str, category: &Category) -> String {
        match self.aliases.lookup(category, query_term) {
            Some(canonical) => {
                tracing::debug!(term = query_term, %category, canonical, "alias hit");
                canonical.to_string()
            }
            None => query_term.trim().to_string(),
        }
    }
}
