#![deny(missing_docs)]
//! Entity catalog: the configured vocabulary of the log domain.
//!
//! An [`EntityCatalog`] is loaded once from a TOML document, is immutable
//! afterwards, and is shared by reference everywhere. It answers three
//! questions:
//!
//! - which entity kind does a field name belong to?
//! - which aliases in a free-text query refer to entity kinds?
//! - what are the neighbor kinds of a kind (relationship-walker ordering)?
//!
//! Every configuration section is optional; a missing section degrades the
//! corresponding feature but never aborts loading.
//!
//! ```toml
//! [kinds.cable_modem]
//! aliases = ["cable modem", "cm", "modem"]
//! fields = ["CmMacAddress"]
//! patterns = ["(?i)\\bcm[0-9a-f:]{11,}\\b"]
//! related = ["cpe", "md"]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Errors loading the catalog configuration. Fatal at startup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The configuration file could not be read.
    #[error("catalog file unreadable: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration document failed to parse.
    #[error("catalog document malformed: {0}")]
    Malformed(#[from] toml::de::Error),

    /// An extraction pattern is not a valid regular expression.
    #[error("invalid pattern for kind '{kind}': {message}")]
    Pattern {
        /// Kind the pattern belongs to.
        kind: String,
        /// Compiler message.
        message: String,
    },

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Default, Deserialize)]
struct CatalogDoc {
    #[serde(default)]
    kinds: BTreeMap<String, KindDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct KindDoc {
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    related: Vec<String>,
}

/// One configured entity kind.
#[derive(Debug)]
pub struct EntityKind {
    /// Kind name (the TOML table key).
    pub name: String,
    /// Case-insensitive user phrasings for this kind.
    pub aliases: Vec<String>,
    /// Canonical payload field names carrying this kind's values.
    pub fields: Vec<String>,
    /// Compiled extraction patterns.
    pub patterns: Vec<Regex>,
    /// Neighbor kinds, in walker preference order.
    pub related: Vec<String>,
}

/// A group of observed column names sharing an entity kind. Columns that
/// match no kind land in a trailing group with `kind = None`.
#[derive(Debug, PartialEq, Eq)]
pub struct FieldGroup<'a> {
    /// The kind name, or `None` for the "other" bucket.
    pub kind: Option<&'a str>,
    /// Column names in their original relative order.
    pub fields: Vec<&'a str>,
}

/// The loaded, immutable catalog.
#[derive(Debug, Default)]
pub struct EntityCatalog {
    kinds: Vec<EntityKind>,
    /// Lower-cased alias → kind index.
    alias_index: HashMap<String, usize>,
    /// Lower-cased field name → kind index.
    field_index: HashMap<String, usize>,
}

impl EntityCatalog {
    /// An empty catalog: every lookup misses, nothing fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a catalog from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse a catalog from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDoc = toml::from_str(text)?;
        let mut kinds = Vec::with_capacity(doc.kinds.len());
        for (name, kind_doc) in doc.kinds {
            let mut patterns = Vec::with_capacity(kind_doc.patterns.len());
            for pattern in &kind_doc.patterns {
                let compiled = Regex::new(pattern).map_err(|e| CatalogError::Pattern {
                    kind: name.clone(),
                    message: e.to_string(),
                })?;
                patterns.push(compiled);
            }
            kinds.push(EntityKind {
                name,
                aliases: kind_doc.aliases,
                fields: kind_doc.fields,
                patterns,
                related: kind_doc.related,
            });
        }

        let mut alias_index = HashMap::new();
        let mut field_index = HashMap::new();
        for (idx, kind) in kinds.iter().enumerate() {
            alias_index.entry(kind.name.to_lowercase()).or_insert(idx);
            for alias in &kind.aliases {
                alias_index.entry(alias.to_lowercase()).or_insert(idx);
            }
            for field in &kind.fields {
                field_index.entry(field.to_lowercase()).or_insert(idx);
            }
        }

        tracing::debug!(kinds = kinds.len(), "entity catalog loaded");
        Ok(Self {
            kinds,
            alias_index,
            field_index,
        })
    }

    /// All configured kinds.
    pub fn kinds(&self) -> &[EntityKind] {
        &self.kinds
    }

    /// Look up a kind by its name.
    pub fn kind(&self, name: &str) -> Option<&EntityKind> {
        self.kinds.iter().find(|k| k.name.eq_ignore_ascii_case(name))
    }

    /// Which kind does a payload field name belong to?
    pub fn kind_of_field(&self, field: &str) -> Option<&EntityKind> {
        self.field_index
            .get(&field.to_lowercase())
            .map(|&idx| &self.kinds[idx])
    }

    /// Kinds referenced by aliases in a free-text query. Matching is
    /// case-insensitive and whole-word; each kind is reported once, in
    /// order of first mention.
    pub fn kinds_in_query(&self, query: &str) -> Vec<&EntityKind> {
        let lower = query.to_lowercase();
        let mut hits: Vec<(usize, usize)> = Vec::new(); // (position, kind idx)
        for (alias, &idx) in &self.alias_index {
            if let Some(pos) = find_word(&lower, alias) {
                if !hits.iter().any(|&(_, i)| i == idx) {
                    hits.push((pos, idx));
                } else if let Some(existing) = hits.iter_mut().find(|(_, i)| *i == idx) {
                    if pos < existing.0 {
                        existing.0 = pos;
                    }
                }
            }
        }
        hits.sort_by_key(|&(pos, _)| pos);
        hits.into_iter().map(|(_, idx)| &self.kinds[idx]).collect()
    }

    /// Neighbor kinds of `kind`, in configured preference order.
    pub fn neighbors(&self, kind: &str) -> &[String] {
        self.kind(kind).map(|k| k.related.as_slice()).unwrap_or(&[])
    }

    /// Group observed column names by kind, preserving relative order.
    /// Unmatched names go to a trailing "other" bucket.
    pub fn group_fields<'a>(&'a self, fields: &'a [String]) -> Vec<FieldGroup<'a>> {
        let mut groups: Vec<FieldGroup<'a>> = Vec::new();
        let mut other: Vec<&'a str> = Vec::new();
        for field in fields {
            match self.kind_of_field(field) {
                Some(kind) => {
                    match groups.iter_mut().find(|g| g.kind == Some(kind.name.as_str())) {
                        Some(group) => group.fields.push(field),
                        None => groups.push(FieldGroup {
                            kind: Some(kind.name.as_str()),
                            fields: vec![field],
                        }),
                    }
                }
                None => other.push(field),
            }
        }
        if !other.is_empty() {
            groups.push(FieldGroup {
                kind: None,
                fields: other,
            });
        }
        groups
    }

    /// Extract entity values from free text using the configured
    /// patterns. Returns `(kind name, value)` pairs in match order.
    pub fn extract_values<'a>(&'a self, text: &str) -> Vec<(&'a str, String)> {
        let mut out = Vec::new();
        for kind in &self.kinds {
            for pattern in &kind.patterns {
                for m in pattern.find_iter(text) {
                    out.push((kind.name.as_str(), m.as_str().to_string()));
                }
            }
        }
        out
    }

    /// The first canonical field for the first kind a query mentions.
    /// Drives the "parse this field next" hint.
    pub fn field_for_query(&self, query: &str) -> Option<(&EntityKind, &str)> {
        let kinds = self.kinds_in_query(query);
        for kind in kinds {
            if let Some(field) = kind.fields.first() {
                return Some((kind, field.as_str()));
            }
        }
        None
    }
}

/// Find `word` in `haystack` at a whole-word position (neighbors must not
/// be alphanumeric). Both inputs are expected lower-case. Returns the
/// byte offset of the first such occurrence.
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }
    let mut from = 0;
    while let Some(rel) = haystack[from..].find(word) {
        let start = from + rel;
        let end = start + word.len();
        let left_ok = start == 0
            || !haystack[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        let right_ok = end == haystack.len()
            || !haystack[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        if left_ok && right_ok {
            return Some(start);
        }
        from = start + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [kinds.cable_modem]
        aliases = ["cable modem", "cm", "modem"]
        fields = ["CmMacAddress"]
        patterns = ["(?i)\\b2c(:[0-9a-f]{2}){5}\\b"]
        related = ["cpe", "md"]

        [kinds.cpe]
        aliases = ["cpe", "customer device"]
        fields = ["CpeMacAddress"]
        related = ["cable_modem"]

        [kinds.md]
        aliases = ["mac domain", "md"]
        fields = ["MdId"]
        related = ["cable_modem"]
    "#;

    fn catalog() -> EntityCatalog {
        EntityCatalog::from_toml_str(SAMPLE).unwrap()
    }

    #[test]
    fn empty_document_loads() {
        let c = EntityCatalog::from_toml_str("").unwrap();
        assert!(c.kinds().is_empty());
        assert!(c.kind_of_field("anything").is_none());
        assert!(c.kinds_in_query("how many modems").is_empty());
    }

    #[test]
    fn missing_sections_degrade_not_abort() {
        let c = EntityCatalog::from_toml_str(
            r#"
            [kinds.rpd]
            fields = ["RpdId"]
            "#,
        )
        .unwrap();
        assert_eq!(c.kinds().len(), 1);
        assert!(c.kinds()[0].aliases.is_empty());
        assert!(c.neighbors("rpd").is_empty());
        assert!(c.kind_of_field("rpdid").is_some());
    }

    #[test]
    fn invalid_pattern_is_fatal() {
        let err = EntityCatalog::from_toml_str(
            r#"
            [kinds.bad]
            patterns = ["(unclosed"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::Pattern { kind, .. } if kind == "bad"));
    }

    #[test]
    fn kind_of_field_is_case_insensitive() {
        let c = catalog();
        assert_eq!(c.kind_of_field("cmmacaddress").unwrap().name, "cable_modem");
        assert_eq!(c.kind_of_field("CMMACADDRESS").unwrap().name, "cable_modem");
        assert!(c.kind_of_field("Unrelated").is_none());
    }

    #[test]
    fn kinds_in_query_whole_word() {
        let c = catalog();
        let kinds = c.kinds_in_query("how many unique cable modems... cm count?");
        // "cm" matches whole-word; "cable modem" does not (plural), but
        // "cm" already names the kind.
        assert_eq!(kinds[0].name, "cable_modem");

        // Substrings must not match: "cmts" contains "cm" but is one word.
        assert!(c.kinds_in_query("the cmts rebooted").is_empty());
    }

    #[test]
    fn kinds_in_query_orders_by_first_mention() {
        let c = catalog();
        let kinds = c.kinds_in_query("find the mac domain for this cpe");
        let names: Vec<&str> = kinds.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, ["md", "cpe"]);
    }

    #[test]
    fn neighbors_in_config_order() {
        let c = catalog();
        assert_eq!(c.neighbors("cable_modem"), ["cpe", "md"]);
        assert!(c.neighbors("nonexistent").is_empty());
    }

    #[test]
    fn group_fields_preserves_order_and_buckets_rest() {
        let c = catalog();
        let observed = vec![
            "Time".to_string(),
            "CmMacAddress".to_string(),
            "Host".to_string(),
            "MdId".to_string(),
        ];
        let groups = c.group_fields(&observed);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].kind, Some("cable_modem"));
        assert_eq!(groups[0].fields, ["CmMacAddress"]);
        assert_eq!(groups[1].kind, Some("md"));
        assert_eq!(groups[2].kind, None);
        assert_eq!(groups[2].fields, ["Time", "Host"]);
    }

    #[test]
    fn extract_values_uses_patterns() {
        let c = catalog();
        let found = c.extract_values("saw 2c:ab:a4:47:1a:d0 then 2c:ab:a4:47:1a:d2");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "cable_modem");
        assert_eq!(found[0].1, "2c:ab:a4:47:1a:d0");
    }

    #[test]
    fn field_for_query_names_canonical_field() {
        let c = catalog();
        let (kind, field) = c.field_for_query("count unique cm addresses").unwrap();
        assert_eq!(kind.name, "cable_modem");
        assert_eq!(field, "CmMacAddress");
        assert!(c.field_for_query("nothing relevant").is_none());
    }
}
