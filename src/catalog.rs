//! Source catalogs loaded from TOML.
//!
//! A catalog is the list of [`SourceDescriptor`]s a deployment searches. It
//! is read once at startup and handed to the aggregator by reference.
//!
//! ```toml
//! [[sources]]
//! id = "alpha"
//! name = "Alpha"
//! base_url = "https://alpha.example"
//! search_path = "/api.php/provide/vod"
//!
//! [sources.headers]
//! Referer = "https://alpha.example/"
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::types::SourceDescriptor;

/// An ordered list of sources. Order is preserved in aggregation output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCatalog {
    /// Configured sources, in dispatch order.
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
}

impl SourceCatalog {
    /// Parse and validate a catalog from TOML text.
    ///
    /// Other top-level tables are ignored, so a catalog can share a file with
    /// an [`crate::AggregatorConfig`].
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: Self =
            toml::from_str(content).map_err(|e| SearchError::Config(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a catalog from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SearchError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks that ids are unique and non-empty and base URLs are absolute.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(SearchError::Config("source id must not be empty".into()));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(SearchError::Config(format!(
                    "duplicate source id: {}",
                    source.id
                )));
            }
            url::Url::parse(&source.endpoint()).map_err(|e| {
                SearchError::Config(format!("source {} has an invalid URL: {e}", source.id))
            })?;
        }
        Ok(())
    }

    /// Number of configured sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if no sources are configured.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        source_timeout_ms = 5000

        [[sources]]
        id = "alpha"
        name = "Alpha"
        base_url = "https://alpha.example"
        search_path = "/api.php/provide/vod"

        [sources.headers]
        Referer = "https://alpha.example/"

        [[sources]]
        id = "beta"
        name = "Beta"
        baseUrl = "https://beta.example"
        searchPath = "/provide/vod/"
    "#;

    #[test]
    fn parses_sources_in_order() {
        let catalog = SourceCatalog::from_toml_str(CATALOG).expect("parse");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.sources[0].id, "alpha");
        assert_eq!(catalog.sources[1].id, "beta");
        assert_eq!(
            catalog.sources[0].headers.get("Referer").map(String::as_str),
            Some("https://alpha.example/")
        );
        assert_eq!(catalog.sources[1].base_url, "https://beta.example");
    }

    #[test]
    fn empty_file_is_empty_catalog() {
        let catalog = SourceCatalog::from_toml_str("").expect("parse");
        assert!(catalog.is_empty());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = SourceCatalog::from_toml_str(
            r#"
            [[sources]]
            id = "a"
            name = "A"
            base_url = "https://a.example"
            search_path = "/x"

            [[sources]]
            id = "a"
            name = "A again"
            base_url = "https://b.example"
            search_path = "/x"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate source id"));
    }

    #[test]
    fn invalid_url_rejected() {
        let err = SourceCatalog::from_toml_str(
            r#"
            [[sources]]
            id = "a"
            name = "A"
            base_url = "not a url"
            search_path = "/x"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid URL"));
    }

    #[test]
    fn missing_required_field_rejected() {
        let err = SourceCatalog::from_toml_str(
            r#"
            [[sources]]
            id = "a"
            name = "A"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[test]
    fn from_file_reads_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sources.toml");
        std::fs::write(&path, CATALOG).expect("write");
        let catalog = SourceCatalog::from_file(&path).expect("load");
        assert_eq!(catalog.len(), 2);
    }
}
