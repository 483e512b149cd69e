//! Registry for managing literature source plugins.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Source, SourceError};
use crate::config::Config;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const DOI_LOOKUP = 1 << 1;
        const AUTHOR_SEARCH = 1 << 2;
    }
}

/// Registry for all available literature sources
///
/// The SourceRegistry manages all available source plugins and provides
/// methods to query and use them.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn Source>>,
    /// Registration order; iteration follows it so "first occurrence wins"
    /// merges are deterministic.
    order: Vec<String>,
}

impl SourceRegistry {
    /// Create a new registry with all compiled-in sources
    pub fn new() -> Result<Self, SourceError> {
        Self::with_config(&Config::default())
    }

    /// Create a registry with no sources registered
    pub fn empty() -> Self {
        Self {
            sources: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Create a new registry with all compiled-in sources, using API keys
    /// and contact details from the given configuration
    pub fn with_config(config: &Config) -> Result<Self, SourceError> {
        let mut registry = Self::empty();

        #[cfg(feature = "source-pubmed")]
        registry.register(Arc::new(super::PubMedSource::new(
            config.api_keys.pubmed.clone(),
        )?));

        #[cfg(feature = "source-semantic")]
        registry.register(Arc::new(super::SemanticScholarSource::new(
            config.api_keys.semantic_scholar.clone(),
        )?));

        #[cfg(feature = "source-crossref")]
        registry.register(Arc::new(super::CrossRefSource::new(
            config.search.crossref_mailto.clone(),
        )?));

        Ok(registry)
    }

    /// Register a new source
    pub fn register(&mut self, source: Arc<dyn Source>) {
        let id = source.id().to_string();
        if self.sources.insert(id.clone(), source).is_none() {
            self.order.push(id);
        }
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.get(id)
    }

    /// Get a source by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(id)
            .ok_or_else(|| SourceError::NotFound(format!("Source '{}' not found", id)))
    }

    /// Get all registered sources
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.order.iter().map(|id| &self.sources[id])
    }

    /// Get all source IDs
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Get sources that support search
    pub fn searchable(&self) -> Vec<&Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::SEARCH)
    }

    /// Get sources that support DOI lookup
    pub fn with_doi_lookup(&self) -> Vec<&Arc<dyn Source>> {
        self.with_capability(SourceCapabilities::DOI_LOOKUP)
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
