//! Fetching and caching the three configuration documents.
//!
//! Documents are read from the `config` cache namespace first. Only when a
//! document is missing or unreadable are all three fetched from the source,
//! concurrently, and written back to the cache.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use nbs_common::{ConfigDocument, ConfigDocuments, ConfigSnapshot, NbsError, NbsResult};
use reqwest::Client;
use storage::{KeyValueStore, Namespace};
use tracing::{debug, info, instrument, warn};

/// Where configuration documents come from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch one document's raw JSON.
    async fn fetch(&self, document: ConfigDocument) -> NbsResult<Bytes>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Documents served over HTTP as `{base_url}/{name}.json`.
pub struct HttpConfigSource {
    client: Client,
    base_url: String,
}

impl HttpConfigSource {
    pub fn new(base_url: impl Into<String>) -> NbsResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NbsError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, document: ConfigDocument) -> String {
        format!("{}/{}", self.base_url, document.file_name())
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn fetch(&self, document: ConfigDocument) -> NbsResult<Bytes> {
        let url = self.url(document);
        debug!(url = %url, "Fetching configuration document");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| NbsError::config_fetch(document.name(), e.to_string()))?;

        response
            .bytes()
            .await
            .map_err(|e| NbsError::config_fetch(document.name(), e.to_string()))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Documents stored as `{dir}/{name}.json`.
pub struct FileConfigSource {
    dir: PathBuf,
}

impl FileConfigSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn fetch(&self, document: ConfigDocument) -> NbsResult<Bytes> {
        let path = self.dir.join(document.file_name());
        debug!(path = %path.display(), "Reading configuration document");

        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| NbsError::config_fetch(document.name(), format!("{}: {}", path.display(), e)))
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct InlineConfigSource {
    documents: HashMap<ConfigDocument, Bytes>,
}

impl InlineConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, document: ConfigDocument, json: impl Into<Bytes>) -> Self {
        self.documents.insert(document, json.into());
        self
    }
}

#[async_trait]
impl ConfigSource for InlineConfigSource {
    async fn fetch(&self, document: ConfigDocument) -> NbsResult<Bytes> {
        self.documents
            .get(&document)
            .cloned()
            .ok_or_else(|| NbsError::config_fetch(document.name(), "document not provided"))
    }

    fn describe(&self) -> String {
        "inline".to_string()
    }
}

/// Load and validate the configuration, cache-first.
///
/// Any fetch or parse failure is fatal and nothing partial is returned.
#[instrument(skip(source, cache), fields(source = %source.describe()))]
pub async fn load_configuration(
    source: &dyn ConfigSource,
    cache: &dyn KeyValueStore,
) -> NbsResult<ConfigSnapshot> {
    if let Some(documents) = read_cached(cache).await {
        info!("Configuration loaded from cache");
        return ConfigSnapshot::from_documents(documents);
    }

    let (criteria, categories, costs) = tokio::try_join!(
        source.fetch(ConfigDocument::SolutionCriteria),
        source.fetch(ConfigDocument::ChallengeCategories),
        source.fetch(ConfigDocument::SolutionCosts),
    )?;

    let mut documents = ConfigDocuments::default();
    documents.set_document(ConfigDocument::SolutionCriteria, &criteria)?;
    documents.set_document(ConfigDocument::ChallengeCategories, &categories)?;
    documents.set_document(ConfigDocument::SolutionCosts, &costs)?;

    let snapshot = ConfigSnapshot::from_documents(documents)?;

    for (document, json) in [
        (ConfigDocument::SolutionCriteria, criteria),
        (ConfigDocument::ChallengeCategories, categories),
        (ConfigDocument::SolutionCosts, costs),
    ] {
        if let Err(e) = cache.put(Namespace::Config, document.name(), json).await {
            warn!(document = %document, error = %e, "Failed to cache configuration document");
        }
    }

    info!(
        solutions = snapshot.solutions().count(),
        categories = snapshot.category_names().count(),
        "Configuration loaded from source"
    );
    Ok(snapshot)
}

/// All three documents from the cache, or `None` if any is missing or
/// fails to parse.
async fn read_cached(cache: &dyn KeyValueStore) -> Option<ConfigDocuments> {
    let mut documents = ConfigDocuments::default();

    for document in ConfigDocument::ALL {
        let json = match cache.get(Namespace::Config, document.name()).await {
            Ok(Some(json)) => json,
            Ok(None) => {
                debug!(document = %document, "Configuration cache miss");
                return None;
            }
            Err(e) => {
                warn!(document = %document, error = %e, "Configuration cache read failed");
                return None;
            }
        };

        if let Err(e) = documents.set_document(document, &json) {
            warn!(document = %document, error = %e, "Discarding unreadable cached document");
            return None;
        }
    }

    Some(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::MemoryStore;
    use test_utils::config as fixture;

    fn wetland_source() -> InlineConfigSource {
        InlineConfigSource::new()
            .with_document(ConfigDocument::SolutionCriteria, fixture::WETLAND_CRITERIA)
            .with_document(ConfigDocument::ChallengeCategories, fixture::WETLAND_CATEGORIES)
            .with_document(ConfigDocument::SolutionCosts, fixture::WETLAND_COSTS)
    }

    /// Counts fetches made through it.
    struct Counting {
        inner: InlineConfigSource,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ConfigSource for Counting {
        async fn fetch(&self, document: ConfigDocument) -> NbsResult<Bytes> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(document).await
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[tokio::test]
    async fn test_load_then_serve_from_cache() {
        let source = Counting {
            inner: wetland_source(),
            fetches: AtomicUsize::new(0),
        };
        let cache = MemoryStore::new(8);

        let first = load_configuration(&source, &cache).await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);

        let second = load_configuration(&source, &cache).await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_document_is_fatal() {
        let source = InlineConfigSource::new()
            .with_document(ConfigDocument::SolutionCriteria, fixture::WETLAND_CRITERIA);
        let cache = MemoryStore::new(8);

        let err = load_configuration(&source, &cache).await.unwrap_err();
        assert!(matches!(err, NbsError::ConfigFetch { .. }));
        assert!(err.is_fatal());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_document_is_fatal() {
        let source = wetland_source().with_document(ConfigDocument::SolutionCosts, "{not json");
        let err = load_configuration(&source, &MemoryStore::new(8)).await.unwrap_err();
        assert!(matches!(err, NbsError::ConfigParse { ref document, .. } if document == "solutionCosts"));
    }

    #[tokio::test]
    async fn test_corrupt_cache_falls_back_to_source() {
        let cache = MemoryStore::new(8);
        for document in ConfigDocument::ALL {
            cache
                .put(Namespace::Config, document.name(), Bytes::from_static(b"garbage"))
                .await
                .unwrap();
        }

        let snapshot = load_configuration(&wetland_source(), &cache).await.unwrap();
        assert!(snapshot.category("Flooding").is_ok());
    }

    #[tokio::test]
    async fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("solutionCriteria.json"), fixture::WETLAND_CRITERIA).unwrap();
        std::fs::write(dir.path().join("challengeCategories.json"), fixture::WETLAND_CATEGORIES).unwrap();
        std::fs::write(dir.path().join("solutionCosts.json"), fixture::WETLAND_COSTS).unwrap();

        let source = FileConfigSource::new(dir.path());
        let snapshot = load_configuration(&source, &MemoryStore::new(8)).await.unwrap();
        assert_eq!(snapshot.solutions().count(), 1);
    }

    #[test]
    fn test_http_url() {
        let source = HttpConfigSource::new("https://example.org/data/").unwrap();
        assert_eq!(
            source.url(ConfigDocument::ChallengeCategories),
            "https://example.org/data/challengeCategories.json"
        );
    }
}
