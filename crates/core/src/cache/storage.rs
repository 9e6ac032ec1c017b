//! The storage seam used by the agent.
//!
//! `CacheStorage` is the host's cache API (open by name, match, put, delete,
//! list names). `CacheHandle` binds one store name to a storage so the
//! strategies can be handed exactly the store they own.

use std::fmt;
use std::sync::Arc;

use super::connection::CacheDb;
use super::entries::StoredEntry;
use crate::http::{AgentRequest, AgentResponse};
use crate::Error;

/// Named key-value stores keyed by request identity.
///
/// Implementations must make each `put` atomic per entry and must remove a
/// store's entries together with the store on `delete`.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a store, creating it if missing.
    async fn open(&self, name: &str) -> Result<(), Error>;

    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// All store names.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a store wholesale. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    async fn match_request(&self, name: &str, request: &AgentRequest) -> Result<Option<StoredEntry>, Error>;

    async fn put(&self, name: &str, request: &AgentRequest, response: &AgentResponse) -> Result<(), Error>;

    async fn delete_request(&self, name: &str, request: &AgentRequest) -> Result<bool, Error>;

    /// URLs stored in a store.
    async fn entries(&self, name: &str) -> Result<Vec<String>, Error>;
}

#[async_trait::async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.open_cache(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        self.has_cache(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.cache_names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_cache(name).await
    }

    async fn match_request(&self, name: &str, request: &AgentRequest) -> Result<Option<StoredEntry>, Error> {
        self.match_entry(name, request).await
    }

    async fn put(&self, name: &str, request: &AgentRequest, response: &AgentResponse) -> Result<(), Error> {
        self.put_entry(name, request, response).await
    }

    async fn delete_request(&self, name: &str, request: &AgentRequest) -> Result<bool, Error> {
        self.delete_entry(name, request).await
    }

    async fn entries(&self, name: &str) -> Result<Vec<String>, Error> {
        self.entry_urls(name).await
    }
}

/// A single named store on a shared storage.
#[derive(Clone)]
pub struct CacheHandle {
    storage: Arc<dyn CacheStorage>,
    name: String,
}

impl CacheHandle {
    pub fn new(storage: Arc<dyn CacheStorage>, name: impl Into<String>) -> Self {
        Self { storage, name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn open(&self) -> Result<(), Error> {
        self.storage.open(&self.name).await
    }

    /// Stored response for the request, if any.
    pub async fn lookup(&self, request: &AgentRequest) -> Result<Option<AgentResponse>, Error> {
        Ok(self
            .storage
            .match_request(&self.name, request)
            .await?
            .map(StoredEntry::into_response))
    }

    pub async fn put(&self, request: &AgentRequest, response: &AgentResponse) -> Result<(), Error> {
        self.storage.put(&self.name, request, response).await
    }

    pub async fn delete(&self, request: &AgentRequest) -> Result<bool, Error> {
        self.storage.delete_request(&self.name, request).await
    }

    pub async fn urls(&self) -> Result<Vec<String>, Error> {
        self.storage.entries(&self.name).await
    }
}

impl fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Destination, ResponseSource};
    use bytes::Bytes;
    use url::Url;

    #[tokio::test]
    async fn test_handle_roundtrip() {
        let storage: Arc<dyn CacheStorage> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let handle = CacheHandle::new(storage.clone(), "devis-app-static-v1");
        let request = AgentRequest::get(
            Url::parse("https://example.com/icons/icon-192x192.png").unwrap(),
            Destination::Image,
        );

        assert!(handle.lookup(&request).await.unwrap().is_none());

        let response = AgentResponse {
            url: request.url.to_string(),
            status: 200,
            headers: vec![("content-type".into(), "image/png".into())],
            body: Bytes::from_static(&[0x89, 0x50, 0x4e, 0x47]),
            source: ResponseSource::Network,
        };
        handle.put(&request, &response).await.unwrap();

        let cached = handle.lookup(&request).await.unwrap().unwrap();
        assert_eq!(cached.body, response.body);
        assert_eq!(cached.source, ResponseSource::Cache);
        assert_eq!(storage.keys().await.unwrap(), vec!["devis-app-static-v1".to_string()]);
        assert_eq!(handle.urls().await.unwrap(), vec![request.url.to_string()]);

        assert!(handle.delete(&request).await.unwrap());
        assert!(handle.lookup(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_handles_share_storage() {
        let storage: Arc<dyn CacheStorage> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let a = CacheHandle::new(storage.clone(), "a");
        let b = CacheHandle::new(storage.clone(), "b");
        a.open().await.unwrap();
        b.open().await.unwrap();

        let mut names = storage.keys().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(format!("{a:?}"), "CacheHandle { name: \"a\" }");
    }
}
