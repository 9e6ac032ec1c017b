//! Cache-first and network-first strategies.
//!
//! Storage trouble never fails a request that something else can still
//! answer: a failed lookup counts as a miss and a failed write-back only
//! costs the cached copy.

use offline_core::{AgentRequest, AgentResponse, CacheHandle, Destination, Error};

use super::offline::OfflinePage;
use crate::fetch::Network;

/// Serve from `store` when present, otherwise fetch and keep an OK copy there.
pub async fn cache_first(
    request: &AgentRequest, store: &CacheHandle, network: &dyn Network,
) -> Result<AgentResponse, Error> {
    if let Some(cached) = lookup(store, request).await {
        tracing::debug!(cache = store.name(), "cache hit for {}", request.url);
        return Ok(cached);
    }

    tracing::debug!(cache = store.name(), "cache miss for {}", request.url);

    let response = network.fetch(request).await.map_err(|e| {
        tracing::debug!("cache-first fetch failed for {}: {}", request.url, e);
        Error::OfflineNotCached(request.url.to_string())
    })?;

    if response.is_ok() {
        write_back(store, request, &response).await;
    }

    Ok(response)
}

/// Fetch first and keep an OK copy in `store`. When the network fails, answer
/// from `store`, then from each of `fallbacks`, then with the offline page
/// for navigations.
pub async fn network_first(
    request: &AgentRequest, store: &CacheHandle, fallbacks: &[&CacheHandle], network: &dyn Network,
    offline_page: &OfflinePage,
) -> Result<AgentResponse, Error> {
    let err = match network.fetch(request).await {
        Ok(response) => {
            if response.is_ok() {
                write_back(store, request, &response).await;
            }
            return Ok(response);
        }
        Err(err) => err,
    };

    tracing::debug!("network-first fetch failed for {}: {}", request.url, err);

    for handle in std::iter::once(store).chain(fallbacks.iter().copied()) {
        if let Some(cached) = lookup(handle, request).await {
            tracing::debug!(cache = handle.name(), "serving stored copy of {}", request.url);
            return Ok(cached);
        }
    }

    if request.destination == Destination::Document {
        tracing::info!("serving offline page for {}", request.url);
        return Ok(offline_page.render(request.url.as_str()));
    }

    Err(Error::Offline(request.url.to_string()))
}

async fn lookup(store: &CacheHandle, request: &AgentRequest) -> Option<AgentResponse> {
    match store.lookup(request).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(cache = store.name(), "lookup failed for {}: {}", request.url, e);
            None
        }
    }
}

async fn write_back(store: &CacheHandle, request: &AgentRequest, response: &AgentResponse) {
    if let Err(e) = store.put(request, response).await {
        tracing::warn!(cache = store.name(), "failed to store {}: {}", request.url, e);
    }
}
