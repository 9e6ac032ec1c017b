//! cache_get tool implementation.
//!
//! Retrieves the entry stored for a request, from one store or from the two
//! current stores in lookup order (dynamic, then static).

use offline_client::Agent;
use offline_client::fetch::canonicalize;
use offline_core::{AgentRequest, CacheDb, Destination, Error, StoredEntry};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL of the stored request.
    pub url: String,

    /// HTTP method of the stored request (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Store to read; both current stores when omitted.
    #[serde(default)]
    pub cache: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub cache_name: String,
    pub url: String,
    /// Final URL of the stored response.
    pub response_url: String,
    pub method: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub stored_at: String,
    /// Body size in bytes.
    pub size: usize,
    /// Body as text (lossy UTF-8).
    pub body: String,
}

impl From<StoredEntry> for CacheGetOutput {
    fn from(entry: StoredEntry) -> Self {
        Self {
            size: entry.body.len(),
            body: String::from_utf8_lossy(&entry.body).into_owned(),
            cache_name: entry.cache_name,
            url: entry.url,
            response_url: entry.response_url,
            method: entry.method,
            status: entry.status,
            headers: entry.headers,
            stored_at: entry.stored_at,
        }
    }
}

/// Implementation of the cache_get tool.
pub async fn get_impl(agent: &Agent, cache: &CacheDb, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = canonicalize(&params.url).map_err(|e| ToolError::InvalidInput(format!("{}: {}", params.url, e)))?;
    let request = AgentRequest::new(&params.method, url, Destination::Empty);

    let names = match params.cache {
        Some(name) => vec![name],
        None => vec![agent.dynamic_cache().name().to_string(), agent.static_cache().name().to_string()],
    };

    for name in &names {
        if let Some(entry) = cache.match_entry(name, &request).await? {
            return json_result(&CacheGetOutput::from(entry));
        }
    }

    Err(Error::CacheMiss(format!("{} in {}", request, names.join(", "))).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::result_json;
    use crate::tools::testing::{ORIGIN, active_fixture};

    #[tokio::test]
    async fn test_get_missing() {
        let fx = active_fixture().await;
        let params = CacheGetParams { url: format!("{ORIGIN}/nope.css"), method: "GET".into(), cache: None };

        let err = get_impl(&fx.agent, &fx.db, params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }

    #[tokio::test]
    async fn test_get_precached_entry() {
        let fx = active_fixture().await;
        let params = CacheGetParams { url: format!("{ORIGIN}/app/shared.css"), method: "GET".into(), cache: None };

        let json = result_json(&get_impl(&fx.agent, &fx.db, params).await.unwrap());
        assert_eq!(json["cache_name"], "devis-app-static-v1");
        assert_eq!(json["status"], 200);
        assert_eq!(json["body"], ".card{}");
        assert_eq!(json["size"], 7);
    }

    #[tokio::test]
    async fn test_get_named_store_only() {
        let fx = active_fixture().await;
        let params = CacheGetParams {
            url: format!("{ORIGIN}/app/shared.css"),
            method: "GET".into(),
            cache: Some("devis-app-v1".into()),
        };

        assert!(get_impl(&fx.agent, &fx.db, params).await.is_err());
    }
}
