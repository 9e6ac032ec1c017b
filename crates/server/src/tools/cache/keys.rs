//! cache_keys tool implementation.

use offline_client::Agent;
use offline_core::CacheDb;
use offline_core::cache::CacheSummary;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    /// Name of the current dynamic store.
    pub dynamic_cache: String,
    /// Name of the current static store.
    pub static_cache: String,
    /// Every existing store with its entry count.
    pub caches: Vec<CacheSummary>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(agent: &Agent, cache: &CacheDb) -> Result<CallToolResult, McpError> {
    let output = CacheKeysOutput {
        dynamic_cache: agent.dynamic_cache().name().to_string(),
        static_cache: agent.static_cache().name().to_string(),
        caches: cache.cache_summaries().await?,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::result_json;
    use crate::tools::testing::{active_fixture, fixture};

    #[tokio::test]
    async fn test_keys_before_install() {
        let fx = fixture().await;
        let json = result_json(&keys_impl(&fx.agent, &fx.db).await.unwrap());
        assert_eq!(json["dynamic_cache"], "devis-app-v1");
        assert_eq!(json["static_cache"], "devis-app-static-v1");
        assert!(json["caches"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keys_after_activation() {
        let fx = active_fixture().await;
        let output: CacheKeysOutput =
            serde_json::from_value(result_json(&keys_impl(&fx.agent, &fx.db).await.unwrap())).unwrap();
        assert_eq!(output.caches, vec![CacheSummary { name: "devis-app-static-v1".into(), entries: 2 }]);
    }
}
