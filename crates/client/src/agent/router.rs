//! Request classification.
//!
//! Rules, first match wins:
//! 1. non-GET: passthrough
//! 2. excluded host: passthrough
//! 3. web-font host: cache-first
//! 4. navigation, `*.html` or `/`: network-first
//! 5. style, script, image, font: cache-first
//! 6. anything else: network-first

use offline_core::{AgentConfig, AgentRequest, Destination};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Caching strategy applied to an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
}

/// Why a request was left to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PassthroughReason {
    NotGet,
    ExcludedHost,
    /// The agent is not activated yet and controls no page.
    NotControlling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Passthrough(PassthroughReason),
    Intercept(Strategy),
}

/// Host lists the router matches against. Matching is by substring on the
/// request host, so `supabase.co` covers every project subdomain.
#[derive(Debug, Clone, Default)]
pub struct RoutingPolicy {
    pub excluded_hosts: Vec<String>,
    pub font_hosts: Vec<String>,
}

impl From<&AgentConfig> for RoutingPolicy {
    fn from(config: &AgentConfig) -> Self {
        Self { excluded_hosts: config.excluded_hosts.clone(), font_hosts: config.font_hosts.clone() }
    }
}

impl RoutingPolicy {
    pub fn classify(&self, request: &AgentRequest) -> Route {
        if !request.is_get() {
            return Route::Passthrough(PassthroughReason::NotGet);
        }

        let host = request.host();
        if matches_any(host, &self.excluded_hosts) {
            return Route::Passthrough(PassthroughReason::ExcludedHost);
        }

        if matches_any(host, &self.font_hosts) {
            return Route::Intercept(Strategy::CacheFirst);
        }

        let path = request.path();
        if request.destination == Destination::Document || path.ends_with(".html") || path == "/" {
            return Route::Intercept(Strategy::NetworkFirst);
        }

        if request.destination.is_static_asset() {
            return Route::Intercept(Strategy::CacheFirst);
        }

        Route::Intercept(Strategy::NetworkFirst)
    }
}

fn matches_any(host: &str, patterns: &[String]) -> bool {
    !host.is_empty() && patterns.iter().any(|p| !p.is_empty() && host.contains(p.as_str()))
}
