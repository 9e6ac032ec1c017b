//! The offline cache agent.
//!
//! The host delivers four events (install, activate, fetch, message) through
//! [`Agent::dispatch`]; the returned future is the completion the host waits
//! on before moving to its next lifecycle phase or answering the page.
//!
//! The agent owns two store handles: the dynamic store, written by
//! network-first, and the static store, filled at install and by cache-first.

pub mod lifecycle;
pub mod offline;
pub mod router;
pub mod strategy;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use offline_core::{AgentConfig, AgentRequest, AgentResponse, CacheHandle, CacheStorage, Error};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::{Network, canonicalize};

pub use lifecycle::{
    ActivationOutcome, ActivationReport, AgentState, AssetOutcome, AssetStatus, InstallObserver, InstallReport,
    MessageOutcome, SKIP_WAITING_MESSAGE,
};
pub use offline::OfflinePage;
pub use router::{PassthroughReason, Route, RoutingPolicy, Strategy};

/// Lifecycle and interception events delivered by the host.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Install,
    Activate { previous_controls_clients: bool },
    Fetch(AgentRequest),
    Message(String),
}

/// What the agent did with an intercepted request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs its normal network handling.
    Passthrough(PassthroughReason),
    /// Intercepted; the host answers the page with this response.
    Respond { strategy: Strategy, response: AgentResponse },
}

#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activation(ActivationOutcome),
    Fetch(FetchOutcome),
    Message(MessageOutcome),
}

/// Summary of the routing decision, for hosts that only need the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Passthrough,
    Respond,
}

impl FetchOutcome {
    pub fn disposition(&self) -> Disposition {
        match self {
            FetchOutcome::Passthrough(_) => Disposition::Passthrough,
            FetchOutcome::Respond { .. } => Disposition::Respond,
        }
    }

    pub fn response(&self) -> Option<&AgentResponse> {
        match self {
            FetchOutcome::Passthrough(_) => None,
            FetchOutcome::Respond { response, .. } => Some(response),
        }
    }
}

pub struct Agent {
    config: AgentConfig,
    origin: Url,
    policy: RoutingPolicy,
    offline_page: OfflinePage,
    network: Arc<dyn Network>,
    storage: Arc<dyn CacheStorage>,
    dynamic_cache: CacheHandle,
    static_cache: CacheHandle,
    state: RwLock<AgentState>,
    skip_waiting: AtomicBool,
    controls_clients: AtomicBool,
}

impl Agent {
    /// Build an agent for the configured version.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the configured origin is not an http(s)
    /// URL, or `Error::Render` if the offline page cannot be rendered.
    pub fn new(config: AgentConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = canonicalize(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {}", config.origin, e)))?;
        let dynamic_cache = CacheHandle::new(storage.clone(), config.dynamic_cache_name());
        let static_cache = CacheHandle::new(storage.clone(), config.static_cache_name());

        Ok(Self {
            policy: RoutingPolicy::from(&config),
            offline_page: OfflinePage::new(&config.app_name)?,
            origin,
            network,
            storage,
            dynamic_cache,
            static_cache,
            state: RwLock::new(AgentState::Parsed),
            skip_waiting: AtomicBool::new(false),
            controls_clients: AtomicBool::new(false),
            config,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn dynamic_cache(&self) -> &CacheHandle {
        &self.dynamic_cache
    }

    pub fn static_cache(&self) -> &CacheHandle {
        &self.static_cache
    }

    /// Route one host event to its handler.
    pub async fn dispatch(&self, event: AgentEvent) -> Result<EventOutcome, Error> {
        match event {
            AgentEvent::Install => self.install().await.map(EventOutcome::Installed),
            AgentEvent::Activate { previous_controls_clients } => {
                self.activate(previous_controls_clients)
                    .await
                    .map(EventOutcome::Activation)
            }
            AgentEvent::Fetch(request) => self.handle_fetch(&request).await.map(EventOutcome::Fetch),
            AgentEvent::Message(data) => Ok(EventOutcome::Message(self.message(&data))),
        }
    }

    /// Decide how a request is handled and, when intercepted, produce its response.
    ///
    /// # Errors
    ///
    /// `Error::OfflineNotCached` or `Error::Offline` when an intercepted
    /// request can be answered neither by the network nor by a store.
    pub async fn handle_fetch(&self, request: &AgentRequest) -> Result<FetchOutcome, Error> {
        let route = if self.state().await == AgentState::Activated {
            self.policy.classify(request)
        } else {
            Route::Passthrough(PassthroughReason::NotControlling)
        };

        let strategy = match route {
            Route::Passthrough(reason) => {
                tracing::debug!(?reason, "passthrough {}", request);
                return Ok(FetchOutcome::Passthrough(reason));
            }
            Route::Intercept(strategy) => strategy,
        };

        tracing::debug!(?strategy, "intercept {}", request);

        let response = match strategy {
            Strategy::CacheFirst => strategy::cache_first(request, &self.static_cache, self.network.as_ref()).await?,
            Strategy::NetworkFirst => {
                strategy::network_first(
                    request,
                    &self.dynamic_cache,
                    &[&self.static_cache],
                    self.network.as_ref(),
                    &self.offline_page,
                )
                .await?
            }
        };

        Ok(FetchOutcome::Respond { strategy, response })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::StubNetwork;
    use offline_core::{CacheDb, Destination, ResponseSource};

    const ORIGIN: &str = "https://devis.example.com";

    async fn active_agent() -> (Agent, Arc<StubNetwork>, Arc<CacheDb>) {
        let config = AgentConfig {
            origin: ORIGIN.into(),
            static_assets: vec!["/app/shared.css".into()],
            ..Default::default()
        };
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(StubNetwork::new());
        network.serve(&format!("{ORIGIN}/app/shared.css"), 200, "text/css", ".card{padding:8px}");

        let agent = Agent::new(config, db.clone(), network.clone()).unwrap();
        agent.dispatch(AgentEvent::Install).await.unwrap();
        agent
            .dispatch(AgentEvent::Activate { previous_controls_clients: false })
            .await
            .unwrap();
        (agent, network, db)
    }

    fn get(url: &str, destination: Destination) -> AgentRequest {
        AgentRequest::get(Url::parse(url).unwrap(), destination)
    }

    async fn fetch(agent: &Agent, request: AgentRequest) -> Result<FetchOutcome, Error> {
        match agent.dispatch(AgentEvent::Fetch(request)).await? {
            EventOutcome::Fetch(outcome) => Ok(outcome),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_new_rejects_bad_origin() {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let config = AgentConfig { origin: "not a url".into(), ..Default::default() };
        let result = Agent::new(config, db, Arc::new(StubNetwork::new()));
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_passthrough_before_activation() {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(StubNetwork::new());
        let agent = Agent::new(AgentConfig::default(), db, network.clone()).unwrap();

        let outcome = fetch(&agent, get("http://localhost:8080/app/shared.css", Destination::Style))
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough(PassthroughReason::NotControlling)));
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_excluded_origin_touches_nothing() {
        let (agent, network, db) = active_agent().await;
        let calls_before = network.calls();
        let entries_before = db.cache_summaries().await.unwrap();

        let outcome = fetch(&agent, get("https://xyzcompany.supabase.co/rest/v1/quotes", Destination::Empty))
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough(PassthroughReason::ExcludedHost)));
        assert_eq!(outcome.disposition(), Disposition::Passthrough);
        assert!(outcome.response().is_none());
        assert_eq!(network.calls(), calls_before);
        assert_eq!(db.cache_summaries().await.unwrap(), entries_before);
    }

    #[tokio::test]
    async fn test_non_get_not_intercepted() {
        let (agent, network, _db) = active_agent().await;
        let calls_before = network.calls();
        let request = AgentRequest::new("POST", Url::parse(&format!("{ORIGIN}/app/quotes.html")).unwrap(), Destination::Document);

        let outcome = fetch(&agent, request).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough(PassthroughReason::NotGet)));
        assert_eq!(network.calls(), calls_before);
    }

    #[tokio::test]
    async fn test_offline_dashboard_gets_offline_page() {
        let (agent, network, _db) = active_agent().await;
        network.set_online(false);

        let outcome = fetch(&agent, get(&format!("{ORIGIN}/app/dashboard.html"), Destination::Document))
            .await
            .unwrap();
        let FetchOutcome::Respond { strategy, response } = outcome else {
            panic!("expected a response");
        };
        assert_eq!(strategy, Strategy::NetworkFirst);
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
        assert!(response.text().contains("Pas de connexion"));
    }

    #[tokio::test]
    async fn test_precached_stylesheet_served_offline() {
        let (agent, network, _db) = active_agent().await;
        network.set_online(false);
        let calls_before = network.calls();

        let outcome = fetch(&agent, get(&format!("{ORIGIN}/app/shared.css"), Destination::Style))
            .await
            .unwrap();
        let response = outcome.response().unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.text(), ".card{padding:8px}");
        assert_eq!(network.calls(), calls_before);
    }

    #[tokio::test]
    async fn test_font_cached_after_first_fetch() {
        let (agent, network, db) = active_agent().await;
        let font = "https://fonts.gstatic.com/s/syne/v22/8vIS7w4qzmVxsWxjBZRjr0FKM_04uQ.woff2";
        network.serve(font, 200, "font/woff2", "wOF2");

        fetch(&agent, get(font, Destination::Font)).await.unwrap();
        fetch(&agent, get(font, Destination::Font)).await.unwrap();
        assert_eq!(network.calls_for(font), 1);
        assert!(db.entry_urls("devis-app-static-v1").await.unwrap().contains(&font.to_string()));
    }

    #[tokio::test]
    async fn test_document_written_to_dynamic_store() {
        let (agent, network, db) = active_agent().await;
        let url = format!("{ORIGIN}/app/clients.html");
        network.serve(&url, 200, "text/html", "<h1>Clients</h1>");

        fetch(&agent, get(&url, Destination::Document)).await.unwrap();
        assert_eq!(db.entry_urls("devis-app-v1").await.unwrap(), vec![url]);
    }

    #[tokio::test]
    async fn test_offline_script_miss_is_error() {
        let (agent, network, _db) = active_agent().await;
        network.set_online(false);

        let result = fetch(&agent, get(&format!("{ORIGIN}/app/quotes.js"), Destination::Script)).await;
        assert!(matches!(result, Err(Error::OfflineNotCached(_))));
    }

    #[tokio::test]
    async fn test_message_event() {
        let (agent, _network, _db) = active_agent().await;
        let outcome = agent.dispatch(AgentEvent::Message("PING".into())).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Message(MessageOutcome::Ignored)));
    }
}
