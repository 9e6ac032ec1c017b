//! Install and activation.
//!
//! Install pre-caches the static manifest, best effort per asset. Activation
//! deletes every store that is not one of the two current ones, then claims
//! the pages already open.

use std::sync::atomic::Ordering;

use futures_util::future::join_all;
use offline_core::{AgentRequest, Destination, Error};
use serde::Serialize;

use super::Agent;
use crate::fetch::resolve;

/// Lifecycle states of an agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Created, install not run yet.
    Parsed,
    Installing,
    /// Installed, waiting to activate.
    Installed,
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Replaced by a newer version; no longer handles events.
    Redundant,
}

/// Result of pre-caching one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetOutcome {
    pub path: String,
    #[serde(flatten)]
    pub status: AssetStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetStatus {
    Cached { url: String },
    Failed { reason: String },
}

impl AssetOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self.status, AssetStatus::Cached { .. })
    }
}

/// Receives every install outcome, success or failure.
pub trait InstallObserver: Send + Sync {
    fn on_asset(&self, outcome: &AssetOutcome);
}

impl<F> InstallObserver for F
where
    F: Fn(&AssetOutcome) + Send + Sync,
{
    fn on_asset(&self, outcome: &AssetOutcome) {
        self(outcome)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub cache_name: String,
    pub assets: Vec<AssetOutcome>,
    /// Whether immediate activation was requested.
    pub skip_waiting: bool,
}

impl InstallReport {
    pub fn cached(&self) -> usize {
        self.assets.iter().filter(|a| a.is_cached()).count()
    }

    pub fn failed(&self) -> usize {
        self.assets.len() - self.cached()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    /// Stores removed because they belong to another version.
    pub deleted: Vec<String>,
    /// Stores left after cleanup.
    pub kept: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// A previous version still controls pages and nobody asked to skip waiting.
    Waiting,
    Activated(ActivationReport),
}

/// Reply to a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOutcome {
    SkipWaiting,
    Ignored,
}

pub const SKIP_WAITING_MESSAGE: &str = "SKIP_WAITING";

impl Agent {
    /// Run install without an observer; failures are still logged.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.install_with(&|_: &AssetOutcome| {}).await
    }

    /// Pre-cache the static manifest into the static store.
    ///
    /// Every entry is fetched concurrently and independently; a failing entry
    /// is logged and reported but never aborts the others. Only a failure to
    /// open the static store fails the install.
    pub async fn install_with(&self, observer: &dyn InstallObserver) -> Result<InstallReport, Error> {
        self.transition(&[AgentState::Parsed, AgentState::Installed], AgentState::Installing)
            .await?;
        tracing::info!(cache = self.static_cache.name(), "installing");

        if let Err(e) = self.static_cache.open().await {
            self.set_state(AgentState::Parsed).await;
            return Err(e);
        }

        let assets = join_all(self.config.static_assets.iter().map(|path| self.add_asset(path))).await;

        for outcome in &assets {
            match &outcome.status {
                AssetStatus::Cached { url } => tracing::debug!("cached {}", url),
                AssetStatus::Failed { reason } => tracing::warn!("skip: {} ({})", outcome.path, reason),
            }
            observer.on_asset(outcome);
        }

        self.set_state(AgentState::Installed).await;
        if self.config.skip_waiting_on_install {
            self.skip_waiting();
        }

        let report = InstallReport {
            cache_name: self.static_cache.name().to_string(),
            assets,
            skip_waiting: self.skip_waiting_requested(),
        };
        tracing::info!(cached = report.cached(), failed = report.failed(), "installed");

        Ok(report)
    }

    async fn add_asset(&self, path: &str) -> AssetOutcome {
        let status = match self.fetch_asset(path).await {
            Ok(url) => AssetStatus::Cached { url },
            Err(reason) => AssetStatus::Failed { reason },
        };
        AssetOutcome { path: path.to_string(), status }
    }

    async fn fetch_asset(&self, path: &str) -> Result<String, String> {
        let url = resolve(&self.origin, path).map_err(|e| e.to_string())?;
        let request = AgentRequest::get(url, Destination::Empty);

        let response = self.network.fetch(&request).await.map_err(|e| e.to_string())?;
        if !response.is_ok() {
            return Err(format!("status {}", response.status));
        }

        self.static_cache
            .put(&request, &response)
            .await
            .map_err(|e| e.to_string())?;

        Ok(request.url.to_string())
    }

    /// Delete stores of other versions and claim open pages.
    ///
    /// `previous_controls_clients` tells whether an older version still
    /// controls pages; unless skip waiting was requested the activation then
    /// reports `Waiting` and nothing changes.
    pub async fn activate(&self, previous_controls_clients: bool) -> Result<ActivationOutcome, Error> {
        {
            let state = self.state.read().await;
            if *state == AgentState::Installed && previous_controls_clients && !self.skip_waiting_requested() {
                tracing::info!("waiting for previous version to release its pages");
                return Ok(ActivationOutcome::Waiting);
            }
        }

        let previous = self
            .transition(&[AgentState::Installed, AgentState::Activated], AgentState::Activating)
            .await?;

        let current = [self.dynamic_cache.name(), self.static_cache.name()];
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                self.set_state(previous).await;
                return Err(e);
            }
        };

        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| !current.contains(&name.as_str()))
            .collect();

        let results = join_all(stale.iter().map(|name| self.storage.delete(name))).await;
        if let Some(err) = results.into_iter().find_map(Result::err) {
            self.set_state(previous).await;
            return Err(err);
        }

        for name in &stale {
            tracing::info!(cache = %name, "deleted old cache");
        }

        self.claim();
        self.set_state(AgentState::Activated).await;

        let kept = self.storage.keys().await?;
        tracing::info!(deleted = stale.len(), "activated");

        Ok(ActivationOutcome::Activated(ActivationReport { deleted: stale, kept }))
    }

    /// Allow activation without waiting for the previous version's pages.
    pub fn skip_waiting(&self) {
        if !self.skip_waiting.swap(true, Ordering::SeqCst) {
            tracing::info!("skip waiting requested");
        }
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Handle a control message posted by a page.
    pub fn message(&self, data: &str) -> MessageOutcome {
        if data.trim() == SKIP_WAITING_MESSAGE {
            self.skip_waiting();
            MessageOutcome::SkipWaiting
        } else {
            tracing::debug!("ignoring message {:?}", data);
            MessageOutcome::Ignored
        }
    }

    /// Start controlling pages that were opened before activation.
    fn claim(&self) {
        self.controls_clients.store(true, Ordering::SeqCst);
    }

    pub fn controls_clients(&self) -> bool {
        self.controls_clients.load(Ordering::SeqCst)
    }

    /// Mark this instance as replaced by a newer version.
    pub async fn retire(&self) {
        let mut state = self.state.write().await;
        if *state != AgentState::Redundant {
            tracing::info!(from = ?*state, "agent replaced by a newer version");
            *state = AgentState::Redundant;
        }
        self.controls_clients.store(false, Ordering::SeqCst);
    }

    pub async fn state(&self) -> AgentState {
        *self.state.read().await
    }

    async fn set_state(&self, next: AgentState) {
        *self.state.write().await = next;
    }

    /// Move to `next` if the current state is one of `from`; returns the state left.
    async fn transition(&self, from: &[AgentState], next: AgentState) -> Result<AgentState, Error> {
        let mut state = self.state.write().await;
        let current = *state;
        if !from.contains(&current) {
            return Err(Error::InvalidState(format!("cannot move from {current:?} to {next:?}")));
        }
        *state = next;
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::StubNetwork;
    use offline_core::{AgentConfig, CacheDb, CacheStorage};
    use std::sync::{Arc, Mutex};

    const ORIGIN: &str = "https://devis.example.com";

    fn config() -> AgentConfig {
        AgentConfig {
            origin: ORIGIN.into(),
            static_assets: vec!["/".into(), "/app/shared.css".into(), "/icons/icon-512x512.png".into()],
            ..Default::default()
        }
    }

    async fn agent_with(config: AgentConfig) -> (Agent, Arc<StubNetwork>, Arc<CacheDb>) {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(StubNetwork::new());
        let agent = Agent::new(config, db.clone(), network.clone()).unwrap();
        (agent, network, db)
    }

    #[tokio::test]
    async fn test_install_caches_manifest() {
        let (agent, network, db) = agent_with(config()).await;
        network.serve(&format!("{ORIGIN}/"), 200, "text/html", "<h1>Accueil</h1>");
        network.serve(&format!("{ORIGIN}/app/shared.css"), 200, "text/css", "body{}");
        network.serve(&format!("{ORIGIN}/icons/icon-512x512.png"), 200, "image/png", "png");

        let report = agent.install().await.unwrap();
        assert_eq!(report.cache_name, "devis-app-static-v1");
        assert_eq!(report.cached(), 3);
        assert_eq!(report.failed(), 0);
        assert!(report.skip_waiting);
        assert_eq!(agent.state().await, AgentState::Installed);
        assert_eq!(db.entry_urls("devis-app-static-v1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_install_is_best_effort() {
        let (agent, network, db) = agent_with(config()).await;
        network.serve(&format!("{ORIGIN}/app/shared.css"), 200, "text/css", "body{}");

        let seen = Mutex::new(Vec::new());
        let observer = |outcome: &AssetOutcome| seen.lock().unwrap().push(outcome.clone());
        let report = agent.install_with(&observer).await.unwrap();

        assert_eq!(report.cached(), 1);
        assert_eq!(report.failed(), 2);
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].path, "/");
        assert_eq!(seen[0].status, AssetStatus::Failed { reason: "status 404".into() });
        assert!(seen[1].is_cached());
        assert_eq!(db.entry_urls("devis-app-static-v1").await.unwrap(), vec![format!("{ORIGIN}/app/shared.css")]);
        assert_eq!(agent.state().await, AgentState::Installed);
    }

    #[tokio::test]
    async fn test_install_offline_still_completes() {
        let (agent, network, db) = agent_with(config()).await;
        network.set_online(false);

        let report = agent.install().await.unwrap();
        assert_eq!(report.failed(), 3);
        assert!(db.has_cache("devis-app-static-v1").await.unwrap());
        assert_eq!(agent.state().await, AgentState::Installed);
    }

    #[tokio::test]
    async fn test_install_twice_while_active_rejected() {
        let (agent, _network, _db) = agent_with(config()).await;
        agent.install().await.unwrap();
        agent.activate(false).await.unwrap();
        assert!(matches!(agent.install().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_activate_before_install_rejected() {
        let (agent, _network, _db) = agent_with(config()).await;
        assert!(matches!(agent.activate(false).await, Err(Error::InvalidState(_))));
        assert_eq!(agent.state().await, AgentState::Parsed);
    }

    #[tokio::test]
    async fn test_activate_deletes_other_versions() {
        let (agent, _network, db) = agent_with(config()).await;
        db.open_cache("devis-app-v0").await.unwrap();
        db.open_cache("devis-app-static-v0").await.unwrap();
        db.open_cache("devis-app-v1").await.unwrap();
        db.open_cache("unrelated").await.unwrap();

        agent.install().await.unwrap();
        let outcome = agent.activate(true).await.unwrap();

        let ActivationOutcome::Activated(report) = outcome else {
            panic!("expected activation");
        };
        assert_eq!(report.deleted.len(), 3);

        let mut names = db.keys().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["devis-app-static-v1".to_string(), "devis-app-v1".to_string()]);
        assert_eq!(agent.state().await, AgentState::Activated);
        assert!(agent.controls_clients());
    }

    #[tokio::test]
    async fn test_activation_waits_without_skip_waiting() {
        let config = AgentConfig { skip_waiting_on_install: false, ..config() };
        let (agent, _network, _db) = agent_with(config).await;
        let report = agent.install().await.unwrap();
        assert!(!report.skip_waiting);

        assert!(matches!(agent.activate(true).await.unwrap(), ActivationOutcome::Waiting));
        assert_eq!(agent.state().await, AgentState::Installed);
        assert!(!agent.controls_clients());

        assert!(matches!(agent.activate(false).await.unwrap(), ActivationOutcome::Activated(_)));
    }

    #[tokio::test]
    async fn test_skip_waiting_message_during_install() {
        let config = AgentConfig { skip_waiting_on_install: false, ..config() };
        let (agent, _network, _db) = agent_with(config).await;

        let (report, reply) = tokio::join!(agent.install(), async { agent.message("SKIP_WAITING") });
        assert!(report.is_ok());
        assert_eq!(reply, MessageOutcome::SkipWaiting);

        assert!(matches!(agent.activate(true).await.unwrap(), ActivationOutcome::Activated(_)));
    }

    #[tokio::test]
    async fn test_retired_agent_rejects_lifecycle_events() {
        let (agent, _network, _db) = agent_with(config()).await;
        agent.install().await.unwrap();
        agent.activate(false).await.unwrap();
        assert!(agent.controls_clients());

        agent.retire().await;
        assert_eq!(agent.state().await, AgentState::Redundant);
        assert!(!agent.controls_clients());
        assert!(agent.install().await.is_err());
        assert!(agent.activate(false).await.is_err());
    }

    #[test]
    fn test_asset_outcome_serialization() {
        let outcome = AssetOutcome { path: "/".into(), status: AssetStatus::Failed { reason: "status 404".into() } };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["path"], "/");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "status 404");
    }
}
