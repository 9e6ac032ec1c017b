//! Test fixtures: an agent over an in-memory store and a scripted network.

use std::sync::Arc;

use offline_client::Agent;
use offline_client::agent::testing::StubNetwork;
use offline_core::{AgentConfig, CacheDb};

pub const ORIGIN: &str = "https://devis.example.com";

pub struct Fixture {
    pub agent: Arc<Agent>,
    pub db: CacheDb,
    pub network: Arc<StubNetwork>,
}

pub async fn fixture() -> Fixture {
    let config = AgentConfig {
        origin: ORIGIN.into(),
        static_assets: vec!["/".into(), "/app/shared.css".into()],
        ..Default::default()
    };
    let db = CacheDb::open_in_memory().await.unwrap();
    let network = Arc::new(StubNetwork::new());
    network.serve(&format!("{ORIGIN}/"), 200, "text/html", "<h1>Devis</h1>");
    network.serve(&format!("{ORIGIN}/app/shared.css"), 200, "text/css", ".card{}");

    let agent = Arc::new(Agent::new(config, Arc::new(db.clone()), network.clone()).unwrap());
    Fixture { agent, db, network }
}

/// A fixture already installed and activated.
pub async fn active_fixture() -> Fixture {
    let fixture = fixture().await;
    fixture.agent.install().await.unwrap();
    fixture.agent.activate(false).await.unwrap();
    fixture
}
