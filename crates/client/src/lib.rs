//! Client side of the offline cache agent.
//!
//! This crate provides the network fetcher and the agent itself: request
//! routing, the two caching strategies, install/activate lifecycle and the
//! offline page.

pub mod agent;
pub mod fetch;

pub use agent::{
    ActivationOutcome, Agent, AgentEvent, AgentState, AssetOutcome, Disposition, EventOutcome, FetchOutcome,
    InstallObserver, InstallReport, MessageOutcome, OfflinePage, PassthroughReason, Strategy,
};

pub use fetch::{FetchClient, FetchConfig, Network};
