//! agent_install, agent_activate and agent_message tool implementations.

use offline_client::{ActivationOutcome, Agent, AgentEvent, EventOutcome, InstallReport, MessageOutcome};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Parameters for the agent_activate tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AgentActivateParams {
    /// Whether a previous agent version still controls open pages.
    #[serde(default)]
    pub previous_controls_clients: bool,
}

/// Parameters for the agent_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentMessageParams {
    /// Message payload posted by a page, e.g. "SKIP_WAITING".
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
struct MessageOutput {
    outcome: MessageOutcome,
    skip_waiting: bool,
}

pub async fn install_impl(agent: &Agent) -> Result<CallToolResult, McpError> {
    let report: InstallReport = match agent.dispatch(AgentEvent::Install).await? {
        EventOutcome::Installed(report) => report,
        other => return Err(unexpected(other)),
    };
    json_result(&report)
}

pub async fn activate_impl(agent: &Agent, params: AgentActivateParams) -> Result<CallToolResult, McpError> {
    let event = AgentEvent::Activate { previous_controls_clients: params.previous_controls_clients };
    let outcome: ActivationOutcome = match agent.dispatch(event).await? {
        EventOutcome::Activation(outcome) => outcome,
        other => return Err(unexpected(other)),
    };
    json_result(&outcome)
}

pub async fn message_impl(agent: &Agent, params: AgentMessageParams) -> Result<CallToolResult, McpError> {
    let outcome = match agent.dispatch(AgentEvent::Message(params.data)).await? {
        EventOutcome::Message(outcome) => outcome,
        other => return Err(unexpected(other)),
    };
    json_result(&MessageOutput { outcome, skip_waiting: agent.skip_waiting_requested() })
}

fn unexpected(outcome: EventOutcome) -> McpError {
    ToolError::OutputFailed(format!("unexpected event outcome: {outcome:?}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::result_json;
    use crate::tools::testing::fixture;
    use offline_core::CacheStorage;

    #[tokio::test]
    async fn test_install_reports_assets() {
        let fx = fixture().await;
        fx.network.set_online(true);

        let result = install_impl(&fx.agent).await.unwrap();
        let json = result_json(&result);
        assert_eq!(json["cache_name"], "devis-app-static-v1");
        assert_eq!(json["assets"].as_array().unwrap().len(), 2);
        assert_eq!(json["assets"][1]["status"], "cached");
        assert_eq!(json["skip_waiting"], true);
    }

    #[tokio::test]
    async fn test_activate_removes_old_stores() {
        let fx = fixture().await;
        fx.db.open_cache("devis-app-static-v0").await.unwrap();
        install_impl(&fx.agent).await.unwrap();

        let result = activate_impl(&fx.agent, AgentActivateParams::default()).await.unwrap();
        let json = result_json(&result);
        assert_eq!(json["outcome"], "activated");
        assert_eq!(json["deleted"][0], "devis-app-static-v0");
        assert_eq!(fx.db.keys().await.unwrap(), vec!["devis-app-static-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_before_install_fails() {
        let fx = fixture().await;
        let result = activate_impl(&fx.agent, AgentActivateParams::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_message_skip_waiting() {
        let fx = fixture().await;
        let result = message_impl(&fx.agent, AgentMessageParams { data: "SKIP_WAITING".into() })
            .await
            .unwrap();
        let json = result_json(&result);
        assert_eq!(json["outcome"], "skip_waiting");
        assert_eq!(json["skip_waiting"], true);

        let result = message_impl(&fx.agent, AgentMessageParams { data: "hello".into() })
            .await
            .unwrap();
        assert_eq!(result_json(&result)["outcome"], "ignored");
    }
}
