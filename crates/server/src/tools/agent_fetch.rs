//! agent_fetch tool implementation.
//!
//! Delivers an intercepted request to the agent and reports whether it was
//! passed through or answered, and with what.

use offline_client::fetch::canonicalize;
use offline_client::{Agent, AgentEvent, Disposition, EventOutcome, FetchOutcome, PassthroughReason, Strategy};
use offline_core::{AgentRequest, Destination, ResponseSource};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for agent_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchParams {
    /// Absolute URL of the request.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination: "document", "style", "script", "image", "font",
    /// "manifest" or empty.
    #[serde(default)]
    pub destination: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for agent_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentFetchOutput {
    /// The request URL after canonicalization.
    pub url: String,
    pub disposition: Disposition,
    /// Why the request was passed through.
    pub reason: Option<PassthroughReason>,
    /// Strategy that answered the request.
    pub strategy: Option<Strategy>,
    /// Where the response came from: network, cache or offline_page.
    pub source: Option<ResponseSource>,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    /// Response body as text (lossy UTF-8).
    pub body: Option<String>,
}

/// Implementation of the agent_fetch tool.
pub async fn fetch_impl(agent: &Agent, params: AgentFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(ToolError::InvalidInput("method cannot be empty".into()).into());
    }

    let url = canonicalize(&params.url).map_err(|e| ToolError::InvalidInput(format!("{}: {}", params.url, e)))?;
    let request = AgentRequest::new(&params.method, url, Destination::from(params.destination.as_str()));
    let url = request.url.to_string();

    let outcome = match agent.dispatch(AgentEvent::Fetch(request)).await? {
        EventOutcome::Fetch(outcome) => outcome,
        other => {
            return Err(ToolError::OutputFailed(format!("unexpected event outcome: {other:?}")).into());
        }
    };

    json_result(&to_output(url, &outcome))
}

fn to_output(url: String, outcome: &FetchOutcome) -> AgentFetchOutput {
    let mut output = AgentFetchOutput {
        url,
        disposition: outcome.disposition(),
        reason: None,
        strategy: None,
        source: None,
        status: None,
        content_type: None,
        body: None,
    };

    match outcome {
        FetchOutcome::Passthrough(reason) => {
            output.reason = Some(*reason);
        }
        FetchOutcome::Respond { strategy, response } => {
            output.strategy = Some(*strategy);
            output.source = Some(response.source);
            output.status = Some(response.status);
            output.content_type = response.content_type().map(str::to_string);
            output.body = Some(response.text().into_owned());
        }
    }

    output
}
