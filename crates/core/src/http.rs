//! Request and response types exchanged between the agent, its strategies,
//! the cache stores and the network.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// Request destination, as reported by the host (`Sec-Fetch-Dest` values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation.
    Document,
    Style,
    Script,
    Image,
    Font,
    Manifest,
    /// No destination (fetch/XHR).
    #[default]
    Empty,
    #[serde(other)]
    Other,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Document => "document",
            Destination::Style => "style",
            Destination::Script => "script",
            Destination::Image => "image",
            Destination::Font => "font",
            Destination::Manifest => "manifest",
            Destination::Empty => "empty",
            Destination::Other => "other",
        }
    }

    /// Stylesheets, scripts, images and fonts.
    pub fn is_static_asset(&self) -> bool {
        matches!(self, Destination::Style | Destination::Script | Destination::Image | Destination::Font)
    }
}

impl From<&str> for Destination {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "style" => Destination::Style,
            "script" => Destination::Script,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "manifest" => Destination::Manifest,
            "" | "empty" => Destination::Empty,
            _ => Destination::Other,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    /// Upper-cased HTTP method.
    pub method: String,
    pub url: Url,
    pub destination: Destination,
}

impl AgentRequest {
    pub fn new(method: &str, url: Url, destination: Destination) -> Self {
        Self { method: method.trim().to_ascii_uppercase(), url, destination }
    }

    pub fn get(url: Url, destination: Destination) -> Self {
        Self::new("GET", url, destination)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// URL used for request identity: the fragment never reaches the network,
    /// so it never distinguishes two entries either.
    pub fn cache_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}

impl fmt::Display for AgentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Where a response handed back to the host came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflinePage,
}

/// A response, either live from the network, read back from a store, or synthesized.
///
/// Cloning is cheap: the body is reference-counted, so a clone can be written
/// to a store while the original goes back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl AgentResponse {
    /// True for 2xx statuses; only those are ever written to a store.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
