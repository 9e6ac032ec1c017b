//! Scripted network for agent tests.
//!
//! Compiled for this crate's tests and, through the `testing` feature, for
//! downstream crates that drive an `Agent` without real sockets.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use offline_core::{AgentRequest, AgentResponse, Error, ResponseSource};

use crate::fetch::Network;

/// Serves canned responses by URL; unknown URLs get a 404. Switch it offline
/// to make every fetch fail at the transport level.
pub struct StubNetwork {
    routes: Mutex<HashMap<String, (u16, String, Bytes)>>,
    online: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self { routes: Mutex::new(HashMap::new()), online: AtomicBool::new(true), calls: Mutex::new(Vec::new()) }
    }

    /// Answer `url` with `status` and `body` from now on.
    pub fn serve(&self, url: &str, status: u16, content_type: &str, body: &str) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            (status, content_type.to_string(), Bytes::from(body.to_string())),
        );
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of fetches attempted, online or not.
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }
}

impl Default for StubNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &AgentRequest) -> Result<AgentResponse, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{url}: network unreachable")));
        }

        let (status, content_type, body) = self
            .routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or((404, "text/plain".to_string(), Bytes::from_static(b"not found")));

        Ok(AgentResponse {
            url,
            status,
            headers: vec![("content-type".to_string(), content_type)],
            body,
            source: ResponseSource::Network,
        })
    }
}
