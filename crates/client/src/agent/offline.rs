//! Offline fallback document.

use askama::Template;
use bytes::Bytes;
use offline_core::{AgentResponse, Error, ResponseSource};

pub const CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Template)]
#[template(path = "offline.html")]
struct OfflineTemplate<'a> {
    app_name: &'a str,
}

/// Renders the "no connection" page served to navigations that could not be
/// resolved from the network or any store.
#[derive(Debug, Clone)]
pub struct OfflinePage {
    html: String,
}

impl OfflinePage {
    /// Render the page once for `app_name`; the name is HTML-escaped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Render` if the template fails to render.
    pub fn new(app_name: &str) -> Result<Self, Error> {
        let html = OfflineTemplate { app_name }
            .render()
            .map_err(|e| Error::Render(format!("offline page: {e}")))?;
        Ok(Self { html })
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// A fresh 200 response carrying the page, addressed to `url`.
    pub fn render(&self, url: &str) -> AgentResponse {
        AgentResponse {
            url: url.to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), CONTENT_TYPE.to_string())],
            body: Bytes::from(self.html.clone()),
            source: ResponseSource::OfflinePage,
        }
    }
}
