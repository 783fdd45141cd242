// src/reload/mod.rs

//! Reload signal: tells connected browsers to refresh after a rebuild.
//!
//! - [`registry`] holds the connected clients.
//! - [`server`] accepts browser connections (an SSE stream plus the client
//!   script) and tunnels every other request to the upstream site.
//! - [`upstream`] parses `project_url`.

use serde::Serialize;

pub mod registry;
pub mod server;
pub mod upstream;

pub use registry::{ClientId, ClientRegistry};
pub use server::ReloadServer;
pub use upstream::{Upstream, UpstreamError};

/// What connected browsers should do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    /// Reload the page.
    Reload,
    /// Re-fetch these stylesheets in place (paths relative to the theme root).
    Inject { paths: Vec<String> },
}

impl ReloadMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            ReloadMessage::Reload => "reload",
            ReloadMessage::Inject { .. } => "inject",
        }
    }

    /// Encode as one Server-Sent-Events frame.
    pub fn to_sse(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("event: {}\ndata: {}\n\n", self.event_name(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_frames() {
        assert_eq!(
            ReloadMessage::Reload.to_sse(),
            "event: reload\ndata: {\"type\":\"reload\"}\n\n"
        );
        let inject = ReloadMessage::Inject {
            paths: vec!["style.css".into()],
        };
        assert_eq!(
            inject.to_sse(),
            "event: inject\ndata: {\"type\":\"inject\",\"paths\":[\"style.css\"]}\n\n"
        );
    }
}
