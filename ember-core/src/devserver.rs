//! Dev-server update notifications.
//!
//! The dev server pushes one of these over its live-reload connection after
//! a rebuild. The client decides how to apply it; once new markup or modules
//! are in place, the mounted render effects do the re-rendering.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A classified rebuild notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UpdateNotification {
    /// A stylesheet changed and can be swapped in place.
    CssUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// A client module changed.
    JsUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// Server code changed; routes render new markup after restart.
    ServerUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// Anything that cannot be patched.
    FullReload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
}

impl UpdateNotification {
    /// Classify a changed file by its extension.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let display = Some(path.to_string_lossy().into_owned());
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("css") => Self::CssUpdate { path: display },
            Some("js" | "mjs" | "ts" | "wasm") => Self::JsUpdate { path: display },
            Some("rs") => Self::ServerUpdate { path: display },
            _ => Self::FullReload { path: display },
        }
    }

    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Self::CssUpdate { path }
            | Self::JsUpdate { path }
            | Self::ServerUpdate { path }
            | Self::FullReload { path } => path.as_deref(),
        }
    }

    /// Whether the page has to reload to pick the change up.
    pub fn requires_reload(&self) -> bool {
        matches!(self, Self::FullReload { .. } | Self::ServerUpdate { .. })
    }
}
