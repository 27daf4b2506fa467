//! Browser-exported cookie files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One cookie as exported by common browser extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, rename = "httpOnly")]
    pub http_only: bool,
    /// Unix timestamp, seconds.
    #[serde(default, rename = "expirationDate", skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<f64>,
}

fn default_path() -> String {
    "/".to_string()
}

/// Load cookies from a JSON array file.
///
/// Entries without a string `name` and `value` are skipped. A missing or
/// malformed file gives an empty list and a warning.
pub fn load_cookies(path: &Path) -> Vec<Cookie> {
    if !path.exists() {
        warn!("Cookie file not found: {:?}", path);
        return Vec::new();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read cookie file {:?}: {}", path, e);
            return Vec::new();
        }
    };

    let entries: Vec<serde_json::Value> = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            let preview: String = content.chars().take(200).collect();
            warn!("Malformed cookie file {:?}: {} (starts with {:?})", path, e, preview);
            return Vec::new();
        }
    };

    let total = entries.len();
    let cookies: Vec<Cookie> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Cookie>(entry) {
            Ok(cookie) => Some(cookie),
            Err(e) => {
                debug!("Skipping cookie entry: {}", e);
                None
            }
        })
        .collect();

    info!("Loaded {} of {} cookies from {:?}", cookies.len(), total, path);
    cookies
}

/// Render cookies as a `Cookie` request header value.
pub fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Cookie value shortened for logs.
pub fn masked_value(cookie: &Cookie) -> String {
    let shown: String = cookie.value.chars().take(30).collect();
    if shown.len() < cookie.value.len() {
        format!("{}...", shown)
    } else {
        shown
    }
}
