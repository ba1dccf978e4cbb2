//! Audit event shipping to OpenObserve.
//!
//! Mutating handlers record what changed and who changed it. Events are
//! posted to the `_json` ingestion endpoint in the background so the
//! request path never blocks on the log sink.

use base64::Engine;
use serde_json::{json, Value};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
}

impl RequestInfo {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }
}

#[derive(Clone)]
pub struct EventLogger {
    client: reqwest::Client,
    url: String,
    auth_header: String,
}

impl EventLogger {
    pub fn new(config: &AppConfig) -> Self {
        let credentials = format!(
            "{}:{}",
            config.openobserve_username, config.openobserve_password
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        Self {
            client: reqwest::Client::new(),
            url: config.openobserve_ingest_url(),
            auth_header: format!("Basic {}", encoded),
        }
    }

    /// Ship one audit event. Fire and forget; a failed send is logged and
    /// dropped rather than failing the request that produced it.
    pub fn log(&self, executive_id: i32, request: &RequestInfo, mut event: Value) {
        if let Value::Object(ref mut fields) = event {
            fields.insert("_method".into(), json!(request.method));
            fields.insert("_path".into(), json!(request.path));
            fields.insert("_executive_id".into(), json!(executive_id));
        }
        let client = self.client.clone();
        let url = self.url.clone();
        let auth = self.auth_header.clone();
        tokio::spawn(async move {
            let result = client
                .post(&url)
                .header("Authorization", auth)
                .json(&json!([event]))
                .send()
                .await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!("event ingestion rejected: {}", response.status());
                }
                Err(err) => tracing::warn!("event ingestion failed: {}", err),
                _ => {}
            }
        });
    }
}
