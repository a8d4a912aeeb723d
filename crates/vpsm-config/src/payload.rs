//! Request body for create and update calls.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{non_empty, ProxyLocation, ReverseProxyConfig};
use crate::ssl::SslSlot;

/// Exactly what is sent to the control plane when a configuration is saved.
///
/// Incomplete locations are gone, each SSL slot contributes at most one of
/// path/content (content wins), and server timestamps are never present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigPayload {
    pub id: String,
    pub server_name: String,
    pub listen_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_cert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_cert_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_key_content: Option<String>,
    pub is_active: bool,
    pub locations: Vec<ProxyLocation>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ConfigPayload {
    pub fn from_config(config: &ReverseProxyConfig) -> Self {
        let cert = SslSlot::from_parts(&config.ssl_cert, &config.ssl_cert_content);
        let key = SslSlot::from_parts(&config.ssl_key, &config.ssl_key_content);
        Self::assemble(config, &cert, &key)
    }

    /// Build from a record whose SSL fields are superseded by explicit slots.
    pub fn from_slots(config: &ReverseProxyConfig, cert: &SslSlot, key: &SslSlot) -> Self {
        Self::assemble(config, cert, key)
    }

    fn assemble(config: &ReverseProxyConfig, cert: &SslSlot, key: &SslSlot) -> Self {
        let (ssl_cert, ssl_cert_content) = cert.to_parts();
        let (ssl_key, ssl_key_content) = key.to_parts();

        Self {
            id: config.id.clone(),
            server_name: config.server_name.clone(),
            listen_port: config.listen_port,
            ssl_cert,
            ssl_key,
            ssl_cert_content,
            ssl_key_content,
            is_active: config.is_active,
            locations: config.submittable_locations().map(trimmed).collect(),
            extra: without_timestamps(&config.extra),
        }
    }

    pub fn has_ssl(&self) -> bool {
        non_empty(&self.ssl_cert).is_some()
            || non_empty(&self.ssl_key).is_some()
            || non_empty(&self.ssl_cert_content).is_some()
            || non_empty(&self.ssl_key_content).is_some()
    }
}

fn trimmed(location: &ProxyLocation) -> ProxyLocation {
    ProxyLocation {
        path: location.path.trim().to_string(),
        backend: location.backend.trim().to_string(),
        ..location.clone()
    }
}

fn without_timestamps(
    extra: &BTreeMap<String, serde_json::Value>,
) -> BTreeMap<String, serde_json::Value> {
    extra
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "created_at" | "updated_at"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
