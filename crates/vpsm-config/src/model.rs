//! Reverse-proxy configuration records as exchanged with the control plane.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::payload::ConfigPayload;

/// Id prefix the control plane reserves for port-forwarding entries.
pub const PORT_FORWARD_PREFIX: &str = "port-forward-";

/// One path-prefix-to-backend mapping inside a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyLocation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub backend: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub websocket: bool,
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub custom_headers: BTreeMap<String, String>,
}

impl Default for ProxyLocation {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            backend: String::new(),
            websocket: false,
            ssl_verify: true,
            custom_headers: BTreeMap::new(),
        }
    }
}

impl ProxyLocation {
    pub fn new(path: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            backend: backend.into(),
            ..Default::default()
        }
    }

    pub fn with_websocket(mut self, websocket: bool) -> Self {
        self.websocket = websocket;
        self
    }

    pub fn with_ssl_verify(mut self, ssl_verify: bool) -> Self {
        self.ssl_verify = ssl_verify;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    /// Both `path` and `backend` carry something other than whitespace.
    pub fn is_submittable(&self) -> bool {
        !self.path.trim().is_empty() && !self.backend.trim().is_empty()
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        BackendKind::classify(&self.backend)
    }
}

/// What a location's backend string points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Absolute URL such as `https://10.0.0.5:8443/app`.
    Url { scheme: String },
    /// `host:port` pair, optionally followed by a URI path as in
    /// `127.0.0.1:3000/api`.
    HostPort {
        host: String,
        port: u16,
        path: Option<String>,
    },
    /// Unix domain socket, `unix:/run/app.sock`.
    Unix(String),
    /// Bare name of an upstream pool defined on the server.
    Upstream(String),
}

impl BackendKind {
    /// Returns `None` for strings that are none of the accepted forms.
    pub fn classify(backend: &str) -> Option<Self> {
        let backend = backend.trim();
        if backend.is_empty() || backend.chars().any(char::is_whitespace) {
            return None;
        }

        if let Some((scheme, rest)) = backend.split_once("://") {
            let scheme = scheme.to_ascii_lowercase();
            if !matches!(scheme.as_str(), "http" | "https" | "ws" | "wss") || rest.is_empty() {
                return None;
            }
            return Some(BackendKind::Url { scheme });
        }

        if let Some(socket) = backend.strip_prefix("unix:") {
            return socket
                .starts_with('/')
                .then(|| BackendKind::Unix(socket.to_string()));
        }

        let (authority, path) = match backend.find('/') {
            Some(at) => (&backend[..at], Some(backend[at..].to_string())),
            None => (backend, None),
        };
        if let Some((host, port)) = authority.rsplit_once(':') {
            let port = port.parse::<u16>().ok().filter(|p| *p != 0)?;
            if host.is_empty() {
                return None;
            }
            return Some(BackendKind::HostPort {
                host: host.to_string(),
                port,
                path,
            });
        }
        if path.is_some() {
            return None;
        }

        let valid_name = backend
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        valid_name.then(|| BackendKind::Upstream(backend.to_string()))
    }

    pub fn is_https(&self) -> bool {
        matches!(self, BackendKind::Url { scheme } if scheme == "https" || scheme == "wss")
    }
}

/// Domain (virtual host) entries vs raw port-forwarding entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigMode {
    Domain,
    PortForward,
}

impl ConfigMode {
    /// Mode is a function of the record, recomputed on every call.
    pub fn infer(id: &str, server_name: &str) -> Self {
        if id.starts_with(PORT_FORWARD_PREFIX) || server_name.trim().is_empty() {
            ConfigMode::PortForward
        } else {
            ConfigMode::Domain
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfigMode::Domain => "domain",
            ConfigMode::PortForward => "port-forward",
        }
    }
}

/// A full reverse-proxy configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseProxyConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_name: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_cert_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_key_content: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locations: Vec<ProxyLocation>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    /// Server-side settings this client does not model (gzip, rate limits, ...).
    /// Carried through edits and duplicates untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for ReverseProxyConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            server_name: String::new(),
            listen_port: default_listen_port(),
            ssl_cert: None,
            ssl_key: None,
            ssl_cert_content: None,
            ssl_key_content: None,
            is_active: true,
            locations: vec![ProxyLocation::default()],
            created_at: None,
            updated_at: None,
            extra: BTreeMap::new(),
        }
    }
}

impl ReverseProxyConfig {
    pub fn mode(&self) -> ConfigMode {
        ConfigMode::infer(&self.id, &self.server_name)
    }

    /// Certificate material that would be submitted: inline content first, then path.
    pub fn effective_cert(&self) -> Option<&str> {
        non_empty(&self.ssl_cert_content).or_else(|| non_empty(&self.ssl_cert))
    }

    pub fn effective_key(&self) -> Option<&str> {
        non_empty(&self.ssl_key_content).or_else(|| non_empty(&self.ssl_key))
    }

    pub fn has_ssl(&self) -> bool {
        self.effective_cert().is_some() || self.effective_key().is_some()
    }

    pub fn submittable_locations(&self) -> impl Iterator<Item = &ProxyLocation> {
        self.locations.iter().filter(|l| l.is_submittable())
    }

    /// Copy suitable for re-creation under a new identity.
    ///
    /// `id` gains `_copy_<epoch_millis>`, `server_name` gains `_copy`, the copy
    /// starts inactive and carries no server timestamps.
    pub fn duplicate(&self, epoch_millis: i64) -> Self {
        Self {
            id: format!("{}_copy_{}", self.id, epoch_millis),
            server_name: format!("{}_copy", self.server_name),
            is_active: false,
            created_at: None,
            updated_at: None,
            ..self.clone()
        }
    }

    pub fn duplicate_now(&self) -> Self {
        self.duplicate(Utc::now().timestamp_millis())
    }

    pub fn to_payload(&self) -> ConfigPayload {
        ConfigPayload::from_config(self)
    }
}

/// Treat `Some("")` and `Some("   ")` the same as `None`.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Parse a server timestamp: RFC 3339 with offset, or a naive ISO-8601 value taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc()),
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => parse_timestamp(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_ssl_verify() -> bool {
    true
}

fn default_listen_port() -> u16 {
    80
}
