//! Built-in configuration presets.

use serde::Serialize;

use crate::model::{ProxyLocation, ReverseProxyConfig};
use crate::ModelError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub listen_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_cert: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_key: Option<&'static str>,
    pub locations: Vec<ProxyLocation>,
}

impl Template {
    /// A fresh, active configuration with the template's port, SSL paths and
    /// locations. Id and server name are left for the user.
    pub fn to_config(&self) -> ReverseProxyConfig {
        ReverseProxyConfig {
            listen_port: self.listen_port,
            ssl_cert: self.ssl_cert.map(str::to_string),
            ssl_key: self.ssl_key.map(str::to_string),
            locations: self.locations.clone(),
            ..Default::default()
        }
    }

    pub fn has_websocket(&self) -> bool {
        self.locations.iter().any(|l| l.websocket)
    }

    pub fn has_ssl(&self) -> bool {
        self.ssl_cert.is_some()
    }
}

fn loc(path: &str, backend: &str) -> ProxyLocation {
    ProxyLocation::new(path, backend)
}

pub fn builtin() -> Vec<Template> {
    vec![
        Template {
            key: "web-app",
            name: "Web Application",
            description: "Standard web application with static files and API proxy",
            category: "Web",
            listen_port: 80,
            ssl_cert: None,
            ssl_key: None,
            locations: vec![loc("/", "127.0.0.1:3000"), loc("/api", "127.0.0.1:8080")],
        },
        Template {
            key: "spa",
            name: "Single Page Application",
            description: "Single page application with an API backend",
            category: "Web",
            listen_port: 80,
            ssl_cert: None,
            ssl_key: None,
            locations: vec![loc("/", "127.0.0.1:3000"), loc("/api", "127.0.0.1:8080")],
        },
        Template {
            key: "websocket",
            name: "WebSocket Application",
            description: "Real-time application with WebSocket support",
            category: "Real-time",
            listen_port: 80,
            ssl_cert: None,
            ssl_key: None,
            locations: vec![
                loc("/", "127.0.0.1:3000"),
                loc("/ws", "127.0.0.1:3001").with_websocket(true),
            ],
        },
        Template {
            key: "api-gateway",
            name: "API Gateway",
            description: "Microservices API gateway with multiple backends",
            category: "API",
            listen_port: 80,
            ssl_cert: None,
            ssl_key: None,
            locations: vec![
                loc("/auth", "127.0.0.1:8001"),
                loc("/users", "127.0.0.1:8002"),
                loc("/orders", "127.0.0.1:8003"),
            ],
        },
        Template {
            key: "ssl-app",
            name: "SSL/HTTPS Application",
            description: "Secure application with SSL termination",
            category: "Security",
            listen_port: 443,
            ssl_cert: Some("/etc/ssl/certs/app.crt"),
            ssl_key: Some("/etc/ssl/private/app.key"),
            locations: vec![loc("/", "127.0.0.1:3000")],
        },
        Template {
            key: "mobile-api",
            name: "Mobile API Backend",
            description: "API backend for mobile applications",
            category: "Mobile",
            listen_port: 80,
            ssl_cert: None,
            ssl_key: None,
            locations: vec![
                loc("/api/v1", "127.0.0.1:8080"),
                loc("/uploads", "127.0.0.1:8081"),
            ],
        },
    ]
}

pub fn find(key: &str) -> Result<Template, ModelError> {
    builtin()
        .into_iter()
        .find(|t| t.key == key)
        .ok_or_else(|| ModelError::UnknownTemplate(key.to_string()))
}
