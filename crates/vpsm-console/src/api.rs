//! HTTP client for the VPS manager control-plane API

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};
use vpsm_config::model::parse_timestamp;
use vpsm_config::{ConfigPayload, ReverseProxyConfig};

pub use crate::error::ApiError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Authenticated user as returned by `/api/auth/me` and login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Outcome of `POST /api/configs/{id}/test`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TestResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of the nginx and backup action endpoints. All fields are optional;
/// an empty body reads as the default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ActionResponse {
    /// Non-JSON bodies become the message verbatim.
    fn from_text(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::default();
        }
        serde_json::from_str(text).unwrap_or_else(|_| Self {
            message: Some(text.to_string()),
            ..Default::default()
        })
    }

    /// Best line to show the user.
    pub fn summary(&self, fallback: &str) -> String {
        self.message
            .clone()
            .or_else(|| self.output.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn failed(&self) -> bool {
        self.success == Some(false)
    }
}

/// Host and nginx status. Only the fields shown by the console are typed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub nginx_status: Option<String>,
    #[serde(default)]
    pub nginx_version: Option<String>,
    #[serde(default)]
    pub api_pid: Option<serde_json::Value>,
    #[serde(default)]
    pub uptime: Option<serde_json::Value>,
    #[serde(default)]
    pub load_average: Option<serde_json::Value>,
    #[serde(default)]
    pub cpu_usage: Option<f64>,
    #[serde(default)]
    pub memory_usage: Option<f64>,
    #[serde(default)]
    pub disk_usage: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SystemStatus {
    pub fn nginx_active(&self) -> bool {
        self.nginx_status.as_deref() == Some("active")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogType {
    #[default]
    Error,
    Access,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Error => "error",
            LogType::Access => "access",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NginxLogs {
    pub log_type: LogType,
    pub lines: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LogsResponse {
    #[serde(default)]
    logs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFile {
    pub filename: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub config_count: u64,
}

impl BackupFile {
    pub fn created(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at).ok()
    }
}

#[derive(Debug, Deserialize)]
struct BackupsResponse {
    #[serde(default)]
    backups: Vec<BackupFile>,
}

/// The list endpoint has answered both with a bare array and with a wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfigsResponse {
    Bare(Vec<ReverseProxyConfig>),
    Wrapped { configs: Vec<ReverseProxyConfig> },
}

/// One sample pushed by the live-metrics socket
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemMetrics {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub memory_usage: f64,
    #[serde(default)]
    pub disk_usage: f64,
    #[serde(default)]
    pub network_in: f64,
    #[serde(default)]
    pub network_out: f64,
    #[serde(default)]
    pub nginx_connections: u64,
    #[serde(default)]
    pub nginx_requests_per_second: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(default)]
    pub rule_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub metric: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// HTTP client for the control-plane API
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Create a new API client. A trailing slash on `base_url` is dropped.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builder for a protected endpoint. Fails before any I/O without a token.
    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.token().ok_or(ApiError::NotAuthenticated)?;
        Ok(self.client.request(method, self.url(path)).bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let resp = request.send().await.map_err(|e| {
            if e.is_connect() {
                ApiError::Connection(format!("Cannot connect to {}", self.base_url))
            } else {
                ApiError::Request(e)
            }
        })?;

        debug!(status = %resp.status(), url = %resp.url(), "api response");
        if !resp.status().is_success() {
            return self.handle_error(resp).await;
        }
        Ok(resp)
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, ApiError> {
        let resp = self.send(self.authorized(method, path)?).await?;
        parse_body(resp).await
    }

    /// For endpoints whose success body carries nothing the console uses.
    async fn call_discarding(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.send(request).await?;
        Ok(())
    }

    async fn action(&self, method: Method, path: &str) -> Result<ActionResponse, ApiError> {
        let resp = self.send(self.authorized(method, path)?).await?;
        Ok(ActionResponse::from_text(&resp.text().await?))
    }

    async fn handle_error<T>(&self, resp: Response) -> Result<T, ApiError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("token rejected by the API; clearing it");
            self.set_token(None);
            return Err(ApiError::Unauthorized);
        }

        let text = resp.text().await.unwrap_or_default();
        Err(ApiError::Server {
            status: status.as_u16(),
            message: error_message(&text)
                .unwrap_or_else(|| format!("Request failed with status {status}")),
        })
    }

    /// Log in. Stores the returned token on this client.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&LoginRequest { username, password });
        let login: LoginResponse = parse_body(self.send(request).await?).await?;
        self.set_token(Some(login.token.clone()));
        Ok(login)
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.call(Method::GET, "/api/auth/me").await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.call_discarding(self.authorized(Method::POST, "/api/auth/logout")?)
            .await
    }

    pub async fn list_configs(&self) -> Result<Vec<ReverseProxyConfig>, ApiError> {
        let body: ConfigsResponse = self.call(Method::GET, "/api/configs").await?;
        Ok(match body {
            ConfigsResponse::Bare(configs) | ConfigsResponse::Wrapped { configs } => configs,
        })
    }

    pub async fn get_config(&self, id: &str) -> Result<ReverseProxyConfig, ApiError> {
        self.call(Method::GET, &config_path(id, "")).await
    }

    pub async fn create_config(&self, payload: &ConfigPayload) -> Result<(), ApiError> {
        debug!(id = %payload.id, locations = payload.locations.len(), "creating config");
        let request = self.authorized(Method::POST, "/api/configs")?.json(payload);
        self.call_discarding(request).await
    }

    pub async fn update_config(&self, id: &str, payload: &ConfigPayload) -> Result<(), ApiError> {
        debug!(%id, locations = payload.locations.len(), "updating config");
        let request = self
            .authorized(Method::PUT, &config_path(id, ""))?
            .json(payload);
        self.call_discarding(request).await
    }

    pub async fn delete_config(&self, id: &str) -> Result<(), ApiError> {
        self.call_discarding(self.authorized(Method::DELETE, &config_path(id, ""))?)
            .await
    }

    pub async fn toggle_config(&self, id: &str) -> Result<(), ApiError> {
        self.call_discarding(self.authorized(Method::POST, &config_path(id, "/toggle"))?)
            .await
    }

    pub async fn test_config(&self, id: &str) -> Result<TestResult, ApiError> {
        self.call(Method::POST, &config_path(id, "/test")).await
    }

    pub async fn system_status(&self) -> Result<SystemStatus, ApiError> {
        self.call(Method::GET, "/api/system/status").await
    }

    pub async fn restart_nginx(&self) -> Result<ActionResponse, ApiError> {
        self.action(Method::POST, "/api/system/nginx/restart").await
    }

    pub async fn reload_nginx(&self) -> Result<ActionResponse, ApiError> {
        self.action(Method::POST, "/api/system/nginx/reload").await
    }

    pub async fn test_nginx(&self) -> Result<ActionResponse, ApiError> {
        self.action(Method::POST, "/api/system/nginx/test").await
    }

    pub async fn nginx_logs(&self, log_type: LogType) -> Result<NginxLogs, ApiError> {
        let path = format!("/api/system/nginx/logs?log_type={}", log_type.as_str());
        let body: LogsResponse = self.call(Method::GET, &path).await?;
        Ok(NginxLogs {
            log_type,
            lines: body.logs,
        })
    }

    pub async fn list_backups(&self) -> Result<Vec<BackupFile>, ApiError> {
        let body: BackupsResponse = self.call(Method::GET, "/api/backup/list").await?;
        Ok(body.backups)
    }

    pub async fn create_backup(&self) -> Result<ActionResponse, ApiError> {
        self.action(Method::POST, "/api/backup/create").await
    }

    pub async fn restore_backup(&self, filename: &str) -> Result<ActionResponse, ApiError> {
        self.action(Method::POST, &backup_path("restore", filename))
            .await
    }

    pub async fn delete_backup(&self, filename: &str) -> Result<ActionResponse, ApiError> {
        self.action(Method::DELETE, &backup_path("delete", filename))
            .await
    }

    pub async fn download_backup(&self, filename: &str) -> Result<Bytes, ApiError> {
        let request = self.authorized(Method::GET, &backup_path("download", filename))?;
        let resp = self.send(request).await?;
        Ok(resp.bytes().await?)
    }
}

fn config_path(id: &str, suffix: &str) -> String {
    format!("/api/configs/{}{suffix}", urlencoding::encode(id))
}

fn backup_path(action: &str, filename: &str) -> String {
    format!("/api/backup/{action}/{}", urlencoding::encode(filename))
}

async fn parse_body<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Pull a human-readable message out of an error body: `detail` (string, or a
/// list of `{msg}` validation entries) first, then `message`.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail") {
        Some(serde_json::Value::String(detail)) => return Some(detail.clone()),
        Some(serde_json::Value::Array(entries)) => {
            let msgs: Vec<&str> = entries
                .iter()
                .filter_map(|e| e.get("msg").and_then(|m| m.as_str()))
                .collect();
            if !msgs.is_empty() {
                return Some(msgs.join("; "));
            }
        }
        _ => {}
    }
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_sources() {
        assert_eq!(
            error_message(r#"{"detail": "Config already exists"}"#).as_deref(),
            Some("Config already exists")
        );
        assert_eq!(
            error_message(r#"{"detail": [{"msg": "field required"}, {"msg": "bad port"}]}"#)
                .as_deref(),
            Some("field required; bad port")
        );
        assert_eq!(
            error_message(r#"{"message": "nginx -t failed"}"#).as_deref(),
            Some("nginx -t failed")
        );
        assert_eq!(error_message("<html>502</html>"), None);
    }

    #[test]
    fn test_action_response_from_text() {
        assert_eq!(ActionResponse::from_text("  "), ActionResponse::default());
        let plain = ActionResponse::from_text("reloaded");
        assert_eq!(plain.summary("done"), "reloaded");
        let json = ActionResponse::from_text(r#"{"success": false, "message": "test failed"}"#);
        assert!(json.failed());
        assert_eq!(json.summary("done"), "test failed");
        assert_eq!(ActionResponse::default().summary("done"), "done");
    }

    #[test]
    fn test_paths_are_percent_encoded() {
        assert_eq!(config_path("example-com", "/toggle"), "/api/configs/example-com/toggle");
        assert_eq!(config_path("a/b c", ""), "/api/configs/a%2Fb%20c");
        assert_eq!(
            backup_path("download", "backup 1.tar.gz"),
            "/api/backup/download/backup%201.tar.gz"
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert!(!client.has_token());
    }

    #[test]
    fn test_configs_response_shapes() {
        let bare: ConfigsResponse = serde_json::from_str(r#"[{"id": "a"}]"#).unwrap();
        let wrapped: ConfigsResponse =
            serde_json::from_str(r#"{"configs": [{"id": "a"}, {"id": "b"}]}"#).unwrap();
        assert!(matches!(bare, ConfigsResponse::Bare(c) if c.len() == 1));
        assert!(matches!(wrapped, ConfigsResponse::Wrapped { configs } if configs.len() == 2));
    }

    #[tokio::test]
    async fn test_protected_call_without_token_fails_fast() {
        // Nothing listens on this port; a network attempt would fail differently.
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = client.list_configs().await.unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
    }

    mod integration_tests {
        use super::*;
        use serde_json::json;
        use wiremock::matchers::{body_json, header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        async fn client_for(server: &MockServer) -> ApiClient {
            let client = ApiClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
            client.set_token(Some("secret".to_string()));
            client
        }

        #[tokio::test]
        async fn test_list_configs_sends_bearer_token() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/configs"))
                .and(header("Authorization", "Bearer secret"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    {
                        "id": "example-com",
                        "server_name": "example.com",
                        "listen_port": 80,
                        "is_active": true,
                        "locations": [{"path": "/", "backend": "127.0.0.1:3000"}]
                    }
                ])))
                .expect(1)
                .mount(&server)
                .await;

            let configs = client_for(&server).await.list_configs().await.unwrap();
            assert_eq!(configs.len(), 1);
            assert_eq!(configs[0].id, "example-com");
        }

        #[tokio::test]
        async fn test_login_stores_token() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/auth/login"))
                .and(body_json(json!({"username": "admin", "password": "pw"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "token": "fresh",
                    "user": {"id": "1", "username": "admin", "email": "a@b.c", "role": "admin"}
                })))
                .mount(&server)
                .await;

            let client = ApiClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
            let login = client.login("admin", "pw").await.unwrap();
            assert_eq!(login.user.username, "admin");
            assert_eq!(client.token().as_deref(), Some("fresh"));
        }

        #[tokio::test]
        async fn test_server_error_uses_detail() {
            let server = MockServer::start().await;
            Mock::given(method("DELETE"))
                .and(path("/api/configs/missing"))
                .respond_with(
                    ResponseTemplate::new(404).set_body_json(json!({"detail": "Config not found"})),
                )
                .mount(&server)
                .await;

            let err = client_for(&server)
                .await
                .delete_config("missing")
                .await
                .unwrap_err();
            match err {
                ApiError::Server { status, message } => {
                    assert_eq!(status, 404);
                    assert_eq!(message, "Config not found");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_unauthorized_clears_token() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/system/status"))
                .respond_with(ResponseTemplate::new(401))
                .expect(1)
                .mount(&server)
                .await;

            let client = client_for(&server).await;
            assert!(matches!(
                client.system_status().await,
                Err(ApiError::Unauthorized)
            ));
            assert!(!client.has_token());
            // Second call never reaches the server.
            assert!(matches!(
                client.system_status().await,
                Err(ApiError::NotAuthenticated)
            ));
        }

        #[tokio::test]
        async fn test_empty_action_body() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/configs/example-com/toggle"))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;

            client_for(&server)
                .await
                .toggle_config("example-com")
                .await
                .unwrap();
        }

        #[tokio::test]
        async fn test_logs_and_backups() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/system/nginx/logs"))
                .and(query_param("log_type", "access"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({"logs": ["GET /", "GET /api"]})),
                )
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/api/backup/list"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "backups": [{
                        "filename": "backup_20240301.json",
                        "created_at": "2024-03-01T10:00:00",
                        "size": 2048,
                        "config_count": 3
                    }]
                })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/api/backup/download/backup_20240301.json"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"[]".to_vec()))
                .mount(&server)
                .await;

            let client = client_for(&server).await;
            let logs = client.nginx_logs(LogType::Access).await.unwrap();
            assert_eq!(logs.lines.len(), 2);

            let backups = client.list_backups().await.unwrap();
            assert_eq!(backups[0].config_count, 3);
            assert!(backups[0].created().is_some());

            let bytes = client
                .download_backup("backup_20240301.json")
                .await
                .unwrap();
            assert_eq!(&bytes[..], b"[]");
        }

        #[tokio::test]
        async fn test_test_config_result() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/configs/example-com/test"))
                .respond_with(ResponseTemplate::new(200).set_body_json(
                    json!({"success": false, "error": "nginx: [emerg] unknown directive"}),
                ))
                .mount(&server)
                .await;

            let result = client_for(&server)
                .await
                .test_config("example-com")
                .await
                .unwrap();
            assert!(!result.success);
            assert!(result.error.unwrap().contains("emerg"));
        }
    }
}
