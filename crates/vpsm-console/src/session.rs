//! Authentication context: the current token and user, persisted between runs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, User};
use crate::error::ApiError;

/// Token file on disk. Reads and writes go through `tokio::fs`.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or blank file means no token.
    pub async fn load(&self) -> std::io::Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn save(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, token).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        Ok(())
    }

    pub async fn clear(&self) -> std::io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Session state shared by every command. The client holds the in-memory
/// token; the store holds the persisted copy.
pub struct Session {
    api: Arc<ApiClient>,
    store: Option<TokenStore>,
    user: Option<User>,
}

impl Session {
    /// `store` is `None` when no config directory is available; the session
    /// then lives only as long as the process.
    pub fn new(api: Arc<ApiClient>, store: Option<TokenStore>) -> Self {
        Self {
            api,
            store,
            user: None,
        }
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.has_token()
    }

    /// Restore a persisted session. A token the server no longer accepts is
    /// dropped; any other failure leaves the session unauthenticated.
    pub async fn initialize(&mut self) -> Result<Option<&User>, ApiError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let token = match store.load().await {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(path = %store.path().display(), error = %e, "cannot read token file");
                return Ok(None);
            }
        };

        self.api.set_token(Some(token));
        match self.api.current_user().await {
            Ok(user) => {
                debug!(username = %user.username, "session restored");
                self.user = Some(user);
                Ok(self.user.as_ref())
            }
            Err(e) if e.is_auth() => {
                self.invalidate().await;
                Ok(None)
            }
            Err(e) => {
                self.api.set_token(None);
                self.user = None;
                Err(e)
            }
        }
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<&User, ApiError> {
        let response = self.api.login(username, password).await?;
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&response.token).await {
                warn!(path = %store.path().display(), error = %e, "cannot persist token");
            }
        }
        info!(username = %response.user.username, "logged in");
        Ok(self.user.insert(response.user))
    }

    /// Tell the server, then forget the session whatever it answered.
    pub async fn logout(&mut self) {
        if self.api.has_token() {
            if let Err(e) = self.api.logout().await {
                debug!(error = %e, "logout request failed");
            }
        }
        self.invalidate().await;
        info!("logged out");
    }

    /// Drop the token everywhere after the server rejected it.
    pub async fn invalidate(&mut self) {
        self.api.set_token(None);
        self.user = None;
        if let Some(store) = &self.store {
            if let Err(e) = store.clear().await {
                warn!(path = %store.path().display(), error = %e, "cannot remove token file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_json() -> serde_json::Value {
        json!({"id": "1", "username": "admin", "email": "admin@example.com", "role": "admin"})
    }

    async fn session(server: &MockServer, dir: &TempDir) -> Session {
        let api = Arc::new(ApiClient::new(&server.uri(), Duration::from_secs(5)).unwrap());
        Session::new(api, Some(TokenStore::new(dir.path().join("vpsm/token"))))
    }

    #[tokio::test]
    async fn test_token_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("nested/token"));
        assert_eq!(store.load().await.unwrap(), None);

        store.save("abc123").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("abc123"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_token_file_is_no_token() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("token"));
        std::fs::write(store.path(), "  \n").unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_persists_and_initialize_restores() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"token": "t0k", "user": user_json()})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .and(header("authorization", "Bearer t0k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .expect(1)
            .mount(&server)
            .await;

        let mut first = session(&server, &dir).await;
        let user = first.login("admin", "secret").await.unwrap();
        assert_eq!(user.username, "admin");
        assert!(first.is_authenticated());

        let mut second = session(&server, &dir).await;
        assert!(!second.is_authenticated());
        let restored = second.initialize().await.unwrap();
        assert_eq!(restored.map(|u| u.role.as_str()), Some("admin"));
        assert!(second.is_authenticated());
    }

    #[tokio::test]
    async fn test_initialize_with_rejected_token_clears_it() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
            .mount(&server)
            .await;

        let store = TokenStore::new(dir.path().join("vpsm/token"));
        store.save("stale").await.unwrap();

        let mut session = session(&server, &dir).await;
        assert!(session.initialize().await.unwrap().is_none());
        assert!(!session.is_authenticated());
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("POST"))
            .and(path("/api/auth/logout"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let store = TokenStore::new(dir.path().join("vpsm/token"));
        store.save("t0k").await.unwrap();
        let mut session = session(&server, &dir).await;
        session.api().set_token(Some("t0k".into()));

        session.logout().await;
        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_initialize_without_token_makes_no_request() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut session = session(&server, &dir).await;
        assert!(session.initialize().await.unwrap().is_none());
    }
}
