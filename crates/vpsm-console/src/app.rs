//! Configuration list state and actions

use std::time::{Duration, Instant};
use tracing::{info, warn};
use vpsm_config::{templates, ReverseProxyConfig};

use crate::api::TestResult;
use crate::error::ConsoleError;
use crate::form::ConfigForm;
use crate::store::ConfigStore;

/// How long a status message stays visible
pub const STATUS_TTL: Duration = Duration::from_secs(5);

/// Status message level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl StatusLevel {
    pub fn label(&self) -> &'static str {
        match self {
            StatusLevel::Info => "info",
            StatusLevel::Success => "ok",
            StatusLevel::Warning => "warning",
            StatusLevel::Error => "error",
        }
    }
}

/// List controller. The configuration list is owned by the store; `configs`
/// is only ever replaced wholesale by [`App::refresh`].
pub struct App<S: ConfigStore> {
    store: S,
    pub configs: Vec<ReverseProxyConfig>,
    pub status_message: Option<(String, StatusLevel, Instant)>,
    pub is_loading: bool,
    /// Set after the API rejected the token; the caller should drop the
    /// persisted session.
    pub session_expired: bool,
}

impl<S: ConfigStore> App<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            configs: Vec::new(),
            status_message: None,
            is_loading: false,
            session_expired: false,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Set status message
    pub fn set_status(&mut self, message: impl Into<String>, level: StatusLevel) {
        self.status_message = Some((message.into(), level, Instant::now()));
    }

    /// Clear status if expired
    pub fn clear_expired_status(&mut self) {
        if let Some((_, _, time)) = &self.status_message {
            if time.elapsed() > STATUS_TTL {
                self.status_message = None;
            }
        }
    }

    /// Current status, if it has not expired.
    pub fn status(&self) -> Option<(&str, StatusLevel)> {
        self.status_message
            .as_ref()
            .filter(|(_, _, time)| time.elapsed() <= STATUS_TTL)
            .map(|(message, level, _)| (message.as_str(), *level))
    }

    pub fn find(&self, id: &str) -> Option<&ReverseProxyConfig> {
        self.configs.iter().find(|c| c.id == id)
    }

    fn fail(&mut self, context: &str, err: ConsoleError) -> ConsoleError {
        if err.is_auth() {
            self.session_expired = true;
            self.set_status("Session expired; log in again", StatusLevel::Error);
        } else {
            self.set_status(format!("{context}: {err}"), StatusLevel::Error);
        }
        warn!(%err, "{context}");
        err
    }

    /// Refetch the configuration list.
    pub async fn refresh(&mut self) -> Result<(), ConsoleError> {
        self.is_loading = true;
        let result = self.store.list().await;
        self.is_loading = false;

        match result {
            Ok(configs) => {
                self.configs = configs;
                Ok(())
            }
            Err(e) => Err(self.fail("Failed to load configurations", e.into())),
        }
    }

    /// Refresh after a successful action; a refresh failure is reported in
    /// the status line but does not undo the action's success.
    async fn refresh_after(&mut self, message: String) {
        self.set_status(message, StatusLevel::Success);
        // On failure `refresh` has already replaced the status.
        let _ = self.refresh().await;
    }

    /// Flip the active flag on the server, then refetch.
    pub async fn toggle(&mut self, id: &str) -> Result<(), ConsoleError> {
        let was_active = self.find(id).map(|c| c.is_active);
        if let Err(e) = self.store.toggle(id).await {
            return Err(self.fail("Failed to toggle configuration", e.into()));
        }
        let action = match was_active {
            Some(true) => "deactivated",
            Some(false) => "activated",
            None => "toggled",
        };
        info!(%id, action, "configuration toggled");
        self.refresh_after(format!("Configuration {id} {action}")).await;
        Ok(())
    }

    pub async fn delete(&mut self, id: &str) -> Result<(), ConsoleError> {
        if let Err(e) = self.store.delete(id).await {
            return Err(self.fail("Failed to delete configuration", e.into()));
        }
        info!(%id, "configuration deleted");
        self.refresh_after(format!("Deleted configuration {id}")).await;
        Ok(())
    }

    /// Create an inactive copy of a configuration under a new id. The copy is
    /// seeded from the full record, not the cached list entry.
    pub async fn duplicate(&mut self, id: &str) -> Result<String, ConsoleError> {
        let source = match self.store.get(id).await {
            Ok(source) => source,
            Err(e) => return Err(self.fail("Failed to duplicate configuration", e.into())),
        };
        let copy = source.duplicate_now();
        let new_id = copy.id.clone();

        if let Err(e) = self.store.create(&copy.to_payload()).await {
            return Err(self.fail("Failed to duplicate configuration", e.into()));
        }
        info!(%id, %new_id, "configuration duplicated");
        self.refresh_after(format!("Duplicated {id} as {new_id}")).await;
        Ok(new_id)
    }

    /// Ask the server to test a configuration. No refresh.
    pub async fn test(&mut self, id: &str) -> Result<TestResult, ConsoleError> {
        match self.store.test(id).await {
            Ok(result) => {
                if result.success {
                    self.set_status(format!("Configuration {id} is valid"), StatusLevel::Success);
                } else {
                    let reason = result.error.as_deref().unwrap_or("unknown error");
                    self.set_status(
                        format!("Configuration {id} failed the test: {reason}"),
                        StatusLevel::Warning,
                    );
                }
                Ok(result)
            }
            Err(e) => Err(self.fail("Failed to test configuration", e.into())),
        }
    }

    pub fn open_create(&self) -> ConfigForm {
        ConfigForm::new()
    }

    pub fn open_template(&mut self, key: &str) -> Result<ConfigForm, ConsoleError> {
        match templates::find(key) {
            Ok(template) => Ok(ConfigForm::from_template(&template)),
            Err(e) => Err(self.fail("Failed to open template", e.into())),
        }
    }

    /// Fetch the full record and open it for editing.
    pub async fn open_edit(&mut self, id: &str) -> Result<ConfigForm, ConsoleError> {
        match self.store.get(id).await {
            Ok(config) => Ok(ConfigForm::edit(&config)),
            Err(e) => Err(self.fail("Failed to load configuration", e.into())),
        }
    }

    /// Submit a form, then refetch on success.
    pub async fn submit(&mut self, form: &ConfigForm) -> Result<(), ConsoleError> {
        match form.submit(&self.store).await {
            Ok(payload) => {
                self.refresh_after(format!("Saved configuration {}", payload.id))
                    .await;
                Ok(())
            }
            Err(e) => Err(self.fail("Failed to save configuration", e)),
        }
    }
}
