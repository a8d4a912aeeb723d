//! In-memory [`ConfigStore`] for controller tests.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::Notify;
use vpsm_config::{ConfigPayload, ReverseProxyConfig};

use crate::api::TestResult;
use crate::error::ApiError;
use crate::store::ConfigStore;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    List,
    Get(String),
    Create(ConfigPayload),
    Update(String, ConfigPayload),
    Delete(String),
    Toggle(String),
    Test(String),
}

/// Behaves like the server: toggles, deletes and creates change the stored
/// list, which callers only see through `list`/`get`.
#[derive(Default)]
pub struct MockStore {
    calls: Mutex<Vec<StoreCall>>,
    configs: Mutex<Vec<ReverseProxyConfig>>,
    next_failure: Mutex<Option<ApiError>>,
    gate: Option<Notify>,
}

impl MockStore {
    pub fn with_configs(configs: Vec<ReverseProxyConfig>) -> Self {
        Self {
            configs: Mutex::new(configs),
            ..Default::default()
        }
    }

    /// The next call fails with `err`; later calls succeed.
    pub fn failing(err: ApiError) -> Self {
        Self {
            next_failure: Mutex::new(Some(err)),
            ..Default::default()
        }
    }

    pub fn fail_next(&self, err: ApiError) {
        *self.next_failure.lock().unwrap() = Some(err);
    }

    /// Create and update block until [`MockStore::release`].
    pub fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Default::default()
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: StoreCall) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        match self.next_failure.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }

    fn find(&self, id: &str) -> Result<ReverseProxyConfig, ApiError> {
        self.configs
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(ApiError::Server {
                status: 404,
                message: "Config not found".to_string(),
            })
    }
}

fn to_record(payload: &ConfigPayload) -> ReverseProxyConfig {
    serde_json::to_value(payload)
        .and_then(serde_json::from_value)
        .unwrap()
}

#[async_trait]
impl ConfigStore for MockStore {
    async fn list(&self) -> Result<Vec<ReverseProxyConfig>, ApiError> {
        self.record(StoreCall::List)?;
        Ok(self.configs.lock().unwrap().clone())
    }

    async fn get(&self, id: &str) -> Result<ReverseProxyConfig, ApiError> {
        self.record(StoreCall::Get(id.to_string()))?;
        self.find(id)
    }

    async fn create(&self, payload: &ConfigPayload) -> Result<(), ApiError> {
        self.record(StoreCall::Create(payload.clone()))?;
        self.wait_gate().await;
        self.configs.lock().unwrap().push(to_record(payload));
        Ok(())
    }

    async fn update(&self, id: &str, payload: &ConfigPayload) -> Result<(), ApiError> {
        self.record(StoreCall::Update(id.to_string(), payload.clone()))?;
        self.wait_gate().await;
        let mut configs = self.configs.lock().unwrap();
        if let Some(existing) = configs.iter_mut().find(|c| c.id == id) {
            *existing = to_record(payload);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.record(StoreCall::Delete(id.to_string()))?;
        self.configs.lock().unwrap().retain(|c| c.id != id);
        Ok(())
    }

    async fn toggle(&self, id: &str) -> Result<(), ApiError> {
        self.record(StoreCall::Toggle(id.to_string()))?;
        let mut configs = self.configs.lock().unwrap();
        if let Some(config) = configs.iter_mut().find(|c| c.id == id) {
            config.is_active = !config.is_active;
        }
        Ok(())
    }

    async fn test(&self, id: &str) -> Result<TestResult, ApiError> {
        self.record(StoreCall::Test(id.to_string()))?;
        self.find(id)?;
        Ok(TestResult {
            success: true,
            error: None,
        })
    }
}
