//! The seam between the controllers and the configuration endpoints.

use async_trait::async_trait;
use vpsm_config::{ConfigPayload, ReverseProxyConfig};

use crate::api::{ApiClient, TestResult};
use crate::error::ApiError;

/// Remote owner of the configuration list. The controllers never keep
/// configuration state that this store has not returned.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn list(&self) -> Result<Vec<ReverseProxyConfig>, ApiError>;
    async fn get(&self, id: &str) -> Result<ReverseProxyConfig, ApiError>;
    async fn create(&self, payload: &ConfigPayload) -> Result<(), ApiError>;
    async fn update(&self, id: &str, payload: &ConfigPayload) -> Result<(), ApiError>;
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
    async fn toggle(&self, id: &str) -> Result<(), ApiError>;
    async fn test(&self, id: &str) -> Result<TestResult, ApiError>;
}

#[async_trait]
impl ConfigStore for ApiClient {
    async fn list(&self) -> Result<Vec<ReverseProxyConfig>, ApiError> {
        self.list_configs().await
    }

    async fn get(&self, id: &str) -> Result<ReverseProxyConfig, ApiError> {
        self.get_config(id).await
    }

    async fn create(&self, payload: &ConfigPayload) -> Result<(), ApiError> {
        self.create_config(payload).await
    }

    async fn update(&self, id: &str, payload: &ConfigPayload) -> Result<(), ApiError> {
        self.update_config(id, payload).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.delete_config(id).await
    }

    async fn toggle(&self, id: &str) -> Result<(), ApiError> {
        self.toggle_config(id).await
    }

    async fn test(&self, id: &str) -> Result<TestResult, ApiError> {
        self.test_config(id).await
    }
}

#[async_trait]
impl<S: ConfigStore + ?Sized> ConfigStore for std::sync::Arc<S> {
    async fn list(&self) -> Result<Vec<ReverseProxyConfig>, ApiError> {
        (**self).list().await
    }

    async fn get(&self, id: &str) -> Result<ReverseProxyConfig, ApiError> {
        (**self).get(id).await
    }

    async fn create(&self, payload: &ConfigPayload) -> Result<(), ApiError> {
        (**self).create(payload).await
    }

    async fn update(&self, id: &str, payload: &ConfigPayload) -> Result<(), ApiError> {
        (**self).update(id, payload).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        (**self).delete(id).await
    }

    async fn toggle(&self, id: &str) -> Result<(), ApiError> {
        (**self).toggle(id).await
    }

    async fn test(&self, id: &str) -> Result<TestResult, ApiError> {
        (**self).test(id).await
    }
}
