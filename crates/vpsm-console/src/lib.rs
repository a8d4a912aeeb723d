//! VPS manager console - admin client for the reverse-proxy control plane
//!
//! This crate talks to the control-plane API and drives the `vpsm` CLI:
//!
//! - **Configurations**: list, create, edit, duplicate, toggle, test and
//!   delete reverse-proxy entries through a single form controller
//! - **Session**: login, token persistence, logout
//! - **System**: nginx status, reload/restart/test, logs
//! - **Backups**: list, create, restore, delete, download
//! - **Monitoring**: status polling and the live-metrics socket
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use vpsm_console::{ApiClient, App};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let api = Arc::new(ApiClient::new("http://localhost:8000", Duration::from_secs(10))?);
//!     api.set_token(Some("token".to_string()));
//!     let mut app = App::new(api);
//!     app.refresh().await?;
//!     let mut form = app.open_create();
//!     form.set_server_name("example.com");
//!     form.blur_server_name();
//!     app.submit(&form).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod cli;
pub mod error;
pub mod form;
pub mod monitor;
pub mod session;
pub mod settings;
pub mod store;

#[cfg(test)]
mod testing;

pub use api::ApiClient;
pub use app::{App, StatusLevel};
pub use error::{ApiError, ConsoleError};
pub use form::{ConfigForm, FormKind, SslInput};
pub use monitor::{Monitor, MonitorEvent};
pub use session::{Session, TokenStore};
pub use settings::Settings;
pub use store::ConfigStore;
