//! Form controller for creating and editing reverse-proxy configurations.
//!
//! One [`ConfigForm`] serves both paths. Mutations take `&mut self`; `submit`
//! takes `&self`, so a failed submission leaves the form exactly as it was and
//! a second submission while one is pending is refused by the in-flight flag.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use vpsm_config::{
    generate_id, validate_config, ConfigMode, ConfigPayload, LocationField, LocationList,
    ModelError, ProxyLocation, ReverseProxyConfig, SslSlot, Template, ValidateOptions,
    ValidationReport,
};

use crate::error::ConsoleError;
use crate::store::ConfigStore;

/// Which external operation `submit` performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormKind {
    Create,
    /// Update keyed by the id the record had when it was fetched.
    Edit { original_id: String },
}

/// Selects one of the two SSL inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslInput {
    Certificate,
    Key,
}

#[derive(Debug)]
pub struct ConfigForm {
    kind: FormKind,
    id: String,
    server_name: String,
    listen_port: u16,
    is_active: bool,
    locations: LocationList,
    cert: SslSlot,
    key: SslSlot,
    extra: BTreeMap<String, Value>,
    /// Set once the user types an id; stops the server-name blur from
    /// overwriting it.
    id_edited: bool,
    baseline: ConfigPayload,
    in_flight: AtomicBool,
}

impl Default for ConfigForm {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigForm {
    /// Blank create draft: one location at `/`, port 80, active.
    pub fn new() -> Self {
        Self::from_record(FormKind::Create, &ReverseProxyConfig::default(), false)
    }

    /// Create draft seeded from a template.
    pub fn from_template(template: &Template) -> Self {
        Self::from_record(FormKind::Create, &template.to_config(), false)
    }

    /// Editable copy of a fetched record.
    pub fn edit(config: &ReverseProxyConfig) -> Self {
        Self::from_record(
            FormKind::Edit {
                original_id: config.id.clone(),
            },
            config,
            true,
        )
    }

    fn from_record(kind: FormKind, config: &ReverseProxyConfig, id_edited: bool) -> Self {
        Self {
            kind,
            id: config.id.clone(),
            server_name: config.server_name.clone(),
            listen_port: config.listen_port,
            is_active: config.is_active,
            locations: LocationList::from_vec(config.locations.clone()),
            cert: SslSlot::from_parts(&config.ssl_cert, &config.ssl_cert_content),
            key: SslSlot::from_parts(&config.ssl_key, &config.ssl_key_content),
            extra: config.extra.clone(),
            id_edited,
            baseline: config.to_payload(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> &FormKind {
        &self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn locations(&self) -> &LocationList {
        &self.locations
    }

    pub fn ssl(&self, which: SslInput) -> &SslSlot {
        match which {
            SslInput::Certificate => &self.cert,
            SslInput::Key => &self.key,
        }
    }

    pub fn ssl_mut(&mut self, which: SslInput) -> &mut SslSlot {
        match which {
            SslInput::Certificate => &mut self.cert,
            SslInput::Key => &mut self.key,
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn set_server_name(&mut self, server_name: impl Into<String>) {
        self.server_name = server_name.into();
    }

    /// Focus left the server-name input. Regenerates the id unless the user
    /// has typed one since the last generation.
    pub fn blur_server_name(&mut self) {
        if !self.id_edited {
            self.generate_id();
        }
    }

    /// Recompute the id from the server name.
    pub fn generate_id(&mut self) {
        self.id = generate_id(&self.server_name);
        self.id_edited = false;
        debug!(id = %self.id, "generated config id");
    }

    /// A hand-typed id. Clearing the field hands control back to the blur hook.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
        self.id_edited = !self.id.trim().is_empty();
    }

    pub fn set_listen_port(&mut self, port: u16) {
        self.listen_port = port;
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn add_location(&mut self) -> usize {
        self.locations.add()
    }

    pub fn push_location(&mut self, location: ProxyLocation) -> usize {
        self.locations.push(location)
    }

    /// No-op (returns `false`) on the last remaining location or a bad index.
    pub fn remove_location(&mut self, index: usize) -> bool {
        self.locations.remove(index)
    }

    pub fn update_location(&mut self, index: usize, field: LocationField) -> Result<(), ModelError> {
        self.locations.update(index, field)
    }

    /// Load a PEM file into one SSL input, replacing pasted text or a path.
    pub async fn upload(&mut self, which: SslInput, path: &Path) -> Result<(), ConsoleError> {
        let pem = tokio::fs::read_to_string(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        debug!(%file_name, bytes = pem.len(), "loaded PEM file");
        self.ssl_mut(which).upload(file_name, pem);
        Ok(())
    }

    /// Mode of the working copy, recomputed on every call.
    pub fn mode(&self) -> ConfigMode {
        ConfigMode::infer(&self.id, &self.server_name)
    }

    /// Port forwarding has no server name and terminates no TLS.
    pub fn convert_to_port_forward(&mut self) {
        self.server_name.clear();
        self.cert.clear();
        self.key.clear();
    }

    /// Give the entry a server name. On a create draft whose id was not typed
    /// by hand the id follows the new name.
    ///
    /// An edited record keeps its id, so a record whose id carries the
    /// port-forward prefix still reads as port-forward afterwards.
    pub fn convert_to_domain(&mut self, server_name: &str) -> Result<(), ModelError> {
        if server_name.trim().is_empty() {
            return Err(ModelError::EmptyServerName);
        }
        self.server_name = server_name.trim().to_string();
        if self.kind == FormKind::Create {
            self.blur_server_name();
        }
        Ok(())
    }

    /// The working copy as a record. Each SSL field pair carries at most one
    /// value, per the slot state.
    pub fn to_config(&self) -> ReverseProxyConfig {
        let (ssl_cert, ssl_cert_content) = self.cert.to_parts();
        let (ssl_key, ssl_key_content) = self.key.to_parts();
        ReverseProxyConfig {
            id: self.id.clone(),
            server_name: self.server_name.clone(),
            listen_port: self.listen_port,
            ssl_cert,
            ssl_key,
            ssl_cert_content,
            ssl_key_content,
            is_active: self.is_active,
            locations: self.locations.as_slice().to_vec(),
            created_at: None,
            updated_at: None,
            extra: self.extra.clone(),
        }
    }

    pub fn payload(&self) -> ConfigPayload {
        ConfigPayload::from_slots(&self.to_config(), &self.cert, &self.key)
    }

    pub fn validate(&self) -> ValidationReport {
        validate_config(&self.to_config(), &ValidateOptions::default())
    }

    /// Whether submitting now would send something other than what the form
    /// was opened with.
    pub fn is_dirty(&self) -> bool {
        self.payload() != self.baseline
    }

    /// Validate, then create or update through `store`.
    ///
    /// Returns the payload that was sent. On any error nothing in the form
    /// changes and the form can be submitted again.
    pub async fn submit<S>(&self, store: &S) -> Result<ConfigPayload, ConsoleError>
    where
        S: ConfigStore + ?Sized,
    {
        let _guard = InFlight::acquire(&self.in_flight).ok_or(ConsoleError::SubmitInFlight)?;

        let report = self.validate();
        if report.has_errors() {
            debug!(summary = %report.summary(), "submission refused by validation");
            return Err(ConsoleError::Validation(report));
        }

        let payload = self.payload();
        match &self.kind {
            FormKind::Create => store.create(&payload).await?,
            FormKind::Edit { original_id } => store.update(original_id, &payload).await?,
        }
        info!(id = %payload.id, locations = payload.locations.len(), "configuration saved");
        Ok(payload)
    }
}

/// Holds the in-flight flag for the duration of a submission.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
