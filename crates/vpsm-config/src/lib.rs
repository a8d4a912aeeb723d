//! Reverse-proxy configuration model for the VPS manager console.
//!
//! This crate holds everything about a configuration that can be decided
//! without talking to the control plane: the record types, id slugging, the
//! SSL input state machine, the location list, the submission payload,
//! validation and the built-in templates. It can be used as a library or
//! through the `vpsm-lint` CLI binary.
//!
//! # Example
//!
//! ```no_run
//! use vpsm_config::{lint_file, ValidateOptions};
//! use std::path::Path;
//!
//! let report = lint_file(Path::new("example-com.json"), &ValidateOptions::default());
//! if report.has_errors() {
//!     eprintln!("{}", report.summary());
//! }
//! ```

mod error;
pub mod locations;
pub mod model;
pub mod payload;
pub mod slug;
pub mod ssl;
pub mod templates;
mod types;
mod validator;

use serde_json::Value;
use std::path::Path;

pub use error::ModelError;
pub use locations::{LocationField, LocationList};
pub use model::{BackendKind, ConfigMode, ProxyLocation, ReverseProxyConfig, PORT_FORWARD_PREFIX};
pub use payload::ConfigPayload;
pub use slug::generate_id;
pub use ssl::{SslOrigin, SslSlot};
pub use templates::Template;
pub use types::{Issue, Severity, ValidateOptions, ValidationReport};
pub use validator::{is_valid_backend, validate_config, validate_locations};

/// Lint one configuration file. The file holds a single configuration object
/// or an array of them (as in a backup export).
pub fn lint_file(path: &Path, options: &ValidateOptions) -> ValidationReport {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            let mut report = ValidationReport::new();
            report.add_issue(Issue::error("E001", format!("Failed to read file: {e}")));
            return report.with_source(path);
        }
    };

    lint_json(&content, options).with_source(path)
}

/// Lint every `.json` file in a directory (non-recursive), in name order.
pub fn lint_directory(path: &Path, options: &ValidateOptions) -> ValidationReport {
    let mut report = ValidationReport::new();

    let entries = match std::fs::read_dir(path) {
        Ok(e) => e,
        Err(e) => {
            report.add_issue(
                Issue::error("E001", format!("Failed to read directory: {e}")).with_source(path),
            );
            return report;
        }
    };

    let mut files: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
        .collect();
    files.sort();

    for file in files {
        report.merge(lint_file(&file, options));
    }

    report
}

/// Lint a JSON document held in memory.
pub fn lint_json(json: &str, options: &ValidateOptions) -> ValidationReport {
    match serde_json::from_str::<Value>(json) {
        Ok(value) => lint_value(&value, options),
        Err(e) => {
            let mut report = ValidationReport::new();
            report.add_issue(
                Issue::error("E002", format!("Invalid JSON: {e}"))
                    .with_suggestion("Fix the JSON syntax errors"),
            );
            report
        }
    }
}

/// Lint an already parsed JSON document.
pub fn lint_value(value: &Value, options: &ValidateOptions) -> ValidationReport {
    match value {
        Value::Array(items) => {
            let mut report = ValidationReport::new();
            for (idx, item) in items.iter().enumerate() {
                let mut item_report = lint_record(item, options);
                for issue in &mut item_report.issues {
                    issue.location = Some(match issue.location.take() {
                        Some(inner) => format!("[{idx}].{inner}"),
                        None => format!("[{idx}]"),
                    });
                }
                report.merge(item_report);
            }
            report
        }
        other => lint_record(other, options),
    }
}

fn lint_record(value: &Value, options: &ValidateOptions) -> ValidationReport {
    // Ports outside u16 fail typed parsing; report them with the port code.
    if let Some(port) = value.get("listen_port").and_then(Value::as_i64) {
        if !(1..=65535).contains(&port) {
            let mut report = ValidationReport {
                configs_checked: 1,
                ..Default::default()
            };
            report.add_issue(
                Issue::error("E104", format!("Listen port {port} is out of range (1-65535)"))
                    .with_location("listen_port"),
            );
            return report;
        }
    }

    match serde_json::from_value::<ReverseProxyConfig>(value.clone()) {
        Ok(config) => validate_config(&config, options),
        Err(e) => {
            let mut report = ValidationReport {
                configs_checked: 1,
                ..Default::default()
            };
            report.add_issue(
                Issue::error("E003", format!("Not a reverse-proxy configuration: {e}"))
                    .with_suggestion("Expect an object with id, server_name, listen_port and locations"),
            );
            report
        }
    }
}
