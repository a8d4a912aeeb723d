//! Certificate and key inputs.
//!
//! Each of the two inputs of a form is an [`SslSlot`]. A slot holds exactly one
//! authoritative value: nothing, a path on the proxy host, or inline PEM text.
//! Uploading a file and pasting text both produce inline content, so the most
//! recent of the two replaces the other.

use crate::model::non_empty;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SslOrigin {
    Pasted,
    Uploaded { file_name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SslSlot {
    #[default]
    Empty,
    /// Path of a file already present on the proxy host.
    Path(String),
    /// Inline PEM text.
    Content { pem: String, origin: SslOrigin },
}

impl SslSlot {
    /// Build a slot from the path/content pair of a stored record.
    /// Content dominates when both are present.
    pub fn from_parts(path: &Option<String>, content: &Option<String>) -> Self {
        if let Some(pem) = non_empty(content) {
            SslSlot::Content {
                pem: pem.to_string(),
                origin: SslOrigin::Pasted,
            }
        } else if let Some(path) = non_empty(path) {
            SslSlot::Path(path.to_string())
        } else {
            SslSlot::Empty
        }
    }

    /// Point the slot at a path. Blank input empties the slot.
    pub fn set_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        *self = if path.trim().is_empty() {
            SslSlot::Empty
        } else {
            SslSlot::Path(path)
        };
    }

    /// Replace whatever the slot held with pasted PEM text. Blank input empties the slot.
    pub fn paste(&mut self, pem: impl Into<String>) {
        let pem = pem.into();
        *self = if pem.trim().is_empty() {
            SslSlot::Empty
        } else {
            SslSlot::Content {
                pem,
                origin: SslOrigin::Pasted,
            }
        };
    }

    /// Replace whatever the slot held with the text of an uploaded file.
    /// A blank file empties the slot, as a blank paste does.
    pub fn upload(&mut self, file_name: impl Into<String>, pem: impl Into<String>) {
        let pem = pem.into();
        *self = if pem.trim().is_empty() {
            SslSlot::Empty
        } else {
            SslSlot::Content {
                pem,
                origin: SslOrigin::Uploaded {
                    file_name: file_name.into(),
                },
            }
        };
    }

    pub fn clear(&mut self) {
        *self = SslSlot::Empty;
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SslSlot::Empty)
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            SslSlot::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            SslSlot::Content { pem, .. } => Some(pem),
            _ => None,
        }
    }

    /// `(path, content)` as carried on the wire; at most one side is `Some`.
    pub fn to_parts(&self) -> (Option<String>, Option<String>) {
        match self {
            SslSlot::Empty => (None, None),
            SslSlot::Path(path) => (Some(path.clone()), None),
            SslSlot::Content { pem, .. } => (None, Some(pem.clone())),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SslSlot::Empty => "none".to_string(),
            SslSlot::Path(path) => format!("path {path}"),
            SslSlot::Content {
                origin: SslOrigin::Pasted,
                pem,
            } => format!("pasted PEM ({} bytes)", pem.len()),
            SslSlot::Content {
                origin: SslOrigin::Uploaded { file_name },
                pem,
            } => format!("uploaded {file_name} ({} bytes)", pem.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----";

    #[test]
    fn test_blank_upload_empties_slot() {
        let mut slot = SslSlot::Path("/etc/ssl/app.crt".to_string());
        slot.upload("empty.pem", " \n");
        assert!(slot.is_empty());
        assert_eq!(slot.to_parts(), (None, None));

        slot.upload("app.pem", PEM);
        slot.upload("truncated.pem", "");
        assert!(slot.is_empty());
    }

    #[test]
    fn test_state_machine_path_content_empty() {
        let mut slot = SslSlot::Empty;
        slot.set_path("/etc/ssl/app.crt");
        assert_eq!(slot.to_parts(), (Some("/etc/ssl/app.crt".to_string()), None));

        slot.paste(PEM);
        assert_eq!(slot.to_parts(), (None, Some(PEM.to_string())));

        slot.clear();
        assert!(slot.is_empty());
        assert_eq!(slot.to_parts(), (None, None));
    }

    #[test]
    fn test_upload_replaces_pasted_text_and_back() {
        let mut slot = SslSlot::Empty;
        slot.paste("pasted");
        slot.upload("app.crt", PEM);
        assert_eq!(slot.content(), Some(PEM));
        assert!(matches!(
            &slot,
            SslSlot::Content { origin: SslOrigin::Uploaded { file_name }, .. } if file_name == "app.crt"
        ));

        slot.paste("again");
        assert_eq!(slot.content(), Some("again"));
        assert!(matches!(&slot, SslSlot::Content { origin: SslOrigin::Pasted, .. }));
    }

    #[test]
    fn test_from_parts_content_dominates() {
        let slot = SslSlot::from_parts(&Some("/etc/a.pem".to_string()), &Some(PEM.to_string()));
        assert_eq!(slot.content(), Some(PEM));
        assert_eq!(slot.path(), None);

        let slot = SslSlot::from_parts(&Some("/etc/a.pem".to_string()), &Some(String::new()));
        assert_eq!(slot.path(), Some("/etc/a.pem"));

        assert!(SslSlot::from_parts(&None, &None).is_empty());
    }

    #[test]
    fn test_blank_input_empties_slot() {
        let mut slot = SslSlot::Path("/etc/a.pem".to_string());
        slot.paste("   ");
        assert!(slot.is_empty());
        slot.set_path("/etc/a.pem");
        slot.set_path("");
        assert!(slot.is_empty());
    }

    #[test]
    fn test_never_both_parts() {
        let mut slot = SslSlot::Empty;
        for step in 0..6 {
            match step % 3 {
                0 => slot.set_path("/x"),
                1 => slot.upload("x.pem", PEM),
                _ => slot.paste(PEM),
            }
            let (path, content) = slot.to_parts();
            assert!(!(path.is_some() && content.is_some()));
        }
    }
}
