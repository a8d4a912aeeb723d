//! Ordered list of locations with a floor of one entry.

use crate::model::ProxyLocation;
use crate::ModelError;
use std::collections::BTreeMap;

/// A single-field edit to one location. Applying an edit replaces that field
/// and nothing else, so two edits to the same field resolve last-writer-wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationField {
    Path(String),
    Backend(String),
    Websocket(bool),
    SslVerify(bool),
    CustomHeaders(BTreeMap<String, String>),
    SetHeader { name: String, value: String },
    RemoveHeader(String),
}

impl LocationField {
    fn apply(self, location: &ProxyLocation) -> ProxyLocation {
        let mut updated = location.clone();
        match self {
            LocationField::Path(path) => updated.path = path,
            LocationField::Backend(backend) => updated.backend = backend,
            LocationField::Websocket(websocket) => updated.websocket = websocket,
            LocationField::SslVerify(ssl_verify) => updated.ssl_verify = ssl_verify,
            LocationField::CustomHeaders(headers) => updated.custom_headers = headers,
            LocationField::SetHeader { name, value } => {
                updated.custom_headers.insert(name, value);
            }
            LocationField::RemoveHeader(name) => {
                updated.custom_headers.remove(&name);
            }
        }
        updated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationList {
    items: Vec<ProxyLocation>,
}

impl Default for LocationList {
    fn default() -> Self {
        Self {
            items: vec![ProxyLocation::default()],
        }
    }
}

impl LocationList {
    /// An empty input yields the single default location.
    pub fn from_vec(items: Vec<ProxyLocation>) -> Self {
        if items.is_empty() {
            Self::default()
        } else {
            Self { items }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ProxyLocation> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProxyLocation> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[ProxyLocation] {
        &self.items
    }

    /// Append a default location and return its index.
    pub fn add(&mut self) -> usize {
        self.items.push(ProxyLocation::default());
        self.items.len() - 1
    }

    /// Append a prepared location and return its index.
    pub fn push(&mut self, location: ProxyLocation) -> usize {
        self.items.push(location);
        self.items.len() - 1
    }

    /// Remove by position. Returns `false` without touching the list when only
    /// one location remains or the index is out of range.
    pub fn remove(&mut self, index: usize) -> bool {
        if self.items.len() <= 1 || index >= self.items.len() {
            return false;
        }
        self.items.remove(index);
        true
    }

    pub fn update(&mut self, index: usize, field: LocationField) -> Result<(), ModelError> {
        let current = self
            .items
            .get(index)
            .ok_or(ModelError::LocationIndex {
                index,
                len: self.items.len(),
            })?;
        let updated = field.apply(current);
        self.items[index] = updated;
        Ok(())
    }

    pub fn submittable(&self) -> Vec<ProxyLocation> {
        self.items
            .iter()
            .filter(|l| l.is_submittable())
            .cloned()
            .collect()
    }

    pub fn into_vec(self) -> Vec<ProxyLocation> {
        self.items
    }
}

impl<'a> IntoIterator for &'a LocationList {
    type Item = &'a ProxyLocation;
    type IntoIter = std::slice::Iter<'a, ProxyLocation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
