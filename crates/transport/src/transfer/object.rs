use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A bucket of objects, as listed by a storage provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    name: String,
    #[serde(default)]
    extra: BTreeMap<String, Value>,
}

impl Container {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self { name: name.into(), extra: BTreeMap::new() }
    }

    #[must_use]
    pub fn with_extra<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provider specific attributes.
    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }
}

/// A stored blob: its name is unique within its container and `size` is what a
/// download must produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageObject {
    name: String,
    size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    container: Option<Container>,
    #[serde(default)]
    extra: BTreeMap<String, Value>,
    #[serde(default)]
    meta_data: BTreeMap<String, String>,
}

impl StorageObject {
    pub fn new<N: Into<String>>(name: N, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            hash: None,
            container: None,
            extra: BTreeMap::new(),
            meta_data: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_hash<H: Into<String>>(mut self, hash: H) -> Self {
        self.hash = Some(hash.into());
        self
    }

    #[must_use]
    pub fn with_container(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    #[must_use]
    pub fn with_extra<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_meta_data<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.meta_data.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Content hash as reported by the provider, usually a hex MD5.
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    /// User metadata stored with the object.
    pub fn meta_data(&self) -> &BTreeMap<String, String> {
        &self.meta_data
    }
}
