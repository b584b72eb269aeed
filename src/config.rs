/*!
# Knowledge base configuration
Connection settings for a knowledge base, normally loaded from a JSON file.

```json
{
    "backend": { "type": "directory", "path": "kb_data" },
    "namespace": "reviews",
    "host": "localhost"
}
```
Keys other than `backend` and `namespace` are kept verbatim in `options` and never interpreted here.
*/
use anyhow::{ensure, Context};
use derive_builder::Builder;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::util::json_io::load_json;

/// Default collection name
pub const DEFAULT_NAMESPACE: &str = "reviews";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Where calls are stored
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreBackend {
    /// Nothing survives the process
    #[default]
    Memory,
    /// One JSON document per call under `path/<namespace>/`
    Directory { path: PathBuf }
}

#[derive(Builder, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[builder(default)]
pub struct KnowledgeBaseConfig {
    /// Storage backend
    #[serde(default)]
    backend: StoreBackend,
    /// Collection name within the backend
    #[serde(default = "default_namespace")]
    #[builder(setter(into))]
    namespace: String,
    /// Opaque connection options, carried along but not parsed
    #[serde(flatten)]
    options: BTreeMap<String, serde_json::Value>
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            namespace: default_namespace(),
            options: Default::default()
        }
    }
}

impl KnowledgeBaseConfig {
    /// Loads a configuration file (.json or .json.gz).
    /// Relative directory paths are resolved against the folder containing the file.
    /// # Errors
    /// * if the file cannot be read or parsed
    /// * if the namespace is invalid
    pub fn from_file(filename: &Path) -> anyhow::Result<Self> {
        let mut config: KnowledgeBaseConfig = load_json(filename)
            .with_context(|| format!("Error while loading knowledge base config {filename:?}:"))?;

        if let StoreBackend::Directory { path } = &mut config.backend {
            if path.is_relative() {
                if let Some(parent) = filename.parent() {
                    *path = parent.join(&*path);
                }
            }
        }

        config.validate()?;
        for key in config.options.keys() {
            debug!("Connection option {key:?} is passed through without interpretation");
        }
        Ok(config)
    }

    /// Checks that the namespace is usable as a single folder name
    /// # Errors
    /// * if the namespace is empty, hidden, or contains path separators
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.namespace.is_empty(), "namespace must not be empty");
        ensure!(!self.namespace.starts_with('.'), "namespace must not start with '.': {:?}", self.namespace);
        let mut components = Path::new(&self.namespace).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        ensure!(single_normal, "namespace must be a single name without separators: {:?}", self.namespace);
        Ok(())
    }

    // getters
    pub fn backend(&self) -> &StoreBackend {
        &self.backend
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn options(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::json_io::save_json;

    #[test]
    fn test_directory_config() {
        let folder = tempfile::tempdir().unwrap();
        let config_fn = folder.path().join("kb.json");
        std::fs::write(&config_fn, r#"{
            "backend": {"type": "directory", "path": "kb_data"},
            "namespace": "na12878",
            "host": "localhost",
            "port": 27017
        }"#).unwrap();

        let config = KnowledgeBaseConfig::from_file(&config_fn).unwrap();
        assert_eq!(config.backend(), &StoreBackend::Directory { path: folder.path().join("kb_data") });
        assert_eq!(config.namespace(), "na12878");
        assert_eq!(config.options().len(), 2);
        assert_eq!(config.options()["port"], serde_json::json!(27017));
    }

    #[test]
    fn test_defaults() {
        let folder = tempfile::tempdir().unwrap();
        let config_fn = folder.path().join("kb.json.gz");
        save_json(&serde_json::json!({}), &config_fn).unwrap();

        let config = KnowledgeBaseConfig::from_file(&config_fn).unwrap();
        assert_eq!(config, KnowledgeBaseConfig::default());
        assert_eq!(config.backend(), &StoreBackend::Memory);
        assert_eq!(config.namespace(), DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_builder() {
        let config = KnowledgeBaseConfigBuilder::default()
            .backend(StoreBackend::Directory { path: PathBuf::from("/tmp/kb") })
            .namespace("calls")
            .build().unwrap();
        assert_eq!(config.namespace(), "calls");
        assert!(config.options().is_empty());

        let defaulted = KnowledgeBaseConfigBuilder::default().build().unwrap();
        assert_eq!(defaulted.namespace(), DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_bad_namespace() {
        for namespace in ["", ".hidden", "a/b", ".."] {
            let config = KnowledgeBaseConfigBuilder::default()
                .namespace(namespace)
                .build().unwrap();
            assert!(config.validate().is_err(), "{namespace:?} should be rejected");
        }
    }
}
