use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use weavecore::{StateStore, StoreError};

/// File-backed notebook store: one directory per notebook holding the
/// materialized pipeline state as JSON documents.
///
/// Layout mirrors what the upload pipeline produces:
///
/// ```text
/// <root>/
///   meta.json          document metadata
///   workflow.json      saved workflow definition
///   pin_data.json      pinned node outputs
///   text/chunks.json   chunked document text
///   text/schema.json   inferred skill schema
/// ```
pub struct FileNotebook {
    root: PathBuf,
}

impl FileNotebook {
    /// Open (creating if needed) the notebook directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        match key {
            "meta" => self.root.join("meta.json"),
            "workflow" => self.root.join("workflow.json"),
            "pin_data" => self.root.join("pin_data.json"),
            "chunks" => self.root.join("text").join("chunks.json"),
            "schema" => self.root.join("text").join("schema.json"),
            other => self.root.join(format!("{other}.json")),
        }
    }
}

impl StateStore for FileNotebook {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }
}
