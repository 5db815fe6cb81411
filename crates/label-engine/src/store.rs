//! Template and asset sources

use crate::loader::TemplateFormat;
use crate::{EngineError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Raw template container as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    pub bytes: Vec<u8>,
    pub format: TemplateFormat,
}

/// Resolves template ids to template containers
pub trait TemplateStore {
    /// # Errors
    /// `TemplateNotFound` when no template has the id.
    fn load(&self, id: &str) -> Result<TemplateSource>;
}

/// Provides static assets such as the logo by name
pub trait AssetStore {
    /// # Errors
    /// `AssetUnavailable` when the asset does not exist or cannot be read.
    fn load(&self, name: &str) -> Result<Vec<u8>>;
}

fn check_id(id: &str) -> Result<()> {
    let safe = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !id.starts_with('.');
    if safe {
        Ok(())
    } else {
        Err(EngineError::TemplateNotFound(id.to_string()))
    }
}

/// Templates stored as `<id>.json` or `<id>.xlsx` in one directory
#[derive(Debug, Clone)]
pub struct DirTemplateStore {
    root: PathBuf,
}

impl DirTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateStore for DirTemplateStore {
    fn load(&self, id: &str) -> Result<TemplateSource> {
        check_id(id)?;
        for format in [TemplateFormat::Json, TemplateFormat::Xlsx] {
            let path = self.root.join(format!("{id}.{}", format.extension()));
            if path.is_file() {
                log::debug!(
                    "event=template_resolve module=store status=ok id={} path={}",
                    id,
                    path.display()
                );
                return Ok(TemplateSource {
                    bytes: std::fs::read(&path)?,
                    format,
                });
            }
        }
        Err(EngineError::TemplateNotFound(id.to_string()))
    }
}

/// In-memory template store
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateStore {
    templates: HashMap<String, TemplateSource>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, id: &str, bytes: Vec<u8>, format: TemplateFormat) -> Self {
        self.insert(id, bytes, format);
        self
    }

    pub fn insert(&mut self, id: &str, bytes: Vec<u8>, format: TemplateFormat) {
        self.templates
            .insert(id.to_string(), TemplateSource { bytes, format });
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn load(&self, id: &str) -> Result<TemplateSource> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::TemplateNotFound(id.to_string()))
    }
}

/// Assets stored as files in one directory
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetStore for DirAssetStore {
    fn load(&self, name: &str) -> Result<Vec<u8>> {
        if Path::new(name).components().count() != 1 {
            return Err(EngineError::asset(name, "not a plain file name"));
        }
        let path = self.root.join(name);
        std::fs::read(&path).map_err(|err| EngineError::asset(name, err))
    }
}

/// In-memory asset store
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetStore {
    assets: HashMap<String, Vec<u8>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.assets.insert(name.to_string(), bytes);
        self
    }
}

impl AssetStore for MemoryAssetStore {
    fn load(&self, name: &str) -> Result<Vec<u8>> {
        self.assets
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::asset(name, "not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dir_template_store_prefers_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sticker.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("sticker.xlsx"), b"PK").unwrap();
        std::fs::write(dir.path().join("passport.xlsx"), b"PK").unwrap();

        let store = DirTemplateStore::new(dir.path());
        assert_eq!(store.load("sticker").unwrap().format, TemplateFormat::Json);
        assert_eq!(store.load("passport").unwrap().format, TemplateFormat::Xlsx);
        assert!(matches!(
            store.load("missing"),
            Err(EngineError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_dir_template_store_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirTemplateStore::new(dir.path());
        assert!(matches!(
            store.load("../secret"),
            Err(EngineError::TemplateNotFound(_))
        ));
        assert!(store.load("").is_err());
    }

    #[test]
    fn test_dir_asset_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), b"png").unwrap();

        let store = DirAssetStore::new(dir.path());
        assert_eq!(store.load("logo.png").unwrap(), b"png".to_vec());
        assert!(matches!(
            store.load("absent.png"),
            Err(EngineError::AssetUnavailable { .. })
        ));
        assert!(store.load("../logo.png").is_err());
    }

    #[test]
    fn test_memory_stores() {
        let templates =
            MemoryTemplateStore::new().with_template("t", b"{}".to_vec(), TemplateFormat::Json);
        assert_eq!(templates.load("t").unwrap().bytes, b"{}".to_vec());
        assert!(templates.load("u").is_err());

        let assets = MemoryAssetStore::new().with_asset("logo.png", vec![1, 2]);
        assert_eq!(assets.load("logo.png").unwrap(), vec![1, 2]);
    }
}
