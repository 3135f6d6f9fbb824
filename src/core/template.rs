//! Query template lookup
//!
//! Each entity's query lives at `<sql_dir>/<entity>.sql`.

use crate::domain::{Result, SyncError};
use std::path::PathBuf;

/// Filesystem directory of per-entity query templates
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    /// Creates a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Template path for an entity
    pub fn path_for(&self, entity: &str) -> PathBuf {
        self.dir.join(format!("{entity}.sql"))
    }

    /// Reads an entity's template
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Template` if the file is missing, unreadable, or blank.
    pub async fn load(&self, entity: &str) -> Result<String> {
        let path = self.path_for(entity);
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            SyncError::Template(format!("cannot read {}: {}", path.display(), e))
        })?;

        if text.trim().is_empty() {
            return Err(SyncError::Template(format!(
                "{} is empty",
                path.display()
            )));
        }
        Ok(text)
    }

    /// Entities among `names` that have no template file, in input order
    pub fn missing<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        names
            .into_iter()
            .filter(|name| !self.path_for(name).is_file())
            .map(str::to_string)
            .collect()
    }
}
