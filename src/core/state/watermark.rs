//! Per-entity watermark model
//!
//! A watermark records, for one entity, the window end of its last successful
//! sync and whether the entity takes part in runs at all.

use crate::domain::SyncTimestamp;
use serde::{Deserialize, Serialize};

/// Sync state of one entity, as stored in the state file
///
/// # Examples
///
/// ```
/// use tidemark::core::state::EntityWatermark;
///
/// let json = r#"{"entity":"orders","lastRunTime":"","active":true}"#;
/// let watermark: EntityWatermark = serde_json::from_str(json).unwrap();
///
/// assert_eq!(watermark.name, "orders");
/// assert!(watermark.last_sync_time.is_none());
/// assert!(watermark.active);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityWatermark {
    /// Entity name; also the template file stem and output file prefix
    #[serde(rename = "entity")]
    pub name: String,

    /// Window end of the last successful sync, `None` if never synced
    #[serde(rename = "lastRunTime", default, with = "last_run_time")]
    pub last_sync_time: Option<SyncTimestamp>,

    /// Inactive entities are skipped by every run
    #[serde(default)]
    pub active: bool,
}

impl EntityWatermark {
    /// Creates a watermark that has never been synced
    pub fn new(name: impl Into<String>, active: bool) -> Self {
        Self {
            name: name.into(),
            last_sync_time: None,
            active,
        }
    }

    /// Sets the last sync time
    pub fn with_last_sync_time(mut self, ts: SyncTimestamp) -> Self {
        self.last_sync_time = Some(ts);
        self
    }

    /// Checks that the name is usable as a file stem
    ///
    /// # Errors
    ///
    /// Returns a description of the problem for empty names, names containing
    /// path separators, or `.`/`..`.
    pub fn validate_name(&self) -> Result<(), String> {
        let name = self.name.as_str();
        if name.trim().is_empty() {
            return Err("entity name cannot be empty".to_string());
        }
        if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
            return Err(format!("entity name '{name}' is not a valid file name"));
        }
        Ok(())
    }
}

/// `lastRunTime` is written as `""` when absent; `""`, `"null"` and JSON
/// `null` are all read back as absent.
mod last_run_time {
    use crate::domain::SyncTimestamp;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<SyncTimestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SyncTimestamp>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") | Some("null") => Ok(None),
            Some(text) => SyncTimestamp::parse(text)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
