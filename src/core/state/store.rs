//! Durable watermark store
//!
//! Holds every entity's watermark behind one lock and persists the full list
//! to a JSON file after each commit. The file is replaced atomically: the new
//! content goes to `<path>.tmp`, which is then renamed over the real file.
//! When a mirror is configured the file is also pushed to remote storage,
//! best-effort.

use super::watermark::EntityWatermark;
use crate::adapters::blob::BlobStore;
use crate::core::template::TemplateStore;
use crate::domain::{Result, SyncError, SyncTimestamp};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Upper bound on fetching the mirrored state at load time
pub const MIRROR_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on pushing the state file to the mirror after a commit
pub const MIRROR_PUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote copy of the state file
#[derive(Clone)]
pub struct StateMirror {
    /// Object storage holding the copy
    pub store: Arc<dyn BlobStore>,

    /// Object key of the copy
    pub key: String,
}

impl StateMirror {
    /// Creates a mirror at `key`
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

/// Non-fatal failure to update the remote state copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorWarning(pub String);

impl fmt::Display for MirrorWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state mirror not updated: {}", self.0)
    }
}

/// Where the loaded state came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOrigin {
    /// Fetched from the remote mirror
    Mirror,
    /// Read from the local file
    Local,
    /// Neither existed; started empty
    Empty,
}

/// Lock-protected watermark list with file persistence
pub struct WatermarkStore {
    path: PathBuf,
    mirror: Option<StateMirror>,
    origin: StateOrigin,
    entities: RwLock<Vec<EntityWatermark>>,
}

impl WatermarkStore {
    /// Loads the store
    ///
    /// With a mirror, the remote copy is tried first and, when found, written
    /// over the local file. An entity whose local watermark is newer than the
    /// mirrored one keeps the local value. If the remote copy is missing or cannot be
    /// fetched within [`MIRROR_FETCH_TIMEOUT`], the local file is used; if the
    /// local file is also missing the store starts empty.
    ///
    /// # Arguments
    ///
    /// * `path` - Local state file
    /// * `mirror` - Optional remote copy
    ///
    /// # Errors
    ///
    /// Returns `SyncError::State` if the file is missing without a mirror, is
    /// not valid state JSON, or names an entity twice.
    pub async fn load(path: impl Into<PathBuf>, mirror: Option<StateMirror>) -> Result<Self> {
        let path = path.into();

        if let Some(ref m) = mirror {
            if let Some(mut entities) = fetch_mirror(m).await {
                if let Some(local) = read_local(&path).await {
                    keep_newer_local(&mut entities, &local);
                }
                if let Err(e) = write_atomic(&path, &encode(&entities)?).await {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to refresh local state copy from mirror"
                    );
                }
                tracing::info!(
                    key = %m.key,
                    entities = entities.len(),
                    "Loaded state from mirror"
                );
                return Ok(Self::from_parts(path, mirror, StateOrigin::Mirror, entities));
            }
        }

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let entities = decode(&bytes)
                    .map_err(|e| e.context(format!("state file {}", path.display())))?;
                tracing::info!(
                    path = %path.display(),
                    entities = entities.len(),
                    "Loaded state from local file"
                );
                Ok(Self::from_parts(path, mirror, StateOrigin::Local, entities))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && mirror.is_some() => {
                tracing::info!(
                    path = %path.display(),
                    "No remote or local state found; starting empty"
                );
                Ok(Self::from_parts(path, mirror, StateOrigin::Empty, Vec::new()))
            }
            Err(e) => Err(SyncError::State(format!(
                "cannot read state file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn from_parts(
        path: PathBuf,
        mirror: Option<StateMirror>,
        origin: StateOrigin,
        entities: Vec<EntityWatermark>,
    ) -> Self {
        Self {
            path,
            mirror,
            origin,
            entities: RwLock::new(entities),
        }
    }

    /// Local state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the state was loaded from
    pub fn origin(&self) -> StateOrigin {
        self.origin
    }

    /// Snapshot of every watermark
    pub async fn entities(&self) -> Vec<EntityWatermark> {
        self.entities.read().await.clone()
    }

    /// Snapshot of active watermarks, sorted by name
    pub async fn active(&self) -> Vec<EntityWatermark> {
        let mut active: Vec<_> = self
            .entities
            .read()
            .await
            .iter()
            .filter(|e| e.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        active
    }

    /// Looks up one watermark
    pub async fn find(&self, name: &str) -> Option<EntityWatermark> {
        self.entities
            .read()
            .await
            .iter()
            .find(|e| e.name == name)
            .cloned()
    }

    /// Number of tracked entities
    pub async fn total_count(&self) -> usize {
        self.entities.read().await.len()
    }

    /// Number of active entities
    pub async fn active_count(&self) -> usize {
        self.entities.read().await.iter().filter(|e| e.active).count()
    }

    /// Commits a new last-sync time for an entity
    ///
    /// The full list is written to disk before this returns; the in-memory
    /// list only changes if the write succeeds. The mirror push happens
    /// afterwards and its failure is reported, not raised.
    ///
    /// # Returns
    ///
    /// `Some(MirrorWarning)` if the mirror could not be updated.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::EntityNotFound` for an unknown entity,
    /// `SyncError::WatermarkRegression` if `ts` is earlier than the stored
    /// time, and `SyncError::State` if the file cannot be replaced.
    pub async fn update_timestamp(
        &self,
        name: &str,
        ts: SyncTimestamp,
    ) -> Result<Option<MirrorWarning>> {
        let mut guard = self.entities.write().await;

        let idx = guard
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| SyncError::EntityNotFound(name.to_string()))?;

        if let Some(current) = guard[idx].last_sync_time {
            if ts < current {
                return Err(SyncError::WatermarkRegression {
                    entity: name.to_string(),
                    current: current.to_string(),
                    proposed: ts.to_string(),
                });
            }
        }

        let mut next = guard.clone();
        next[idx].last_sync_time = Some(ts);
        let bytes = encode(&next)?;

        write_atomic(&self.path, &bytes).await?;
        *guard = next;

        tracing::debug!(entity = %name, last_sync_time = %ts, "Watermark committed");

        let warning = match self.mirror {
            Some(ref m) => push_mirror(m, bytes).await,
            None => None,
        };
        Ok(warning)
    }

    /// Checks that every active entity has a query template
    ///
    /// Inactive entities are not checked.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Template` listing every active entity without a
    /// `<dir>/<entity>.sql` file.
    pub async fn validate_templates(&self, dir: &Path) -> Result<()> {
        let active = self.active().await;
        let templates = TemplateStore::new(dir);
        let missing = templates.missing(active.iter().map(|e| e.name.as_str()));

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Template(format!(
                "missing SQL files for entities: {}",
                missing.join(", ")
            )))
        }
    }
}

async fn fetch_mirror(mirror: &StateMirror) -> Option<Vec<EntityWatermark>> {
    let fetched =
        tokio::time::timeout(MIRROR_FETCH_TIMEOUT, mirror.store.download_bytes(&mirror.key)).await;

    match fetched {
        Ok(Ok(Some(bytes))) => match decode(&bytes) {
            Ok(entities) => Some(entities),
            Err(e) => {
                tracing::warn!(key = %mirror.key, error = %e, "Mirrored state is invalid; using local file");
                None
            }
        },
        Ok(Ok(None)) => {
            tracing::info!(key = %mirror.key, "No mirrored state found; using local file");
            None
        }
        Ok(Err(e)) => {
            tracing::warn!(key = %mirror.key, error = %e, "Failed to fetch mirrored state; using local file");
            None
        }
        Err(_) => {
            tracing::warn!(
                key = %mirror.key,
                timeout_secs = MIRROR_FETCH_TIMEOUT.as_secs(),
                "Timed out fetching mirrored state; using local file"
            );
            None
        }
    }
}

/// Reads the local file for merging; unreadable or invalid content is ignored
async fn read_local(path: &Path) -> Option<Vec<EntityWatermark>> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match decode(&bytes) {
        Ok(entities) => Some(entities),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Ignoring invalid local state while merging with mirror"
            );
            None
        }
    }
}

/// Raises mirrored watermarks that are behind the local copy
///
/// Membership and the active flag always come from the mirror.
fn keep_newer_local(mirrored: &mut [EntityWatermark], local: &[EntityWatermark]) {
    for entity in mirrored.iter_mut() {
        let Some(local_time) = local
            .iter()
            .find(|l| l.name == entity.name)
            .and_then(|l| l.last_sync_time)
        else {
            continue;
        };
        if entity.last_sync_time.map_or(true, |remote| local_time > remote) {
            tracing::warn!(
                entity = %entity.name,
                local = %local_time,
                mirror = %entity
                    .last_sync_time
                    .map(|t| t.to_string())
                    .unwrap_or_default(),
                "Mirrored watermark is behind the local file; keeping the local value"
            );
            entity.last_sync_time = Some(local_time);
        }
    }
}

async fn push_mirror(mirror: &StateMirror, bytes: Vec<u8>) -> Option<MirrorWarning> {
    let pushed =
        tokio::time::timeout(MIRROR_PUSH_TIMEOUT, mirror.store.upload_bytes(&mirror.key, bytes))
            .await;

    let reason = match pushed {
        Ok(Ok(())) => return None,
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {}s", MIRROR_PUSH_TIMEOUT.as_secs()),
    };

    tracing::warn!(key = %mirror.key, reason = %reason, "Failed to push state to mirror");
    Some(MirrorWarning(reason))
}

/// Parses and checks a state document
fn decode(bytes: &[u8]) -> Result<Vec<EntityWatermark>> {
    let entities: Vec<EntityWatermark> = serde_json::from_slice(bytes)
        .map_err(|e| SyncError::State(format!("invalid state JSON: {e}")))?;

    let mut seen = HashSet::new();
    for entity in &entities {
        entity.validate_name().map_err(SyncError::State)?;
        if !seen.insert(entity.name.as_str()) {
            return Err(SyncError::State(format!(
                "entity '{}' appears more than once",
                entity.name
            )));
        }
    }
    Ok(entities)
}

/// Serializes the list sorted by name with two-space indentation
fn encode(entities: &[EntityWatermark]) -> Result<Vec<u8>> {
    let mut sorted: Vec<&EntityWatermark> = entities.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(serde_json::to_vec_pretty(&sorted)?)
}

/// Sibling temp file used for atomic replacement
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `bytes` to `path` via a temp file and rename
///
/// On rename failure the temp file is removed and the original is untouched.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);

    if let Err(e) = write_synced(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(SyncError::State(format!(
            "cannot write {}: {}",
            tmp.display(),
            e
        )));
    }

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(SyncError::State(format!(
            "cannot replace {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}
