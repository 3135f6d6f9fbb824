//! Sync window computation

use crate::adapters::source::WindowParams;
use crate::core::state::EntityWatermark;
use crate::domain::SyncTimestamp;
use serde::Serialize;
use std::fmt;

/// Time range one entity is synced over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunWindow {
    /// Previous watermark, or `end` minus the lookback
    pub start: SyncTimestamp,

    /// Captured once per run and shared by every entity
    pub end: SyncTimestamp,
}

impl RunWindow {
    /// Window for an entity given its watermark
    ///
    /// # Arguments
    ///
    /// * `watermark` - The entity's current state
    /// * `end` - Run end time
    /// * `lookback_days` - Used when the entity has never been synced
    pub fn for_entity(watermark: &EntityWatermark, end: SyncTimestamp, lookback_days: u32) -> Self {
        let start = watermark
            .last_sync_time
            .unwrap_or_else(|| end.minus_days(lookback_days));
        Self { start, end }
    }

    /// Query parameters for this window
    pub fn params(&self) -> WindowParams {
        WindowParams::new(self.start, self.end)
    }
}

impl fmt::Display for RunWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
