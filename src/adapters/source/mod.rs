//! Row source abstraction
//!
//! A row source runs one parameterized query per entity and hands back a
//! forward-only cursor. Every query receives exactly two named parameters,
//! [`START_PARAM`] and [`END_PARAM`], bound to the sync window.

pub mod row;
pub mod traits;

pub use row::RowBuffer;
pub use traits::{RowCursor, RowSource};

use crate::domain::{SourceError, SyncTimestamp};

/// Name of the window-start parameter in query templates
pub const START_PARAM: &str = "startDate";

/// Name of the window-end parameter in query templates
pub const END_PARAM: &str = "tillDate";

/// Values bound to a query's named parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    /// Lower bound of the window (previous watermark or lookback start)
    pub start: SyncTimestamp,

    /// Upper bound of the window (captured once per run)
    pub end: SyncTimestamp,
}

impl WindowParams {
    /// Creates the parameter set for a window
    pub fn new(start: SyncTimestamp, end: SyncTimestamp) -> Self {
        Self { start, end }
    }

    /// Looks up a parameter by its template name
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Parameter` for names other than `startDate` and `tillDate`.
    pub fn value_of(&self, name: &str) -> Result<SyncTimestamp, SourceError> {
        match name {
            START_PARAM => Ok(self.start),
            END_PARAM => Ok(self.end),
            other => Err(SourceError::Parameter(format!(
                "unknown parameter '{other}', expected {START_PARAM} or {END_PARAM}"
            ))),
        }
    }
}
