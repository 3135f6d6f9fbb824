//! Row source traits
//!
//! These traits define what the sync engine needs from a relational source.

use super::{RowBuffer, WindowParams};
use crate::domain::Result;
use async_trait::async_trait;

/// A relational source that can run window queries
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Executes a query template with the window parameters bound
    ///
    /// # Arguments
    ///
    /// * `query` - Template text referencing `:startDate` and `:tillDate`
    /// * `params` - Window bounds
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Connect` if no connection can be obtained and
    /// `SourceError::Query` if the statement is rejected.
    async fn execute(&self, query: &str, params: &WindowParams) -> Result<Box<dyn RowCursor>>;

    /// Checks that the source is reachable
    ///
    /// # Errors
    ///
    /// Returns an error if a trivial round-trip fails.
    async fn ping(&self) -> Result<()>;

    /// Human-readable description with credentials removed
    fn describe(&self) -> String;
}

/// Forward-only, single-pass row cursor
///
/// Callers alternate `next()` and `scan()` until `next()` returns `false`,
/// then call `close()`. At most one row is held at a time.
#[async_trait]
pub trait RowCursor: Send {
    /// Result column names in query order
    fn column_names(&self) -> &[String];

    /// Advances to the next row
    ///
    /// Returns `Ok(false)` once the result set is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Iteration` if the underlying stream fails
    /// mid-iteration.
    async fn next(&mut self) -> Result<bool>;

    /// Renders the current row into `row`
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Scan` if a value cannot be decoded or no row is
    /// current.
    fn scan(&mut self, row: &mut RowBuffer) -> Result<()>;

    /// Releases the cursor and its connection
    async fn close(&mut self) -> Result<()>;
}
