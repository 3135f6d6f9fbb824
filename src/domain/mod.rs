//! Domain types for Tidemark.
//!
//! The domain layer provides:
//! - **Error types** ([`SyncError`], [`SourceError`])
//! - **Result type alias** ([`Result`])
//! - **Sync timestamps** ([`SyncTimestamp`]) shared by watermarks, windows and file names
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, SyncError>`]:
//!
//! ```rust,no_run
//! use tidemark::domain::Result;
//!
//! fn example() -> Result<()> {
//!     let config = tidemark::config::TidemarkConfig::from_file("tidemark.toml")?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod result;
pub mod timestamp;

pub use errors::{SourceError, SyncError};
pub use result::Result;
pub use timestamp::{SyncTimestamp, TIMESTAMP_FORMAT};
