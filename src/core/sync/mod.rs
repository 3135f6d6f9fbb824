//! Incremental sync orchestration
//!
//! - [`coordinator`] - Per-entity loop, failure policy and commits
//! - [`window`] - Window computation from watermarks
//! - [`result`] - Entity and run outcomes
//! - [`cancel`] - Shutdown and deadline handling

pub mod cancel;
pub mod coordinator;
pub mod result;
pub mod window;

pub use cancel::RunGuard;
pub use coordinator::SyncCoordinator;
pub use result::{EntityResult, RunOutcome, RunResult, SetupFailure, SetupFailureKind};
pub use window::RunWindow;
