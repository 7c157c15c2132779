//! Git worktree management for isolated, parallel spec sessions.
//!
//! Each spec runs in its own `git worktree` on a dedicated `<namespace>/<spec-slug>`
//! branch, so the Spec Pipeline and QA Loop can work several specs at once
//! without their file changes colliding. [`WorktreeManager`] owns creation,
//! stats, merge, and cleanup; [`WorktreeState`] is the on-disk record of a
//! single worktree's lifecycle.

pub mod error;
pub mod manager;
pub mod state;

pub use error::WorktreeError;
pub use manager::WorktreeManager;
pub use state::{WorktreeState, WorktreeStats, WorktreeStatus};
