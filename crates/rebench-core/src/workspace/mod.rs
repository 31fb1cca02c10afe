//! Workspace manager: cached mirrors, isolated working copies, snapshots.
//!
//! # Modules
//!
//! - [`mirror`] : `MirrorCache`, one fetch-only mirror per repository slug
//! - [`states`] : `NamedStates`, the append-only `{label, commit}` log
//! - [`manager`]: `WorkspaceManager` git operations and `Workspace`

pub mod manager;
pub mod mirror;
pub mod states;

pub use manager::{Workspace, WorkspaceManager};
pub use mirror::{cache_key, MirrorCache};
pub use states::{NamedState, NamedStates};
