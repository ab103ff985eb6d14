//! Self-update orchestration.
//!
//! [`Updater`] checks the release provider for a newer version, downloads and
//! verifies the release, swaps the executable and its assets in place, and
//! then runs the pending data migrations. Each phase undoes its own work when
//! it fails.

pub mod engine;
pub mod state;
pub mod verify;

pub use engine::{Updater, UpdaterBuilder};
pub use state::UpdateState;
pub use verify::verify_installation;
