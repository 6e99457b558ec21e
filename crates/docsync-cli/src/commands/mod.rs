//! Command implementations for docsync-cli

pub mod conflicts;
pub mod decisions;
pub mod status;
pub mod sync;
pub mod watch;

pub use conflicts::{run_conflicts, run_resolve};
pub use decisions::run_decisions;
pub use status::run_status;
pub use sync::run_sync;
pub use watch::run_watch;
