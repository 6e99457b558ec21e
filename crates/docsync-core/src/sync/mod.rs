//! Sync orchestration
//!
//! A cycle runs in two stages. Stage 1 lists and decodes both stores and
//! assigns every native document to a pair, so the whole identity map is
//! known before any link is rewritten. Stage 2 resolves links, detects,
//! adjudicates, writes and commits each pair independently.

mod engine;
mod pair;
mod retry;
mod scheduler;
mod summary;

pub use engine::SyncEngine;
pub use retry::with_retry;
pub use scheduler::{Scheduler, SchedulerStats};
pub use summary::{CycleSummary, PairOutcome, PairReport};

use std::sync::Arc;

use crate::Result;
use crate::state::StateStore;

/// Run a state store call on the blocking pool.
///
/// Once started the call always completes, even if the awaiting task is
/// cancelled, so a commit is never cut in half.
pub(crate) async fn on_state<T, F>(state: &Arc<dyn StateStore>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn StateStore) -> Result<T> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(state.as_ref())).await?
}
