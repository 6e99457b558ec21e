//! Per-cycle reporting

use std::fmt;

use chrono::{DateTime, Utc};
use docsync_content::StableId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detect::Side;

/// What happened to one pair during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum PairOutcome {
    Unchanged,
    Propagated { from: Side },
    /// Both sides already agreed; only the record moved.
    Converged,
    /// `side` is where the deletion started.
    Deleted { side: Side },
    /// Both sides were gone; the pair was forgotten.
    Forgotten,
    /// An externally resolved conflict artifact was written out.
    Resolved { artifact_id: Uuid },
    /// Deferred without being attempted (open conflict, shutdown).
    Skipped { reason: String },
    Failed { error: String },
    Conflicted { artifact_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairReport {
    pub stable_id: StableId,
    #[serde(flatten)]
    pub outcome: PairOutcome,
    /// A side of this pair decoded with conversion notes.
    #[serde(default)]
    pub degraded: bool,
    /// Native writes and deletes made for this pair.
    #[serde(default)]
    pub writes: u32,
}

impl PairReport {
    pub fn new(stable_id: StableId, outcome: PairOutcome) -> Self {
        Self {
            stable_id,
            outcome,
            degraded: false,
            writes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub propagated: usize,
    pub unchanged: usize,
    pub converged: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub conflicted: usize,
    pub degraded: usize,
    pub unresolved_links: usize,
    pub outcomes: Vec<PairReport>,
}

impl CycleSummary {
    pub fn new(cycle_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id,
            started_at,
            finished_at: started_at,
            propagated: 0,
            unchanged: 0,
            converged: 0,
            deleted: 0,
            skipped: 0,
            failed: 0,
            conflicted: 0,
            degraded: 0,
            unresolved_links: 0,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, report: PairReport) {
        match report.outcome {
            PairOutcome::Unchanged => self.unchanged += 1,
            PairOutcome::Propagated { .. } | PairOutcome::Resolved { .. } => self.propagated += 1,
            PairOutcome::Converged => self.converged += 1,
            PairOutcome::Deleted { .. } | PairOutcome::Forgotten => self.deleted += 1,
            PairOutcome::Skipped { .. } => self.skipped += 1,
            PairOutcome::Failed { .. } => self.failed += 1,
            PairOutcome::Conflicted { .. } => self.conflicted += 1,
        }
        if report.degraded {
            self.degraded += 1;
        }
        self.outcomes.push(report);
    }

    /// Native writes and deletes across all pairs.
    pub fn writes(&self) -> u32 {
        self.outcomes.iter().map(|r| r.writes).sum()
    }

    pub fn outcome_for(&self, stable_id: StableId) -> Option<&PairOutcome> {
        self.outcomes
            .iter()
            .find(|r| r.stable_id == stable_id)
            .map(|r| &r.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PairReport> {
        self.outcomes
            .iter()
            .filter(|r| matches!(r.outcome, PairOutcome::Failed { .. }))
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} propagated, {} unchanged, {} converged, {} deleted, {} skipped, {} failed, {} conflicted",
            self.propagated,
            self.unchanged,
            self.converged,
            self.deleted,
            self.skipped,
            self.failed,
            self.conflicted
        )?;
        if self.degraded > 0 {
            write!(f, " ({} degraded)", self.degraded)?;
        }
        if self.unresolved_links > 0 {
            write!(f, " ({} unresolved links)", self.unresolved_links)?;
        }
        Ok(())
    }
}
