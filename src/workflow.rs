//! Planning workflow over every declared definition.
//!
//! Definitions are evaluated concurrently with a bounded number of lookups in
//! flight. The report keeps the declaration order regardless of completion
//! order, and a failure is recorded in the failing definition's slot without
//! affecting its siblings. Live objects no definition declares are listed
//! alongside the entries.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ControlConfig;
use crate::connection::LiveResource;
use crate::definition::Definition;
use crate::error::{ControlError, Result};
use crate::planner::{DefinitionPlan, PlanBuilder, PlanId, RequiredAction};
use crate::uncontrolled::UncontrolledFinder;

/// Cancels a planning run.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

/// Cancellation signal observed by a planning run.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: watch::Receiver<bool>,
}

impl CancelHandle {
    /// Creates a handle and the signal it controls.
    #[must_use]
    pub fn new() -> (Self, CancelSignal) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, CancelSignal { receiver })
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Returns another signal controlled by this handle.
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl CancelSignal {
    /// A signal that is never raised.
    #[must_use]
    pub fn never() -> Self {
        let (_, signal) = CancelHandle::new();
        signal
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Completes when cancellation is requested.
    ///
    /// Never completes if the handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Why a definition could not be planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The dialect cannot normalize the definition's type.
    UnsupportedDialect,
    /// A live-state or change-log lookup failed.
    LiveStateLookup,
    /// The resulting plan entry was inconsistent.
    InvalidPlan,
    /// Anything else.
    Other,
}

impl FailureKind {
    /// Classifies an error.
    #[must_use]
    pub const fn of(error: &ControlError) -> Self {
        match error {
            ControlError::Dialect(_) => Self::UnsupportedDialect,
            ControlError::Lookup(_) => Self::LiveStateLookup,
            ControlError::Plan(_) => Self::InvalidPlan,
            _ => Self::Other,
        }
    }

    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedDialect => "unsupported_dialect",
            Self::LiveStateLookup => "live_state_lookup",
            Self::InvalidPlan => "invalid_plan",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlanEntry {
    /// The definition was planned.
    Planned(DefinitionPlan),
    /// The definition could not be planned.
    Failed {
        /// Plan id the entry would have had.
        id: PlanId,
        /// Failure classification.
        kind: FailureKind,
        /// Error message.
        error: String,
    },
}

impl PlanEntry {
    /// Plan id of the entry.
    #[must_use]
    pub const fn id(&self) -> &PlanId {
        match self {
            Self::Planned(plan) => plan.id(),
            Self::Failed { id, .. } => id,
        }
    }

    /// The plan, if the definition was planned.
    #[must_use]
    pub const fn plan(&self) -> Option<&DefinitionPlan> {
        match self {
            Self::Planned(plan) => Some(plan),
            Self::Failed { .. } => None,
        }
    }

    /// Returns true for failures and `ERROR` actions.
    #[must_use]
    pub fn requires_attention(&self) -> bool {
        match self {
            Self::Planned(plan) => plan.required_action() == RequiredAction::Error,
            Self::Failed { .. } => true,
        }
    }
}

/// Counters over a report's entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// `NOOP` entries.
    pub noop: usize,
    /// `CREATE` entries.
    pub create: usize,
    /// `APPLY` entries.
    pub apply: usize,
    /// `REAPPLY` entries.
    pub reapply: usize,
    /// `ERROR` entries.
    pub error: usize,
    /// Failed entries.
    pub failed: usize,
}

impl PlanSummary {
    fn from_entries(entries: &[PlanEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry.plan().map(DefinitionPlan::required_action) {
                Some(RequiredAction::Noop) => summary.noop += 1,
                Some(RequiredAction::Create) => summary.create += 1,
                Some(RequiredAction::Apply) => summary.apply += 1,
                Some(RequiredAction::Reapply) => summary.reapply += 1,
                Some(RequiredAction::Error) => summary.error += 1,
                None => summary.failed += 1,
            }
        }
        summary
    }

    /// Number of entries that need something done.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.create + self.apply + self.reapply
    }
}

/// Aggregate plan of a run.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    /// When the plan was built.
    pub created_at: DateTime<Utc>,
    /// Fingerprint of the declared definition set.
    pub definitions_hash: String,
    /// Entries in declaration order.
    pub entries: Vec<PlanEntry>,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// Definitions not evaluated because of cancellation.
    pub skipped: usize,
    /// Counters over `entries`.
    pub summary: PlanSummary,
    /// Live objects no definition declares; absent when cancelled or when
    /// the listing failed.
    pub uncontrolled: Option<Vec<LiveResource>>,
}

impl PlanReport {
    /// Returns true if any entry failed or requires `ERROR`.
    #[must_use]
    pub fn requires_attention(&self) -> bool {
        self.entries.iter().any(PlanEntry::requires_attention)
    }

    /// Returns true if every planned entry is `NOOP` and nothing failed or was skipped.
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.summary.noop == self.entries.len() && self.skipped == 0
    }
}

/// Plans every definition of a configuration.
#[derive(Debug, Clone)]
pub struct PlanWorkflow {
    builder: PlanBuilder,
    definitions: Vec<Definition>,
    parallelism: usize,
    definitions_hash: String,
    uncontrolled: UncontrolledFinder,
}

impl PlanWorkflow {
    /// Creates a workflow for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a reapply guard pattern is invalid.
    pub fn new(config: &ControlConfig) -> Result<Self> {
        Ok(Self {
            builder: PlanBuilder::from_config(config)?,
            definitions: config.definitions.clone(),
            parallelism: config.parallelism.max(1),
            definitions_hash: config.definitions_hash(),
            uncontrolled: UncontrolledFinder::from_config(config),
        })
    }

    /// Plans all definitions.
    ///
    /// Definitions not started when `cancel` is raised are neither looked up
    /// nor reported; already completed entries are kept.
    pub async fn plan_all(&self, cancel: &CancelSignal) -> PlanReport {
        info!(
            "Planning {} definitions with up to {} concurrent lookups",
            self.definitions.len(),
            self.parallelism
        );

        let outcomes: Vec<Option<PlanEntry>> = stream::iter(&self.definitions)
            .map(|definition| self.evaluate(definition, cancel))
            .buffered(self.parallelism)
            .collect()
            .await;

        let total = outcomes.len();
        let entries: Vec<PlanEntry> = outcomes.into_iter().flatten().collect();
        let skipped = total - entries.len();
        let cancelled = skipped > 0 || cancel.is_cancelled();
        if cancelled {
            warn!("Planning cancelled, {skipped} definitions skipped");
        }

        let summary = PlanSummary::from_entries(&entries);
        info!(
            "Plan complete: {} to create, {} to apply, {} to reapply, {} errors, {} failed",
            summary.create, summary.apply, summary.reapply, summary.error, summary.failed
        );

        let uncontrolled = if cancelled {
            None
        } else {
            match self.uncontrolled.find().await {
                Ok(found) => {
                    if !found.is_empty() {
                        info!("{} uncontrolled objects on the server", found.len());
                    }
                    Some(found)
                }
                Err(e) => {
                    warn!("Failed to list uncontrolled objects: {e}");
                    None
                }
            }
        };

        PlanReport {
            created_at: Utc::now(),
            definitions_hash: self.definitions_hash.clone(),
            entries,
            cancelled,
            skipped,
            summary,
            uncontrolled,
        }
    }

    async fn evaluate(&self, definition: &Definition, cancel: &CancelSignal) -> Option<PlanEntry> {
        if cancel.is_cancelled() {
            debug!("Skipping {definition}");
            return None;
        }

        Some(match self.builder.build(definition).await {
            Ok(plan) => PlanEntry::Planned(plan),
            Err(e) => {
                let id = PlanId::for_definition(definition);
                let kind = FailureKind::of(&e);
                warn!("Failed to plan {id} ({kind}): {e}");
                PlanEntry::Failed {
                    id,
                    kind,
                    error: e.to_string(),
                }
            }
        })
    }
}

/// Plans every definition of `config`.
///
/// # Errors
///
/// Returns an error if the workflow cannot be set up. Per-definition failures
/// are reported as [`PlanEntry::Failed`] instead.
pub async fn build_plan_for_all(config: &ControlConfig, cancel: &CancelSignal) -> Result<PlanReport> {
    Ok(PlanWorkflow::new(config)?.plan_all(cancel).await)
}
