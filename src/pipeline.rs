//! The posting pipeline: acquisition, then generation, then publication.
//!
//! ```text
//! Idle -> Fetching -> Generating -> Publishing -> Done
//!            |            |             |
//!            +------------+-------------+--> Failed(stage)
//! ```
//!
//! Each stage runs once. A failing stage halts the run; nothing is retried
//! across stage boundaries and nothing escalates past [`Pipeline::run`]. The
//! result is a [`RunReport`] that says which stage ended the run and why.

use crate::api::AskAsync;
use crate::attempts::BoundedAttempts;
use crate::feeds::FeedFetcher;
use crate::generator::ContentGenerator;
use crate::models::{DraftPost, PublishReceipt, RetrievedItem, SourceCatalog};
use crate::publisher::{PageTransport, Publisher};
use crate::selector::{SourceAttempt, SourceSelector};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// One of the three pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Acquisition,
    Generation,
    Publication,
}

/// Where a run currently is. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Fetching,
    Generating,
    Publishing,
    Done,
    Failed(Stage),
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }

    /// The stage being worked on, if any.
    pub fn stage(self) -> Option<Stage> {
        match self {
            PipelineState::Fetching => Some(Stage::Acquisition),
            PipelineState::Generating => Some(Stage::Generation),
            PipelineState::Publishing => Some(Stage::Publication),
            _ => None,
        }
    }

    /// Move forward after the current step succeeded.
    ///
    /// `publish` is false for dry runs, where generation leads straight to `Done`.
    pub fn advance(self, publish: bool) -> Self {
        match self {
            PipelineState::Idle => PipelineState::Fetching,
            PipelineState::Fetching => PipelineState::Generating,
            PipelineState::Generating if publish => PipelineState::Publishing,
            PipelineState::Generating | PipelineState::Publishing => PipelineState::Done,
            terminal => terminal,
        }
    }

    /// Fail the stage in progress. Terminal and idle states are unchanged.
    pub fn fail(self) -> Self {
        match self.stage() {
            Some(stage) => PipelineState::Failed(stage),
            None => self,
        }
    }
}

/// How a single stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Why a run stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageFailure {
    AcquisitionExhausted { attempts: usize },
    Generation { error: String },
    Publication { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
}

/// Structured result of one run, suitable for logging or alerting.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub final_state: PipelineState,
    pub dry_run: bool,
    pub stages: Vec<StageOutcome>,
    pub source_failures: Vec<SourceAttempt>,
    pub item: Option<RetrievedItem>,
    pub draft: Option<DraftPost>,
    pub receipt: Option<PublishReceipt>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == PipelineState::Done
    }

    /// The failure that ended the run, if any.
    pub fn failure(&self) -> Option<&StageFailure> {
        self.stages.iter().find_map(|s| s.failure.as_ref())
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// Collects stage outcomes while a run is in flight.
struct RunTracker {
    state: PipelineState,
    publish: bool,
    stages: Vec<StageOutcome>,
    stage_t0: Instant,
}

impl RunTracker {
    fn new(publish: bool) -> Self {
        Self {
            state: PipelineState::Idle,
            publish,
            stages: Vec::new(),
            stage_t0: Instant::now(),
        }
    }

    fn start(&mut self) {
        self.state = self.state.advance(self.publish);
        self.stage_t0 = Instant::now();
        info!(state = ?self.state, "Pipeline state changed");
    }

    fn succeed(&mut self) {
        if let Some(stage) = self.state.stage() {
            self.record(stage, StageStatus::Succeeded, None);
        }
        self.state = self.state.advance(self.publish);
        self.stage_t0 = Instant::now();
        info!(state = ?self.state, "Pipeline state changed");
    }

    fn fail(&mut self, failure: StageFailure) {
        if let Some(stage) = self.state.stage() {
            error!(?stage, ?failure, "Stage failed; halting pipeline");
            self.record(stage, StageStatus::Failed, Some(failure));
        }
        self.state = self.state.fail();
    }

    fn skip(&mut self, stage: Stage) {
        self.stages.push(StageOutcome {
            stage,
            status: StageStatus::Skipped,
            elapsed_ms: 0,
            failure: None,
        });
    }

    fn record(&mut self, stage: Stage, status: StageStatus, failure: Option<StageFailure>) {
        self.stages.push(StageOutcome {
            stage,
            status,
            elapsed_ms: self.stage_t0.elapsed().as_millis() as u64,
            failure,
        });
    }
}

/// Wires the three stages together.
pub struct Pipeline<F, A, T> {
    selector: SourceSelector<F>,
    generator: ContentGenerator<A>,
    publisher: Publisher<T>,
    policy: BoundedAttempts,
    dry_run: bool,
}

impl<F, A, T> Pipeline<F, A, T>
where
    F: FeedFetcher,
    A: AskAsync,
    T: PageTransport,
{
    pub fn new(
        selector: SourceSelector<F>,
        generator: ContentGenerator<A>,
        publisher: Publisher<T>,
        policy: BoundedAttempts,
        dry_run: bool,
    ) -> Self {
        Self {
            selector,
            generator,
            publisher,
            policy,
            dry_run,
        }
    }

    /// Run every stage once, stopping at the first failure.
    #[instrument(level = "info", skip_all, fields(dry_run = self.dry_run))]
    pub async fn run<R: Rng + ?Sized>(&self, catalog: &SourceCatalog, rng: &mut R) -> RunReport {
        let started_at = Utc::now();
        let t0 = Instant::now();
        let mut tracker = RunTracker::new(!self.dry_run);
        let mut report_item = None;
        let mut report_draft = None;
        let mut receipt = None;

        // Acquisition
        tracker.start();
        let acquisition = self.selector.acquire(catalog, &self.policy, rng).await;
        let source_failures = acquisition.failures;

        match acquisition.item {
            None => tracker.fail(StageFailure::AcquisitionExhausted {
                attempts: acquisition.attempts,
            }),
            Some(item) => {
                tracker.succeed();

                // Generation
                match self.generator.try_generate(&item).await {
                    Err(e) => tracker.fail(StageFailure::Generation {
                        error: e.to_string(),
                    }),
                    Ok(draft) => {
                        tracker.succeed();

                        // Publication
                        if self.dry_run {
                            info!(body = %draft.body, "Dry run; not publishing");
                            tracker.skip(Stage::Publication);
                        } else {
                            match self.publisher.try_publish(&draft).await {
                                Ok(r) => {
                                    tracker.succeed();
                                    receipt = Some(r);
                                }
                                Err(e) => tracker.fail(StageFailure::Publication {
                                    error: e.to_string(),
                                }),
                            }
                        }
                        report_draft = Some(draft);
                    }
                }
                report_item = Some(item);
            }
        }

        let final_state = tracker.state;
        if !final_state.is_terminal() {
            warn!(state = ?final_state, "Pipeline stopped in a non-terminal state");
        }

        RunReport {
            started_at,
            finished_at: Utc::now(),
            elapsed_ms: t0.elapsed().as_millis() as u64,
            final_state,
            dry_run: self.dry_run,
            stages: tracker.stages,
            source_failures,
            item: report_item,
            draft: report_draft,
            receipt,
        }
    }
}
