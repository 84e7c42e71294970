//! Bounded-concurrency transfer engine
//!
//! Units are handed to a pool of at most [`TransferEngine::MAX_PARALLEL`]
//! workers. Every failure is collected, so one broken unit never stops the
//! others. Cancellation stops launching new units; units already in flight
//! always run to their end.

use crate::error::{Cause, ConsolidatedError, Result, TransferError};
use crate::fs::FileSystem;
use crate::job::{self, JobContext, UnitOutcome};
use crate::report::{TransferReport, UnitReport};
use crate::template::TemplatingHandler;
use crate::unit::{Direction, TransferUnit};
use futures_util::FutureExt;
use std::any::Any;
use std::ops::{BitOr, BitOrAssign};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Aggregated state of a run.
///
/// Flags accumulate as units end; the most severe one decides the result:
/// critical, then failed, then interrupted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunState(u8);

impl RunState {
    pub const SUCCEEDED: RunState = RunState(0);
    pub const FAILED: RunState = RunState(1);
    pub const INTERRUPTED: RunState = RunState(1 << 1);
    pub const CRITICAL: RunState = RunState(1 << 2);

    pub fn contains(self, other: RunState) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_succeeded(self) -> bool {
        self.0 == 0
    }

    pub fn is_failed(self) -> bool {
        self.contains(Self::FAILED)
    }

    pub fn is_interrupted(self) -> bool {
        self.contains(Self::INTERRUPTED)
    }

    pub fn is_critical(self) -> bool {
        self.contains(Self::CRITICAL)
    }
}

impl BitOr for RunState {
    type Output = RunState;

    fn bitor(self, rhs: RunState) -> RunState {
        RunState(self.0 | rhs.0)
    }
}

impl BitOrAssign for RunState {
    fn bitor_assign(&mut self, rhs: RunState) {
        self.0 |= rhs.0;
    }
}

type JobResult = std::result::Result<
    std::result::Result<UnitOutcome, crate::error::UnitError>,
    Box<dyn Any + Send>,
>;

pub struct TransferEngine {
    ctx: JobContext,
    max_par: usize,
}

impl TransferEngine {
    /// Upper bound of the worker pool, whatever is requested
    pub const MAX_PARALLEL: usize = 10;

    pub fn new(
        source_fs: Arc<dyn FileSystem>,
        destination_fs: Arc<dyn FileSystem>,
        direction: Direction,
        max_par: usize,
    ) -> Self {
        Self {
            ctx: JobContext {
                source_fs,
                destination_fs,
                direction,
                templating: None,
            },
            max_par: max_par.clamp(1, Self::MAX_PARALLEL),
        }
    }

    pub fn with_templating(mut self, handler: Arc<dyn TemplatingHandler>) -> Self {
        self.ctx.templating = Some(handler);
        self
    }

    pub fn direction(&self) -> Direction {
        self.ctx.direction
    }

    /// Effective parallelism cap, after clamping
    pub fn max_par(&self) -> usize {
        self.max_par
    }

    /// Transfer every unit, `max_par` at a time.
    ///
    /// Returns the per-unit report when every unit ended without error.
    /// Otherwise every cause is collected and the worst state wins: a
    /// crashed worker makes the run [`TransferError::Critical`], a failed unit
    /// [`TransferError::Failed`], and cancellation
    /// [`TransferError::Interrupted`]. The error still carries the report of
    /// the units that ended well, see [`TransferError::report`].
    pub async fn run(
        &self,
        units: Vec<TransferUnit>,
        cancel: &CancellationToken,
    ) -> Result<TransferReport> {
        if units.is_empty() {
            debug!("Nothing to transfer");
            return Ok(TransferReport::default());
        }

        let pool = self.max_par.min(units.len());
        info!(
            "Transferring {} unit(s) with {} worker(s) ({:?})",
            units.len(),
            pool,
            self.ctx.direction
        );

        let ctx = Arc::new(self.ctx.clone());
        let semaphore = Arc::new(Semaphore::new(pool));
        let mut workers: JoinSet<(TransferUnit, JobResult)> = JoinSet::new();
        let mut state = RunState::SUCCEEDED;
        let mut errors = ConsolidatedError::new();
        let mut report = TransferReport::default();

        let mut pending = units.into_iter();
        let mut not_launched = 0usize;
        while let Some(unit) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    not_launched = 1 + pending.len();
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!("Worker pool closed: {}", e);
                        state |= RunState::CRITICAL;
                        errors.push(Cause::Worker(e.to_string()));
                        break;
                    }
                },
            };

            let ctx = Arc::clone(&ctx);
            workers.spawn(async move {
                let _permit = permit;
                let result = AssertUnwindSafe(job::transfer(&ctx, &unit))
                    .catch_unwind()
                    .await;
                (unit, result)
            });
        }

        if not_launched > 0 {
            warn!("Cancelled, {} unit(s) not started", not_launched);
            state |= RunState::INTERRUPTED;
        }

        // Drain: in-flight units always finish.
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((unit, Ok(Ok(outcome)))) => report.units.push(UnitReport {
                    source: unit.source,
                    destination: unit.destination,
                    outcome,
                }),
                Ok((_, Ok(Err(e)))) => {
                    error!("{}", e);
                    state |= RunState::FAILED;
                    errors.push(e);
                }
                Ok((unit, Err(panic))) => {
                    let message = format!("{}: {}", unit, panic_message(panic.as_ref()));
                    error!("Worker panicked on {}", message);
                    state |= RunState::CRITICAL;
                    errors.push(Cause::Worker(message));
                }
                Err(e) => {
                    error!("Cannot join worker: {}", e);
                    state |= RunState::CRITICAL;
                    errors.push(Cause::Worker(e.to_string()));
                }
            }
        }

        if state.is_critical() {
            Err(TransferError::Critical(errors.with_report(report)))
        } else if state.is_failed() {
            Err(TransferError::Failed(errors.with_report(report)))
        } else if state.is_interrupted() {
            Err(TransferError::Interrupted(report))
        } else {
            info!("Transfer complete: {}", report);
            Ok(report)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
