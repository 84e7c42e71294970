//! Reconciliation plans
//!
//! A plan is the ordered edit that turns a live resource collection into a
//! target one. Removals always come first: device names and ports are reused,
//! and a stale entry could collide with, or mask, a newly added one.

use crate::error::{CloudError, Result};
use crate::resource::{Resource, ResourceCollection};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Type of change applied to one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Detach / revoke a live resource
    Remove,
    /// Attach / authorize a target resource
    Add,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Remove => write!(f, "remove"),
            ActionType::Add => write!(f, "add"),
        }
    }
}

/// One planned change
#[derive(Debug, Clone, PartialEq)]
pub struct Action<R> {
    pub action_type: ActionType,
    pub resource: R,
}

/// Performs the backend side of a plan's actions
#[async_trait]
pub trait ResourceApplier<R: Resource>: Send + Sync {
    async fn remove(&self, resource: &R) -> Result<()>;
    async fn add(&self, resource: &R) -> Result<()>;
}

/// Ordered set of changes between a live and a target collection
#[derive(Debug, Clone)]
pub struct Plan<R: Resource> {
    to_remove: ResourceCollection<R>,
    to_add: ResourceCollection<R>,
    unchanged: usize,
}

impl<R: Resource> Plan<R> {
    /// `to_add = target - live`, `to_remove = live - target`, by full equality
    pub fn between(live: &ResourceCollection<R>, target: &ResourceCollection<R>) -> Self {
        let to_remove = live.delta(target);
        Self {
            to_add: target.delta(live),
            unchanged: live.len() - to_remove.len(),
            to_remove,
        }
    }

    pub fn to_add(&self) -> &ResourceCollection<R> {
        &self.to_add
    }

    pub fn to_remove(&self) -> &ResourceCollection<R> {
        &self.to_remove
    }

    pub fn has_changes(&self) -> bool {
        !self.to_add.is_empty() || !self.to_remove.is_empty()
    }

    /// Apply sequence: every removal, then every addition
    pub fn actions(&self) -> Vec<Action<R>> {
        let removes = self.to_remove.iter().map(|r| Action {
            action_type: ActionType::Remove,
            resource: r.clone(),
        });
        let adds = self.to_add.iter().map(|r| Action {
            action_type: ActionType::Add,
            resource: r.clone(),
        });
        removes.chain(adds).collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            add: self.to_add.len(),
            remove: self.to_remove.len(),
            unchanged: self.unchanged,
        }
    }

    /// Execute the plan in order.
    ///
    /// Not transactional: a failure leaves the collection partially
    /// converged, and re-planning against the new live state resumes.
    pub async fn apply(
        &self,
        applier: &dyn ResourceApplier<R>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for action in self.actions() {
            if cancel.is_cancelled() {
                return Err(CloudError::Cancelled);
            }
            tracing::debug!(action = %action.action_type, resource = %action.resource, "Applying");
            match action.action_type {
                ActionType::Remove => applier.remove(&action.resource).await?,
                ActionType::Add => applier.add(&action.resource).await?,
            }
        }
        Ok(())
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub add: usize,
    pub remove: usize,
    pub unchanged: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to add, {} to remove, {} unchanged",
            self.add, self.remove, self.unchanged
        )
    }
}
