//! Pool-size reconciliation.
//!
//! A pool is every instance the configured [`PoolMembership`] accepts for a
//! base name. Each call reads the pool, decides, acts and reports:
//!
//! - Scale-up creates the missing members one at a time and waits for each
//!   to become active. The first failure stops the batch.
//! - Scale-down removes the newest members. A failed delete is recorded and
//!   the remaining deletes still run.
//!
//! Calls that count the same instances are serialized through [`PoolLocks`]:
//! per base name in prefix mode, all together in fleet mode.

use std::sync::Arc;

use serde::Serialize;
use stackops_cloud::model::{Instance, InstanceStatus, InstanceTemplate};
use stackops_cloud::CloudApi;
use stackops_id::InstanceId;
use stackops_reconcile::{
    select_for_removal, PoolLocks, PoolMembership, RemovalKey, ScaleDecision, WaitPolicy,
};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Why a scale-up stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateFailureKind {
    /// The control plane refused the create call, or polling failed.
    Rejected,

    /// The instance reached a terminal state other than active.
    Errored,

    /// The instance was still building when the wait timed out.
    TimedOut,
}

/// The creation that aborted a scale-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateFailure {
    pub name: String,

    /// Set when the instance was accepted before it failed.
    pub instance_id: Option<InstanceId>,

    pub kind: CreateFailureKind,
    pub reason: String,
}

impl CreateFailure {
    fn new(name: &str, instance_id: Option<InstanceId>, error: &OrchestratorError) -> Self {
        let kind = match error {
            OrchestratorError::InstanceFailed { .. } => CreateFailureKind::Errored,
            OrchestratorError::WaitTimeout { .. } => CreateFailureKind::TimedOut,
            _ => CreateFailureKind::Rejected,
        };
        Self {
            name: name.to_string(),
            instance_id,
            kind,
            reason: error.to_string(),
        }
    }
}

/// A member that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    pub id: InstanceId,
    pub name: String,
    pub reason: String,
}

/// Outcome of one reconcile or bulk delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub base_name: String,

    /// Members found when the call started.
    pub previous_count: usize,

    pub target_count: usize,

    /// Names of members created and confirmed active, in creation order.
    pub created: Vec<String>,

    /// Ids of members deleted, in deletion order.
    pub deleted: Vec<InstanceId>,

    /// Deletes that failed; the remaining deletes still ran.
    pub failed: Vec<DeleteFailure>,

    /// The creation that stopped a scale-up, if any.
    pub aborted: Option<CreateFailure>,
}

impl ReconcileReport {
    fn new(base_name: &str, previous_count: usize, target_count: usize) -> Self {
        Self {
            base_name: base_name.to_string(),
            previous_count,
            target_count,
            created: Vec::new(),
            deleted: Vec::new(),
            failed: Vec::new(),
            aborted: None,
        }
    }

    /// True if nothing was attempted.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
            && self.deleted.is_empty()
            && self.failed.is_empty()
            && self.aborted.is_none()
    }

    /// True if every planned create and delete succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.aborted.is_none()
    }
}

fn removal_key(instance: &Instance) -> RemovalKey<'_> {
    RemovalKey {
        created_at: instance.created_at,
        name: &instance.name,
        id: instance.id.as_str(),
    }
}

/// Drives a named pool towards a target size.
#[derive(Clone)]
pub struct PoolReconciler {
    cloud: Arc<dyn CloudApi>,
    membership: PoolMembership,
    wait: WaitPolicy,
    locks: PoolLocks,
}

impl PoolReconciler {
    pub fn new(cloud: Arc<dyn CloudApi>, membership: PoolMembership, wait: WaitPolicy) -> Self {
        Self {
            cloud,
            membership,
            wait,
            locks: PoolLocks::new(),
        }
    }

    /// Share pool locks with other reconcilers in the same process.
    pub fn with_locks(mut self, locks: PoolLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn membership(&self) -> PoolMembership {
        self.membership
    }

    /// Current members of the pool.
    pub async fn members(&self, base_name: &str) -> OrchestratorResult<Vec<Instance>> {
        Ok(self
            .cloud
            .list_instances()
            .await?
            .into_iter()
            .filter(|instance| self.membership.is_member(base_name, &instance.name))
            .collect())
    }

    /// Create or delete members until the pool has `target` of them.
    #[instrument(skip(self, template), fields(pool = %base_name))]
    pub async fn reconcile(
        &self,
        base_name: &str,
        target: usize,
        template: &InstanceTemplate,
    ) -> OrchestratorResult<ReconcileReport> {
        let _guard = self.locks.acquire(self.membership.lock_key(base_name)).await;

        let members = self.members(base_name).await?;
        let current = members.len();
        let decision = ScaleDecision::compute(base_name, current, target);
        info!(current, target, decision = decision.label(), "Reconciling pool");

        let mut report = ReconcileReport::new(base_name, current, target);
        match decision {
            ScaleDecision::Noop => {}
            ScaleDecision::Up { names } => self.scale_up(names, template, &mut report).await,
            ScaleDecision::Down { count } => {
                let victims = select_for_removal(members, count, removal_key);
                self.delete_all(victims, &mut report).await;
            }
        }

        info!(
            created = report.created.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            aborted = report.aborted.is_some(),
            "Pool reconciled"
        );
        Ok(report)
    }

    /// Delete up to `count` members, newest first.
    #[instrument(skip(self), fields(pool = %base_name))]
    pub async fn delete_members(
        &self,
        base_name: &str,
        count: usize,
    ) -> OrchestratorResult<ReconcileReport> {
        let _guard = self.locks.acquire(self.membership.lock_key(base_name)).await;

        let members = self.members(base_name).await?;
        if members.is_empty() {
            return Err(OrchestratorError::EmptyPool {
                base_name: base_name.to_string(),
            });
        }

        let current = members.len();
        let count = count.min(current);
        let mut report = ReconcileReport::new(base_name, current, current - count);

        let victims = select_for_removal(members, count, removal_key);
        self.delete_all(victims, &mut report).await;
        Ok(report)
    }

    async fn scale_up(
        &self,
        names: Vec<String>,
        template: &InstanceTemplate,
        report: &mut ReconcileReport,
    ) {
        for name in names {
            match self.create_member(&name, template).await {
                Ok(instance) => {
                    info!(instance_id = %instance.id, name = %instance.name, "Pool member active");
                    report.created.push(instance.name);
                }
                Err(failure) => {
                    error!(name = %failure.name, reason = %failure.reason, "Scale-up aborted");
                    report.aborted = Some(failure);
                    return;
                }
            }
        }
    }

    async fn create_member(
        &self,
        name: &str,
        template: &InstanceTemplate,
    ) -> Result<Instance, CreateFailure> {
        let instance = self
            .cloud
            .create_instance(&template.instantiate(name))
            .await
            .map_err(|e| CreateFailure::new(name, None, &OrchestratorError::from(e)))?;

        debug!(instance_id = %instance.id, name, "Instance accepted, waiting for active");

        let instance_id = instance.id.clone();
        self.wait_for_active(instance)
            .await
            .map_err(|e| CreateFailure::new(name, Some(instance_id), &e))
    }

    /// Poll until the instance is active, fails, or the wait times out.
    pub async fn wait_for_active(&self, instance: Instance) -> OrchestratorResult<Instance> {
        let started = Instant::now();
        let deadline = started + self.wait.timeout;
        let mut attempt = 0u32;
        let mut current = instance;

        loop {
            if current.status == InstanceStatus::Active {
                return Ok(current);
            }
            if current.status.is_terminal() {
                return Err(OrchestratorError::InstanceFailed {
                    instance_id: current.id,
                    name: current.name,
                    status: current.status,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(OrchestratorError::WaitTimeout {
                    instance_id: current.id,
                    name: current.name,
                    elapsed: now - started,
                });
            }

            let delay = self.wait.backoff.delay(attempt).min(deadline - now);
            tokio::time::sleep(delay).await;
            attempt = attempt.saturating_add(1);

            current = self.cloud.get_instance(&current.id).await?;
        }
    }

    async fn delete_all(&self, victims: Vec<Instance>, report: &mut ReconcileReport) {
        for instance in victims {
            match self.cloud.delete_instance(&instance.id).await {
                Ok(()) => {
                    info!(instance_id = %instance.id, name = %instance.name, "Deleted pool member");
                    report.deleted.push(instance.id);
                }
                Err(e) => {
                    warn!(
                        instance_id = %instance.id,
                        name = %instance.name,
                        error = %e,
                        "Failed to delete pool member, continuing"
                    );
                    report.failed.push(DeleteFailure {
                        id: instance.id,
                        name: instance.name,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}
