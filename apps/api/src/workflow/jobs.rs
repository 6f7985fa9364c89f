//! In-process registry of running and recently finished upload jobs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::workflow::state::WorkflowState;

/// Finished jobs older than this are dropped on the next registration.
const FINISHED_JOB_TTL_MINUTES: i64 = 60;

struct JobEntry {
    status: watch::Receiver<WorkflowState>,
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
}

/// Point-in-time view of a job.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub state: WorkflowState,
    pub started_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
}

impl JobRegistry {
    /// Registers a new job and returns its id plus the handles the workflow task needs.
    pub fn register(
        &self,
        parent: &CancellationToken,
    ) -> (Uuid, watch::Sender<WorkflowState>, CancellationToken) {
        let job_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(WorkflowState::Idle);
        let cancel = parent.child_token();

        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        prune_finished(&mut jobs, Utc::now());
        jobs.insert(
            job_id,
            JobEntry {
                status: rx,
                cancel: cancel.clone(),
                started_at: Utc::now(),
            },
        );

        (job_id, tx, cancel)
    }

    pub fn snapshot(&self, job_id: Uuid) -> Option<JobSnapshot> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(&job_id).map(|entry| JobSnapshot {
            state: entry.status.borrow().clone(),
            started_at: entry.started_at,
        })
    }

    /// Cancels a job. Returns false for unknown ids.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        match jobs.get(&job_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

fn prune_finished(jobs: &mut HashMap<Uuid, JobEntry>, now: DateTime<Utc>) {
    let cutoff = now - Duration::minutes(FINISHED_JOB_TTL_MINUTES);
    let before = jobs.len();
    jobs.retain(|_, entry| {
        // A dropped sender means the task is gone, whatever its last state.
        let sender_gone = entry.status.has_changed().is_err();
        let terminal = entry.status.borrow().is_terminal();
        !((terminal || sender_gone) && entry.started_at < cutoff)
    });
    let pruned = before - jobs.len();
    if pruned > 0 {
        debug!("Pruned {pruned} finished upload jobs");
    }
}
