//! Deferred archiving of finished workspaces.
//!
//! Request handlers hand a populated [`Workspace`] to the [`ArchiveQueue`] after the response URL
//! is known. A single worker task takes jobs in order and runs the zip step on the blocking pool.
//! Each job runs once. A failed job is recorded as [`ArchiveStatus::Failed`] and the workspace
//! stays on disk for inspection.
//!
//! Only pending jobs and the most recent failures are held in memory. A completed job is
//! forgotten once its zip is on disk, and later status queries look for the zip instead.

use crate::{PipelineError, PipelineResult};
use dashmap::DashMap;
use hip_files::{
    archive_workspace, HexId, Workspace, WorkspaceKind, WorkspaceService, TEMP_FOLDER_NAME,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ArchiveStatus {
    Pending,
    Completed { archive_path: PathBuf },
    Failed { reason: String },
}

impl ArchiveStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, ArchiveStatus::Pending)
    }
}

/// Failed statuses kept for polling before the oldest is dropped.
const MAX_RETAINED_FAILURES: usize = 256;

type StatusKey = (WorkspaceKind, HexId);

struct ArchiveJob {
    workspace: Workspace,
    done: watch::Sender<ArchiveStatus>,
}

/// Handle on one queued job.
#[derive(Clone, Debug)]
pub struct ArchiveTicket {
    kind: WorkspaceKind,
    token: HexId,
    file_name: String,
    status: watch::Receiver<ArchiveStatus>,
}

impl ArchiveTicket {
    pub fn kind(&self) -> WorkspaceKind {
        self.kind
    }

    pub fn token(&self) -> &HexId {
        &self.token
    }

    /// `archive-<kind>-<token>.zip`
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn status(&self) -> ArchiveStatus {
        self.status.borrow().clone()
    }

    /// Wait until the job has finished.
    ///
    /// # Errors
    ///
    /// [`PipelineError::ArchiveQueueClosed`] if the worker stopped before reporting.
    pub async fn wait(&mut self) -> PipelineResult<ArchiveStatus> {
        self.status
            .wait_for(ArchiveStatus::is_finished)
            .await
            .map(|status| status.clone())
            .map_err(|_| PipelineError::ArchiveQueueClosed)
    }
}

/// Sender side of the archive worker. Cheap to clone.
#[derive(Clone)]
pub struct ArchiveQueue {
    jobs: mpsc::UnboundedSender<ArchiveJob>,
    statuses: Arc<DashMap<StatusKey, ArchiveStatus>>,
    workspaces: WorkspaceService,
}

impl ArchiveQueue {
    /// Start the worker on the current Tokio runtime.
    ///
    /// `workspaces` locates the archives of jobs that are no longer tracked in memory.
    pub fn spawn(workspaces: WorkspaceService) -> Self {
        Self::spawn_retaining(workspaces, MAX_RETAINED_FAILURES)
    }

    fn spawn_retaining(workspaces: WorkspaceService, max_failures: usize) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let statuses = Arc::new(DashMap::new());
        tokio::spawn(run_worker(rx, Arc::clone(&statuses), max_failures));
        Self {
            jobs,
            statuses,
            workspaces,
        }
    }

    /// Queue `workspace` for archiving.
    ///
    /// # Errors
    ///
    /// [`PipelineError::ArchiveQueueClosed`] if the worker is gone.
    pub fn enqueue(&self, workspace: Workspace) -> PipelineResult<ArchiveTicket> {
        let kind = workspace.kind();
        let token = workspace.token().clone();
        let file_name = workspace.archive_file_name();
        let (done, status) = watch::channel(ArchiveStatus::Pending);

        self.statuses
            .insert((kind, token.clone()), ArchiveStatus::Pending);
        if self.jobs.send(ArchiveJob { workspace, done }).is_err() {
            self.statuses.remove(&(kind, token));
            return Err(PipelineError::ArchiveQueueClosed);
        }
        tracing::debug!(%kind, %token, "queued archive job");

        Ok(ArchiveTicket {
            kind,
            token,
            file_name,
            status,
        })
    }

    /// Status of the job for `kind`/`token`.
    ///
    /// Pending and recently failed jobs come from memory. Otherwise an existing zip means the job
    /// completed. `None` when neither is known.
    pub fn status(&self, kind: WorkspaceKind, token: &HexId) -> Option<ArchiveStatus> {
        if let Some(entry) = self.statuses.get(&(kind, token.clone())) {
            return Some(entry.value().clone());
        }
        let archive_path = self.workspaces.archive_path(kind, token);
        archive_path
            .is_file()
            .then_some(ArchiveStatus::Completed { archive_path })
    }
}

async fn run_worker(
    mut jobs: mpsc::UnboundedReceiver<ArchiveJob>,
    statuses: Arc<DashMap<StatusKey, ArchiveStatus>>,
    max_failures: usize,
) {
    let mut failures: VecDeque<StatusKey> = VecDeque::new();

    while let Some(ArchiveJob { workspace, done }) = jobs.recv().await {
        let key = (workspace.kind(), workspace.token().clone());

        let status = match tokio::task::spawn_blocking(move || archive_workspace(&workspace)).await
        {
            Ok(Ok(archive_path)) => ArchiveStatus::Completed { archive_path },
            Ok(Err(e)) => ArchiveStatus::Failed {
                reason: e.to_string(),
            },
            Err(e) => {
                tracing::error!(kind = %key.0, token = %key.1, error = %e, "archive task panicked");
                ArchiveStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        match &status {
            ArchiveStatus::Failed { .. } => {
                statuses.insert(key.clone(), status.clone());
                failures.push_back(key);
                while failures.len() > max_failures {
                    if let Some(oldest) = failures.pop_front() {
                        statuses.remove(&oldest);
                    }
                }
            }
            _ => {
                statuses.remove(&key);
            }
        }
        // The requester may have dropped its ticket; the map still holds the result.
        let _ = done.send(status);
    }
    tracing::debug!("archive queue closed");
}

/// Public download URL of an archive: `<base>/static/temp/<file_name>`.
pub fn download_url(base_url: &str, file_name: &str) -> String {
    format!(
        "{}/static/{}/{}",
        base_url.trim_end_matches('/'),
        TEMP_FOLDER_NAME,
        file_name
    )
}
