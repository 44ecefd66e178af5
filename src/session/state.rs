//! Job Session State: the single owner of the active job snapshot.
//!
//! Updates always swap whole sub-objects (`dataset`, `validation`, `issues`),
//! never individual nested fields.

use tracing::{info, warn};

use super::rows::RowPageCache;
use crate::model::{DatasetMeta, EditOutcome, Issue, Job, ValidationSummary};

/// Partial replacement applied by `merge`. `validation: Some(None)` clears the
/// summary; `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub validation: Option<Option<ValidationSummary>>,
    pub issues: Option<Vec<Issue>>,
}

impl StatePatch {
    pub fn issues(issues: Vec<Issue>) -> Self {
        Self { validation: None, issues: Some(issues) }
    }
}

impl From<EditOutcome> for StatePatch {
    fn from(outcome: EditOutcome) -> Self {
        Self { validation: Some(outcome.validation), issues: Some(outcome.issues) }
    }
}

#[derive(Debug, Default)]
pub struct JobSessionState {
    job: Option<Job>,
}

impl JobSessionState {
    pub fn initialize(&mut self, job: Job) {
        info!(target: "databuddy", "session initialized for job {} (status={})", job.job_id, job.status);
        self.job = Some(job);
    }

    /// Install a refreshed snapshot of the active job. The current validation
    /// summary or issue list survives when its `keep_*` flag is set, because a
    /// newer request owns it. Returns false if the snapshot belongs to another job.
    pub fn replace_snapshot(&mut self, mut job: Job, keep_validation: bool, keep_issues: bool) -> bool {
        let Some(current) = self.job.as_mut() else { return false };
        if current.job_id != job.job_id {
            warn!(target: "databuddy", "ignoring snapshot for job {} while {} is active", job.job_id, current.job_id);
            return false;
        }
        if keep_validation {
            job.validation = current.validation.take();
        }
        if keep_issues {
            job.issues = std::mem::take(&mut current.issues);
        }
        *current = job;
        true
    }

    /// Returns false when there is no job to merge into.
    pub fn merge(&mut self, patch: StatePatch) -> bool {
        let Some(job) = self.job.as_mut() else { return false };
        if let Some(validation) = patch.validation {
            job.validation = validation;
        }
        if let Some(issues) = patch.issues {
            job.issues = issues;
        }
        true
    }

    /// Back to the pre-job state. The row cache is invalidated alongside.
    pub fn clear(&mut self, rows: &mut RowPageCache) {
        if let Some(job) = self.job.take() {
            info!(target: "databuddy", "session cleared (job {})", job.job_id);
        }
        rows.invalidate();
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job.as_ref().map(|j| j.job_id.as_str())
    }

    pub fn has_job(&self) -> bool {
        self.job.is_some()
    }

    pub fn dataset(&self) -> Option<&DatasetMeta> {
        self.job.as_ref().and_then(|j| j.dataset.as_ref())
    }

    pub fn canonical_columns(&self) -> &[String] {
        self.dataset().map(|d| d.canonical_columns.as_slice()).unwrap_or(&[])
    }

    pub fn validation(&self) -> Option<&ValidationSummary> {
        self.job.as_ref().and_then(|j| j.validation.as_ref())
    }

    pub fn issues(&self) -> &[Issue] {
        self.job.as_ref().map(|j| j.issues.as_slice()).unwrap_or(&[])
    }

    /// Last cell-level issue reported for the cell.
    pub fn issue_for_cell(&self, row_id: &str, column: &str) -> Option<&Issue> {
        self.issues()
            .iter()
            .rev()
            .find(|i| i.row_id.as_deref() == Some(row_id) && i.column.as_deref() == Some(column))
    }
}
