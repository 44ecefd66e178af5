//! Session synchronization for a single cleaning job.
//!
//! `Session` is the display-free value holding everything the front-end shows:
//! job snapshot, row page, cell drafts, current view, request flags and the
//! last surfaced error. Remote work is split into `begin_*` (take a ticket,
//! build the request) and `finish_*` (apply the response if its ticket is still
//! current, otherwise discard it). `SessionController` composes both halves
//! around a `JobService`.

pub mod controller;
pub mod edits;
pub mod recovery;
pub mod rows;
pub mod sequence;
pub mod state;
pub mod view;

#[cfg(test)]
pub(crate) mod mock;

pub use controller::{CommitOutcome, SessionController};
pub use edits::{BulkForm, BulkMode, DraftBuffer};
pub use recovery::{Recovery, SurfacedError};
pub use rows::{RowPageCache, RowQuery};
pub use sequence::{SequenceTracker, Slot, Ticket};
pub use state::{JobSessionState, StatePatch};
pub use view::{View, ViewRouter};

use thiserror::Error;
use tracing::debug;

use crate::error::{ApiError, AppResult};
use crate::model::{EditOutcome, EditRecord, Issue, Job, RowPage};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("no active job")]
    NoActiveJob,
    #[error("row '{0}' is not on the current page")]
    UnknownRow(String),
    #[error("column '{0}' is not a canonical column of this dataset")]
    UnknownColumn(String),
    #[error("upload needs a non-empty file name")]
    MissingFileName,
    #[error("unsupported page size {0} (expected one of 5, 10, 20, 50)")]
    UnsupportedPageSize(u64),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            SessionError::Api(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    Discarded,
}

/// Advisory UI flags. They gate affordances; nothing waits on them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFlags {
    in_flight: u32,
    exporting: bool,
}

impl RequestFlags {
    pub fn loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn exporting(&self) -> bool {
        self.exporting
    }
}

#[derive(Debug, Clone)]
pub struct RowsRequest {
    pub ticket: Ticket,
    pub job_id: String,
    pub query: RowQuery,
}

/// Request against one slot of the active job.
#[derive(Debug, Clone)]
pub struct SlotRequest {
    pub ticket: Ticket,
    pub job_id: String,
}

#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub job_id: String,
    pub job_ticket: Ticket,
    pub issues_ticket: Ticket,
    pub validation_ticket: Ticket,
}

/// Edit or bulk request. Its response owns both the issue list and the
/// validation summary, each under its own ticket.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    pub job_id: String,
    pub issues_ticket: Ticket,
    pub validation_ticket: Ticket,
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub job_id: String,
    epoch: u64,
}

/// Result of a successful edit or bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationApplied {
    /// Validation and issues were replaced from the response.
    pub merged: bool,
    /// The rows view is active, so the current page must be refetched.
    pub refetch_rows: bool,
}

#[derive(Debug)]
pub struct Session {
    pub(crate) state: JobSessionState,
    pub(crate) rows: RowPageCache,
    pub(crate) drafts: DraftBuffer,
    pub(crate) view: ViewRouter,
    pub(crate) flags: RequestFlags,
    pub(crate) sequence: SequenceTracker,
    pub(crate) last_error: Option<SurfacedError>,
}

impl Session {
    pub fn new(page_size: u64) -> Self {
        Self {
            state: JobSessionState::default(),
            rows: RowPageCache::new(page_size),
            drafts: DraftBuffer::default(),
            view: ViewRouter::default(),
            flags: RequestFlags::default(),
            sequence: SequenceTracker::default(),
            last_error: None,
        }
    }

    pub fn state(&self) -> &JobSessionState {
        &self.state
    }

    pub fn job(&self) -> Option<&Job> {
        self.state.job()
    }

    pub fn issues(&self) -> &[Issue] {
        self.state.issues()
    }

    pub fn rows(&self) -> &RowPageCache {
        &self.rows
    }

    pub fn drafts(&self) -> &DraftBuffer {
        &self.drafts
    }

    pub fn view(&self) -> View {
        self.view.current()
    }

    pub fn flags(&self) -> RequestFlags {
        self.flags
    }

    pub fn last_error(&self) -> Option<&SurfacedError> {
        self.last_error.as_ref()
    }

    /// Full teardown back to the pre-job state.
    pub fn reset(&mut self) {
        self.state.clear(&mut self.rows);
        self.drafts.discard_all();
        self.sequence.invalidate_all();
        self.view.reset();
    }

    pub fn select_view(&mut self, view: View) -> Result<(), SessionError> {
        if self.view.select(view, self.state.has_job()) {
            Ok(())
        } else {
            Err(SessionError::NoActiveJob)
        }
    }

    pub fn set_draft(&mut self, row_id: &str, column: &str, text: impl Into<String>) {
        self.drafts.set(row_id, column, text);
    }

    /// Field exit for a cell: the edit record to send, or `None` when the
    /// draft is absent or unchanged.
    pub fn take_commit(&mut self, row_id: &str, column: &str) -> Option<EditRecord> {
        self.drafts.take_commit(row_id, column, self.rows.page())
    }

    /// An edit must target a row of the current page and a canonical column.
    pub fn check_edit_target(&self, row_id: &str, column: &str) -> Result<(), SessionError> {
        self.check_column(column)?;
        let on_page = self.rows.page().map(|p| p.row(row_id).is_some()).unwrap_or(false);
        if !on_page {
            return Err(SessionError::UnknownRow(row_id.to_string()));
        }
        Ok(())
    }

    pub fn check_column(&self, column: &str) -> Result<(), SessionError> {
        if !self.state.has_job() {
            return Err(SessionError::NoActiveJob);
        }
        if !self.state.canonical_columns().iter().any(|c| c == column) {
            return Err(SessionError::UnknownColumn(column.to_string()));
        }
        Ok(())
    }

    fn active_job_id(&self) -> Result<String, SessionError> {
        self.state.job_id().map(str::to_string).ok_or(SessionError::NoActiveJob)
    }

    fn start_request(&mut self) {
        self.last_error = None;
        self.flags.in_flight += 1;
    }

    fn end_request(&mut self) {
        self.flags.in_flight = self.flags.in_flight.saturating_sub(1);
    }

    /// Common settle step for fetches: `Ok(Some)` when the value should be
    /// applied, `Ok(None)` when it was superseded. Failures are routed through
    /// recovery unless they belong to a cleared session or a superseded
    /// non-NotFound request.
    fn settle<T>(&mut self, ticket: Ticket, result: AppResult<T>) -> Result<Option<T>, SessionError> {
        self.end_request();
        match result {
            Ok(value) if self.sequence.is_current(ticket) => Ok(Some(value)),
            Ok(_) => {
                debug!(target: "databuddy", "discarding stale {:?} response (seq={})", ticket.slot(), ticket.seq());
                Ok(None)
            }
            Err(err) => {
                let relevant = self.sequence.same_epoch(ticket)
                    && (self.sequence.is_current(ticket) || err.is_not_found());
                if relevant {
                    recovery::handle_failure(self, &err);
                } else {
                    debug!(target: "databuddy", "dropping failure of stale {:?} request: {}", ticket.slot(), err);
                }
                Err(SessionError::Api(err))
            }
        }
    }

    pub fn begin_upload(&mut self) -> Ticket {
        self.start_request();
        self.sequence.issue(Slot::Upload)
    }

    /// A new job replaces whatever was there and opens the rows view. The
    /// reset retires every request still outstanding for the previous job.
    pub fn finish_upload(&mut self, ticket: Ticket, result: AppResult<Job>) -> Result<Applied, SessionError> {
        let Some(job) = self.settle(ticket, result)? else { return Ok(Applied::Discarded) };
        self.reset();
        self.state.initialize(job);
        self.view.select(View::Rows, true);
        Ok(Applied::Applied)
    }

    pub fn begin_job_refresh(&mut self) -> Result<RefreshRequest, SessionError> {
        let job_id = self.active_job_id()?;
        self.start_request();
        let job_ticket = self.sequence.issue(Slot::Job);
        let issues_ticket = self.sequence.issue(Slot::Issues);
        let validation_ticket = self.sequence.issue(Slot::Validation);
        Ok(RefreshRequest { job_id, job_ticket, issues_ticket, validation_ticket })
    }

    pub fn finish_job_refresh(&mut self, req: &RefreshRequest, result: AppResult<Job>) -> Result<Applied, SessionError> {
        let Some(job) = self.settle(req.job_ticket, result)? else { return Ok(Applied::Discarded) };
        let keep_validation = !self.sequence.is_current(req.validation_ticket);
        let keep_issues = !self.sequence.is_current(req.issues_ticket);
        if self.state.replace_snapshot(job, keep_validation, keep_issues) {
            Ok(Applied::Applied)
        } else {
            Ok(Applied::Discarded)
        }
    }

    pub fn begin_issues_fetch(&mut self) -> Result<SlotRequest, SessionError> {
        let job_id = self.active_job_id()?;
        self.start_request();
        Ok(SlotRequest { ticket: self.sequence.issue(Slot::Issues), job_id })
    }

    pub fn finish_issues_fetch(&mut self, ticket: Ticket, result: AppResult<Vec<Issue>>) -> Result<Applied, SessionError> {
        let Some(issues) = self.settle(ticket, result)? else { return Ok(Applied::Discarded) };
        self.state.merge(StatePatch::issues(issues));
        Ok(Applied::Applied)
    }

    pub fn begin_rows_fetch(&mut self) -> Result<RowsRequest, SessionError> {
        let job_id = self.active_job_id()?;
        self.start_request();
        let ticket = self.sequence.issue(Slot::Rows);
        Ok(RowsRequest { ticket, job_id, query: self.rows.query().clone() })
    }

    /// Installs the page wholesale; drafts typed against the old page are dropped.
    pub fn finish_rows_fetch(&mut self, ticket: Ticket, result: AppResult<RowPage>) -> Result<Applied, SessionError> {
        let Some(page) = self.settle(ticket, result)? else { return Ok(Applied::Discarded) };
        self.rows.install(page);
        self.drafts.discard_all();
        Ok(Applied::Applied)
    }

    /// Edits and bulk operations take an issues and a validation ticket: their
    /// response replaces both.
    pub fn begin_mutation(&mut self) -> Result<MutationRequest, SessionError> {
        let job_id = self.active_job_id()?;
        self.start_request();
        let issues_ticket = self.sequence.issue(Slot::Issues);
        let validation_ticket = self.sequence.issue(Slot::Validation);
        Ok(MutationRequest { job_id, issues_ticket, validation_ticket })
    }

    /// All-or-nothing: a failure merges nothing and requests no refetch. On
    /// success the validation summary and the issue list are each replaced
    /// unless a newer request owns that slot. A fully superseded success still
    /// requests the refetch, since the rows changed on the service either way.
    pub fn finish_mutation(&mut self, req: &MutationRequest, result: AppResult<EditOutcome>) -> Result<MutationApplied, SessionError> {
        self.end_request();
        match result {
            Ok(outcome) => {
                if !self.sequence.same_epoch(req.issues_ticket) {
                    return Ok(MutationApplied { merged: false, refetch_rows: false });
                }
                let patch = StatePatch {
                    validation: self
                        .sequence
                        .is_current(req.validation_ticket)
                        .then_some(outcome.validation),
                    issues: self.sequence.is_current(req.issues_ticket).then_some(outcome.issues),
                };
                let merged = patch != StatePatch::default() && self.state.merge(patch);
                Ok(MutationApplied { merged, refetch_rows: self.view.is_rows_active() })
            }
            Err(err) => {
                if self.sequence.same_epoch(req.issues_ticket) {
                    recovery::handle_failure(self, &err);
                }
                Err(SessionError::Api(err))
            }
        }
    }

    pub fn begin_delete(&mut self) -> Result<SlotRequest, SessionError> {
        let job_id = self.active_job_id()?;
        self.start_request();
        Ok(SlotRequest { ticket: self.sequence.issue(Slot::Job), job_id })
    }

    pub fn finish_delete(&mut self, ticket: Ticket, result: AppResult<()>) -> Result<(), SessionError> {
        self.end_request();
        match result {
            Ok(()) => {
                if self.sequence.same_epoch(ticket) {
                    self.reset();
                }
                Ok(())
            }
            Err(err) => {
                if self.sequence.same_epoch(ticket) {
                    recovery::handle_failure(self, &err);
                }
                Err(SessionError::Api(err))
            }
        }
    }

    pub fn begin_export(&mut self) -> Result<ExportRequest, SessionError> {
        let job_id = self.active_job_id()?;
        self.last_error = None;
        self.flags.exporting = true;
        Ok(ExportRequest { job_id, epoch: self.sequence.epoch() })
    }

    /// Hands the artifact bytes back to the caller for saving.
    pub fn finish_export(&mut self, req: &ExportRequest, result: AppResult<Vec<u8>>) -> Result<Vec<u8>, SessionError> {
        self.flags.exporting = false;
        match result {
            Ok(bytes) => Ok(bytes),
            Err(err) => {
                if req.epoch == self.sequence.epoch() {
                    recovery::handle_failure(self, &err);
                }
                Err(SessionError::Api(err))
            }
        }
    }
}
