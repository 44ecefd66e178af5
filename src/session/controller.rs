//! Async command handlers driving a `Session` against a `JobService`.
//!
//! Every handler follows the same shape: check local preconditions, take a
//! ticket, await the service, hand the result back to the session. Successful
//! edits and bulk operations replace validation and issues and, while the rows
//! view is active, refetch the current page with unchanged parameters.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::edits::BulkForm;
use super::rows::is_supported_page_size;
use super::{Applied, MutationApplied, Session, SessionError, View};
use crate::api::JobService;
use crate::export;
use crate::model::{BulkEditRequest, EditRecord, Filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// No draft, or the draft matched the original value. Nothing was sent.
    Unchanged,
    Committed(MutationApplied),
}

pub struct SessionController<S: JobService> {
    service: S,
    session: Session,
    export_path: PathBuf,
}

impl<S: JobService> SessionController<S> {
    pub fn new(service: S, page_size: u64, export_path: impl Into<PathBuf>) -> Self {
        Self { service, session: Session::new(page_size), export_path: export_path.into() }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn export_path(&self) -> &Path {
        &self.export_path
    }

    pub async fn health(&self) -> Result<String, SessionError> {
        Ok(self.service.health().await?)
    }

    pub async fn upload_file(&mut self, path: &Path) -> Result<(), SessionError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or(SessionError::MissingFileName)?;
        let bytes = tokio::fs::read(path).await.map_err(|e| SessionError::Io {
            context: format!("cannot read {}", path.display()),
            source: e,
        })?;
        self.upload(&name, bytes).await
    }

    /// Create a job from raw bytes. On success the rows view opens and its
    /// page and issues are loaded.
    pub async fn upload(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<(), SessionError> {
        if file_name.trim().is_empty() {
            return Err(SessionError::MissingFileName);
        }
        info!(target: "databuddy", "uploading {} ({} bytes)", file_name, bytes.len());
        let ticket = self.session.begin_upload();
        let result = self.service.create_job(file_name, bytes).await;
        if self.session.finish_upload(ticket, result)? == Applied::Applied {
            self.load_rows().await?;
            self.load_issues().await?;
        }
        Ok(())
    }

    pub async fn refresh(&mut self) -> Result<Applied, SessionError> {
        let req = self.session.begin_job_refresh()?;
        let result = self.service.get_job(&req.job_id).await;
        self.session.finish_job_refresh(&req, result)
    }

    pub async fn load_issues(&mut self) -> Result<Applied, SessionError> {
        let req = self.session.begin_issues_fetch()?;
        let result = self.service.list_issues(&req.job_id).await;
        self.session.finish_issues_fetch(req.ticket, result)
    }

    pub async fn load_rows(&mut self) -> Result<Applied, SessionError> {
        let req = self.session.begin_rows_fetch()?;
        debug!(
            target: "databuddy",
            "fetching rows offset={} limit={} filters={}",
            req.query.offset, req.query.limit, req.query.filters.len()
        );
        let result = self
            .service
            .list_rows(&req.job_id, req.query.offset, req.query.limit, &req.query.filters)
            .await;
        self.session.finish_rows_fetch(req.ticket, result)
    }

    /// Switch views, loading what the target view displays.
    pub async fn select_view(&mut self, view: View) -> Result<(), SessionError> {
        self.session.select_view(view)?;
        match view {
            View::Issues => {
                self.load_issues().await?;
            }
            View::Rows => {
                self.load_rows().await?;
                self.load_issues().await?;
            }
            View::Upload | View::Overview => {}
        }
        Ok(())
    }

    async fn refetch_if_rows_active(&mut self, changed: bool) -> Result<bool, SessionError> {
        if changed && self.session.view.is_rows_active() {
            self.load_rows().await?;
        }
        Ok(changed)
    }

    pub async fn next_page(&mut self) -> Result<bool, SessionError> {
        let changed = self.session.rows.advance();
        self.refetch_if_rows_active(changed).await
    }

    pub async fn prev_page(&mut self) -> Result<bool, SessionError> {
        let changed = self.session.rows.retreat();
        self.refetch_if_rows_active(changed).await
    }

    pub async fn set_page_size(&mut self, limit: u64) -> Result<bool, SessionError> {
        if !is_supported_page_size(limit) {
            return Err(SessionError::UnsupportedPageSize(limit));
        }
        let changed = self.session.rows.set_limit(limit);
        self.refetch_if_rows_active(changed).await
    }

    pub async fn set_filters(&mut self, filters: Vec<Filter>) -> Result<bool, SessionError> {
        for f in &filters {
            self.session.check_column(&f.column)?;
        }
        let changed = self.session.rows.set_filters(filters);
        self.refetch_if_rows_active(changed).await
    }

    pub async fn add_filter(&mut self, filter: Filter) -> Result<bool, SessionError> {
        self.session.check_column(&filter.column)?;
        let changed = self.session.rows.add_filter(filter);
        self.refetch_if_rows_active(changed).await
    }

    pub async fn clear_filters(&mut self) -> Result<bool, SessionError> {
        self.set_filters(Vec::new()).await
    }

    pub fn set_draft(&mut self, row_id: &str, column: &str, text: impl Into<String>) -> Result<(), SessionError> {
        self.session.check_edit_target(row_id, column)?;
        self.session.set_draft(row_id, column, text);
        Ok(())
    }

    /// Field exit for a drafted cell. A draft equal to the original value is
    /// dropped without any network call.
    pub async fn commit_cell(&mut self, row_id: &str, column: &str) -> Result<CommitOutcome, SessionError> {
        self.session.check_edit_target(row_id, column)?;
        let Some(record) = self.session.take_commit(row_id, column) else {
            debug!(target: "databuddy", "commit of {}:{} skipped, value unchanged", row_id, column);
            return Ok(CommitOutcome::Unchanged);
        };
        let applied = self.submit_edits(vec![record]).await?;
        Ok(CommitOutcome::Committed(applied))
    }

    /// Draft and commit in one step.
    pub async fn apply_edit(&mut self, row_id: &str, column: &str, value: &str) -> Result<CommitOutcome, SessionError> {
        self.set_draft(row_id, column, value)?;
        self.commit_cell(row_id, column).await
    }

    async fn submit_edits(&mut self, edits: Vec<EditRecord>) -> Result<MutationApplied, SessionError> {
        let req = self.session.begin_mutation()?;
        info!(target: "databuddy", "applying {} edit(s) to job {}", edits.len(), req.job_id);
        let result = self.service.apply_edits(&req.job_id, &edits).await;
        let applied = self.session.finish_mutation(&req, result)?;
        if applied.refetch_rows {
            self.load_rows().await?;
        }
        Ok(applied)
    }

    pub async fn bulk_edit(&mut self, request: BulkEditRequest) -> Result<MutationApplied, SessionError> {
        self.session.check_column(request.column())?;
        let req = self.session.begin_mutation()?;
        info!(
            target: "databuddy",
            "bulk {} on column {} of job {}",
            request.action_type(), request.column(), req.job_id
        );
        let result = self.service.apply_bulk(&req.job_id, &request).await;
        let applied = self.session.finish_mutation(&req, result)?;
        if applied.refetch_rows {
            self.load_rows().await?;
        }
        Ok(applied)
    }

    pub async fn bulk_form(&mut self, form: BulkForm) -> Result<MutationApplied, SessionError> {
        self.bulk_edit(form.into_request()).await
    }

    pub async fn delete(&mut self) -> Result<(), SessionError> {
        let req = self.session.begin_delete()?;
        info!(target: "databuddy", "deleting job {}", req.job_id);
        let result = self.service.delete_job(&req.job_id).await;
        self.session.finish_delete(req.ticket, result)
    }

    /// Download the export artifact and save it to `dest` (or the configured
    /// export path).
    pub async fn export(&mut self, dest: Option<&Path>) -> Result<PathBuf, SessionError> {
        let dest = dest.map(Path::to_path_buf).unwrap_or_else(|| self.export_path.clone());
        let req = self.session.begin_export()?;
        let result = self.service.export_job(&req.job_id).await;
        let bytes = self.session.finish_export(&req, result)?;
        export::save_artifact(&bytes, &dest)
            .map_err(|e| SessionError::Io { context: format!("cannot save export to {}", dest.display()), source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::model::{ApplyScope, FilterOp};
    use crate::session::mock::{Call, MockJobService};
    use serde_json::json;
    use std::collections::BTreeMap;

    async fn rows_view(n: usize) -> SessionController<MockJobService> {
        let mut ctl = SessionController::new(MockJobService::with_rows(n), 10, "unused.csv");
        ctl.upload("census.csv", b"x".to_vec()).await.unwrap();
        ctl.service().take_calls();
        ctl
    }

    #[tokio::test]
    async fn upload_opens_rows_and_loads_page_and_issues() {
        let mut ctl = SessionController::new(MockJobService::with_rows(12), 10, "unused.csv");
        ctl.upload("census.csv", b"x".to_vec()).await.unwrap();
        assert_eq!(ctl.session().view(), View::Rows);
        let calls = ctl.service().calls();
        assert_eq!(calls[0], Call::CreateJob("census.csv".into()));
        assert!(matches!(calls[1], Call::ListRows { offset: 0, limit: 10, .. }));
        assert_eq!(calls[2], Call::ListIssues("job_1".into()));
    }

    #[tokio::test]
    async fn upload_without_file_name_makes_no_call() {
        let mut ctl = SessionController::new(MockJobService::with_rows(3), 10, "unused.csv");
        assert!(matches!(ctl.upload("  ", b"x".to_vec()).await, Err(SessionError::MissingFileName)));
        assert!(ctl.service().calls().is_empty());
    }

    #[tokio::test]
    async fn upload_file_reads_bytes_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("staff.csv");
        std::fs::write(&path, b"Salary\n1\n").unwrap();
        let mut ctl = SessionController::new(MockJobService::with_rows(3), 10, "unused.csv");
        ctl.upload_file(&path).await.unwrap();
        assert_eq!(ctl.service().calls()[0], Call::CreateJob("staff.csv".into()));
        let missing = ctl.upload_file(&tmp.path().join("missing.csv")).await.unwrap_err();
        assert!(matches!(missing, SessionError::Io { .. }));
    }

    #[tokio::test]
    async fn pagination_over_twelve_rows() {
        let mut ctl = rows_view(12).await;
        let rows = ctl.session().rows();
        assert_eq!(rows.page().unwrap().rows.len(), 10);
        assert_eq!(rows.page().unwrap().total_rows, 12);
        assert!(rows.can_advance());
        assert!(!rows.can_retreat());

        assert!(ctl.next_page().await.unwrap());
        let rows = ctl.session().rows();
        assert_eq!(rows.query().offset, 10);
        let ids: Vec<&str> = rows.page().unwrap().rows.iter().map(|r| r.row_id.as_str()).collect();
        assert_eq!(ids, vec!["r11", "r12"]);
        assert!(!rows.can_advance());
        assert!(rows.can_retreat());

        assert!(!ctl.next_page().await.unwrap());
        assert_eq!(ctl.service().row_fetches(), 1);
        assert!(ctl.prev_page().await.unwrap());
        assert_eq!(ctl.session().rows().query().offset, 0);
    }

    #[tokio::test]
    async fn page_size_and_filters_reset_offset() {
        let mut ctl = rows_view(40).await;
        ctl.next_page().await.unwrap();
        ctl.set_page_size(20).await.unwrap();
        assert_eq!(ctl.session().rows().query().offset, 0);
        ctl.next_page().await.unwrap();
        ctl.add_filter(Filter::new("Department", FilterOp::Eq, "Eng")).await.unwrap();
        assert_eq!(ctl.session().rows().query().offset, 0);
        let last = ctl.service().calls().pop().unwrap();
        assert_eq!(
            last,
            Call::ListRows {
                job_id: "job_1".into(),
                offset: 0,
                limit: 20,
                filters: vec![Filter::new("Department", FilterOp::Eq, "Eng")],
            }
        );
        assert_eq!(ctl.session().rows().total(), 20);
        assert!(!ctl.session().rows().can_advance());
        assert!(matches!(ctl.set_page_size(7).await, Err(SessionError::UnsupportedPageSize(7))));
    }

    #[tokio::test]
    async fn filter_on_unknown_column_is_refused_locally() {
        let mut ctl = rows_view(12).await;
        let err = ctl.add_filter(Filter::is_null("Nope")).await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownColumn(_)));
        assert!(ctl.service().calls().is_empty());
    }

    #[tokio::test]
    async fn single_edit_sends_one_record_and_refetches_once() {
        let mut ctl = rows_view(12).await;
        *ctl.service().issues.lock() = vec![];
        ctl.set_draft("r5", "Salary", "55000").unwrap();
        let outcome = ctl.commit_cell("r5", "Salary").await.unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed(MutationApplied { merged: true, refetch_rows: true })));

        let calls = ctl.service().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            Call::ApplyEdits {
                job_id: "job_1".into(),
                edits: vec![EditRecord { row_id: "r5".into(), column: "Salary".into(), value: "55000".into() }],
            }
        );
        assert_eq!(
            calls[1],
            Call::ListRows { job_id: "job_1".into(), offset: 0, limit: 10, filters: vec![] }
        );
        let page = ctl.session().rows().page().unwrap();
        assert_eq!(page.row("r5").unwrap().cell_text("Salary"), "55000");
    }

    #[tokio::test]
    async fn edit_replaces_issue_list_wholesale() {
        let mut ctl = rows_view(12).await;
        assert_eq!(ctl.session().issues().len(), 1);
        let fresh = crate::session::state::tests::issue(Some("r2"), Some("Department"), "Department is required");
        *ctl.service().edit_outcome.lock() = crate::model::EditOutcome {
            validation: Some(crate::session::state::tests::summary(1)),
            issues: vec![fresh.clone()],
        };
        ctl.apply_edit("r5", "Salary", "55000").await.unwrap();
        assert_eq!(ctl.session().issues(), &[fresh]);
        assert_eq!(ctl.session().state().validation().unwrap().error_count, 1);
    }

    #[tokio::test]
    async fn unchanged_commit_makes_no_call() {
        let mut ctl = rows_view(12).await;
        ctl.set_draft("r5", "Salary", "50000").unwrap();
        assert_eq!(ctl.commit_cell("r5", "Salary").await.unwrap(), CommitOutcome::Unchanged);
        assert_eq!(ctl.commit_cell("r6", "Salary").await.unwrap(), CommitOutcome::Unchanged);
        assert!(ctl.service().calls().is_empty());
    }

    #[tokio::test]
    async fn edit_outside_current_page_makes_no_call() {
        let mut ctl = rows_view(12).await;
        assert!(matches!(ctl.apply_edit("r11", "Salary", "1").await, Err(SessionError::UnknownRow(_))));
        assert!(matches!(ctl.apply_edit("r1", "Bonus", "1").await, Err(SessionError::UnknownColumn(_))));
        assert!(ctl.service().calls().is_empty());
    }

    #[tokio::test]
    async fn edit_outside_rows_view_does_not_refetch() {
        let mut ctl = rows_view(12).await;
        ctl.select_view(View::Overview).await.unwrap();
        let outcome = ctl.apply_edit("r5", "Salary", "55000").await.unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed(MutationApplied { refetch_rows: false, .. })));
        assert_eq!(ctl.service().row_fetches(), 0);
    }

    #[tokio::test]
    async fn failed_edit_leaves_session_and_skips_refetch() {
        let mut ctl = rows_view(12).await;
        ctl.service().fail("apply_edits", ApiError::rejected(400, "invalid_edit", "Unknown row_id"));
        let issues_before = ctl.session().issues().to_vec();
        let page_before = ctl.session().rows().page().cloned();
        let err = ctl.apply_edit("r5", "Salary", "55000").await.unwrap_err();
        assert_eq!(err.api().unwrap().status(), Some(400));
        assert_eq!(ctl.session().issues(), issues_before.as_slice());
        assert_eq!(ctl.session().rows().page().cloned(), page_before);
        assert_eq!(ctl.service().row_fetches(), 0);
        assert_eq!(ctl.session().last_error().unwrap().message, "Unknown row_id");
        assert_eq!(ctl.session().job().unwrap().job_id, "job_1");
    }

    #[tokio::test]
    async fn bulk_map_request_body() {
        let mut ctl = rows_view(12).await;
        let req = BulkEditRequest::Map {
            column: "Department".into(),
            apply_to: ApplyScope::Missing,
            mapping: BTreeMap::from([("Eng".to_string(), Some("Engineering".to_string()))]),
            default: String::new(),
        };
        let applied = ctl.bulk_edit(req).await.unwrap();
        assert!(applied.refetch_rows);
        let calls = ctl.service().calls();
        assert_eq!(
            calls[0],
            Call::ApplyBulk {
                job_id: "job_1".into(),
                body: json!({
                    "action_type": "map",
                    "column": "Department",
                    "apply_to": "missing",
                    "params": {"mapping": {"Eng": "Engineering"}, "default": ""}
                }),
            }
        );
        assert_eq!(ctl.service().row_fetches(), 1);
    }

    #[tokio::test]
    async fn bulk_form_with_replace_from_sends_replace() {
        let mut ctl = rows_view(12).await;
        let form = BulkForm {
            column: "Gender".into(),
            apply_to: ApplyScope::All,
            mapping: BTreeMap::from([("F".to_string(), Some("Female".to_string()))]),
            replace_from: Some("M".into()),
            replace_to: Some("Male".into()),
            ..Default::default()
        };
        ctl.bulk_form(form).await.unwrap();
        assert_eq!(
            ctl.service().calls()[0],
            Call::ApplyBulk {
                job_id: "job_1".into(),
                body: json!({
                    "action_type": "replace",
                    "column": "Gender",
                    "apply_to": "all",
                    "params": {"from": "M", "to": "Male"}
                }),
            }
        );
    }

    #[tokio::test]
    async fn bulk_form_without_replace_from_sends_map_with_empty_mapping() {
        let mut ctl = rows_view(12).await;
        let form = BulkForm {
            column: "Department".into(),
            apply_to: ApplyScope::Errors,
            default: Some("Unassigned".into()),
            replace_from: Some(String::new()),
            ..Default::default()
        };
        ctl.bulk_form(form).await.unwrap();
        let Call::ApplyBulk { body, .. } = &ctl.service().calls()[0] else { panic!("expected bulk call") };
        assert_eq!(body["action_type"], "map");
        assert_eq!(body["params"], json!({"mapping": {}, "default": "Unassigned"}));
    }

    #[tokio::test]
    async fn not_found_anywhere_resets_session() {
        let mut ctl = rows_view(12).await;
        ctl.service().fail("list_rows", ApiError::not_found("not_found", "Job not found"));
        let err = ctl.next_page().await.unwrap_err();
        assert!(err.api().unwrap().is_not_found());
        let s = ctl.session();
        assert!(s.job().is_none());
        assert!(s.issues().is_empty());
        assert!(s.rows().page().is_none());
        assert_eq!(s.rows().query().offset, 0);
        assert_eq!(s.view(), View::Upload);
    }

    #[tokio::test]
    async fn not_found_on_bulk_resets_session() {
        let mut ctl = rows_view(12).await;
        ctl.service().fail("apply_bulk", ApiError::not_found("not_found", "Job not found"));
        let req = BulkEditRequest::Replace { column: "Gender".into(), apply_to: ApplyScope::All, from: "M".into(), to: "Male".into() };
        assert!(ctl.bulk_edit(req).await.is_err());
        assert!(ctl.session().job().is_none());
        assert_eq!(ctl.service().row_fetches(), 0);
    }

    #[tokio::test]
    async fn rejected_bulk_leaves_session_and_skips_refetch() {
        let mut ctl = rows_view(12).await;
        let issues_before = ctl.session().issues().to_vec();
        let validation_before = ctl.session().state().validation().cloned();
        let page_before = ctl.session().rows().page().cloned();
        ctl.service().fail("apply_bulk", ApiError::rejected(400, "invalid_bulk", "Unknown column"));
        let req = BulkEditRequest::Replace { column: "Gender".into(), apply_to: ApplyScope::All, from: "M".into(), to: "Male".into() };
        let err = ctl.bulk_edit(req).await.unwrap_err();
        assert_eq!(err.api().unwrap().status(), Some(400));
        assert_eq!(ctl.session().issues(), issues_before.as_slice());
        assert_eq!(ctl.session().state().validation().cloned(), validation_before);
        assert_eq!(ctl.session().rows().page().cloned(), page_before);
        assert_eq!(ctl.session().job().unwrap().job_id, "job_1");
        assert_eq!(ctl.service().row_fetches(), 0);
        assert_eq!(ctl.session().last_error().unwrap().status, Some(400));
    }

    #[tokio::test]
    async fn server_error_on_refresh_keeps_session() {
        let mut ctl = rows_view(12).await;
        ctl.service().fail("get_job", ApiError::server(503, "unavailable", "try later"));
        assert!(ctl.refresh().await.is_err());
        assert_eq!(ctl.session().job().unwrap().job_id, "job_1");
        assert_eq!(ctl.session().view(), View::Rows);
        ctl.service().clear_failures();
        assert_eq!(ctl.refresh().await.unwrap(), Applied::Applied);
        assert!(ctl.session().last_error().is_none());
    }

    #[tokio::test]
    async fn delete_returns_to_upload() {
        let mut ctl = rows_view(12).await;
        ctl.delete().await.unwrap();
        assert_eq!(ctl.service().calls(), vec![Call::DeleteJob("job_1".into())]);
        assert!(ctl.session().job().is_none());
        assert_eq!(ctl.session().view(), View::Upload);
        assert!(matches!(ctl.delete().await, Err(SessionError::NoActiveJob)));
    }

    #[tokio::test]
    async fn issues_view_loads_issue_list() {
        let mut ctl = rows_view(12).await;
        ctl.select_view(View::Issues).await.unwrap();
        assert_eq!(ctl.service().calls(), vec![Call::ListIssues("job_1".into())]);
    }

    #[tokio::test]
    async fn export_saves_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("export.csv");
        let mut ctl = rows_view(12).await;
        let saved = ctl.export(Some(&dest)).await.unwrap();
        assert_eq!(saved, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"row_id,Salary\nr1,50000\n");
        assert!(!ctl.session().flags().exporting());
    }

    #[tokio::test]
    async fn export_not_found_resets_session() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctl = rows_view(12).await;
        ctl.service().fail("export_job", ApiError::not_found("not_found", "Job not found"));
        assert!(ctl.export(Some(&tmp.path().join("x.csv"))).await.is_err());
        assert!(ctl.session().job().is_none());
        assert!(!ctl.session().flags().exporting());
    }
}
