//! In-memory job service used by the controller tests. Records every call and
//! serves pages from a small generated dataset.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::api::JobService;
use crate::error::{ApiError, AppResult};
use crate::model::{BulkEditRequest, EditOutcome, EditRecord, Filter, FilterOp, Issue, Job, Row, RowPage};
use crate::session::state::tests::{job, summary};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateJob(String),
    GetJob(String),
    ListIssues(String),
    ListRows { job_id: String, offset: u64, limit: u64, filters: Vec<Filter> },
    ApplyEdits { job_id: String, edits: Vec<EditRecord> },
    ApplyBulk { job_id: String, body: serde_json::Value },
    DeleteJob(String),
    ExportJob(String),
    Health,
}

pub(crate) struct MockJobService {
    pub job: Mutex<Job>,
    pub rows: Mutex<Vec<Row>>,
    pub issues: Mutex<Vec<Issue>>,
    pub edit_outcome: Mutex<EditOutcome>,
    pub export_bytes: Vec<u8>,
    failures: Mutex<HashMap<&'static str, ApiError>>,
    calls: Mutex<Vec<Call>>,
}

pub(crate) const COLUMNS: [&str; 3] = ["Salary", "Department", "Gender"];

impl MockJobService {
    /// Job `job_1` with `n` rows r1..rn.
    pub fn with_rows(n: usize) -> Self {
        let mut template = job("job_1", &COLUMNS);
        if let Some(ds) = template.dataset.as_mut() {
            ds.total_rows = n as u64;
        }
        let rows = (1..=n)
            .map(|i| Row {
                row_id: format!("r{}", i),
                cells: BTreeMap::from([
                    ("Salary".to_string(), Some("50000".to_string())),
                    ("Department".to_string(), if i % 2 == 0 { Some("Eng".to_string()) } else { None }),
                    ("Gender".to_string(), Some(if i % 3 == 0 { "F" } else { "M" }.to_string())),
                ]),
            })
            .collect();
        Self {
            issues: Mutex::new(template.issues.clone()),
            job: Mutex::new(template),
            rows: Mutex::new(rows),
            edit_outcome: Mutex::new(EditOutcome { validation: Some(summary(0)), issues: vec![] }),
            export_bytes: b"row_id,Salary\nr1,50000\n".to_vec(),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make every subsequent call of `op` fail with `err`.
    pub fn fail(&self, op: &'static str, err: ApiError) {
        self.failures.lock().insert(op, err);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn row_fetches(&self) -> usize {
        self.calls.lock().iter().filter(|c| matches!(c, Call::ListRows { .. })).count()
    }

    fn record(&self, op: &'static str, call: Call) -> AppResult<()> {
        self.calls.lock().push(call);
        match self.failures.lock().get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn matches_filters(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| {
        let value = row.cell_text(&f.column);
        let target = f.value.as_deref().unwrap_or("");
        match f.op {
            FilterOp::Eq => value == target,
            FilterOp::Neq => value != target,
            FilterOp::Contains => value.contains(target),
            FilterOp::IsNull => value.trim().is_empty(),
        }
    })
}

impl JobService for MockJobService {
    async fn create_job(&self, file_name: &str, _bytes: Vec<u8>) -> AppResult<Job> {
        self.record("create_job", Call::CreateJob(file_name.to_string()))?;
        Ok(self.job.lock().clone())
    }

    async fn get_job(&self, job_id: &str) -> AppResult<Job> {
        self.record("get_job", Call::GetJob(job_id.to_string()))?;
        let mut job = self.job.lock().clone();
        job.issues = self.issues.lock().clone();
        Ok(job)
    }

    async fn list_issues(&self, job_id: &str) -> AppResult<Vec<Issue>> {
        self.record("list_issues", Call::ListIssues(job_id.to_string()))?;
        Ok(self.issues.lock().clone())
    }

    async fn list_rows(&self, job_id: &str, offset: u64, limit: u64, filters: &[Filter]) -> AppResult<RowPage> {
        self.record(
            "list_rows",
            Call::ListRows { job_id: job_id.to_string(), offset, limit, filters: filters.to_vec() },
        )?;
        let rows = self.rows.lock();
        let matching: Vec<&Row> = rows.iter().filter(|r| matches_filters(r, filters)).collect();
        let page_rows = matching
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|r| (*r).clone())
            .collect();
        Ok(RowPage {
            offset,
            limit,
            total_rows: rows.len() as u64,
            total_filtered: if filters.is_empty() { None } else { Some(matching.len() as u64) },
            rows: page_rows,
        })
    }

    async fn apply_edits(&self, job_id: &str, edits: &[EditRecord]) -> AppResult<EditOutcome> {
        self.record("apply_edits", Call::ApplyEdits { job_id: job_id.to_string(), edits: edits.to_vec() })?;
        let mut rows = self.rows.lock();
        for edit in edits {
            if let Some(row) = rows.iter_mut().find(|r| r.row_id == edit.row_id) {
                row.cells.insert(edit.column.clone(), Some(edit.value.clone()));
            }
        }
        Ok(self.edit_outcome.lock().clone())
    }

    async fn apply_bulk(&self, job_id: &str, request: &BulkEditRequest) -> AppResult<EditOutcome> {
        let body = serde_json::to_value(request).unwrap_or(serde_json::Value::Null);
        self.record("apply_bulk", Call::ApplyBulk { job_id: job_id.to_string(), body })?;
        Ok(self.edit_outcome.lock().clone())
    }

    async fn delete_job(&self, job_id: &str) -> AppResult<()> {
        self.record("delete_job", Call::DeleteJob(job_id.to_string()))
    }

    async fn export_job(&self, job_id: &str) -> AppResult<Vec<u8>> {
        self.record("export_job", Call::ExportJob(job_id.to_string()))?;
        Ok(self.export_bytes.clone())
    }

    async fn health(&self) -> AppResult<String> {
        self.record("health", Call::Health)?;
        Ok("ok".to_string())
    }
}
