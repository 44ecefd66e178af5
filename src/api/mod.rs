//! Remote job service interface.

pub mod http;

pub use http::HttpJobService;

use crate::error::AppResult;
use crate::model::{BulkEditRequest, EditOutcome, EditRecord, Filter, Issue, Job, RowPage};

/// Operations of the authoritative job service. The session controller is
/// generic over this trait so it can run against HTTP or a scripted stand-in.
#[allow(async_fn_in_trait)]
pub trait JobService {
    async fn create_job(&self, file_name: &str, bytes: Vec<u8>) -> AppResult<Job>;
    async fn get_job(&self, job_id: &str) -> AppResult<Job>;
    async fn list_issues(&self, job_id: &str) -> AppResult<Vec<Issue>>;
    async fn list_rows(&self, job_id: &str, offset: u64, limit: u64, filters: &[Filter]) -> AppResult<RowPage>;
    async fn apply_edits(&self, job_id: &str, edits: &[EditRecord]) -> AppResult<EditOutcome>;
    async fn apply_bulk(&self, job_id: &str, request: &BulkEditRequest) -> AppResult<EditOutcome>;
    async fn delete_job(&self, job_id: &str) -> AppResult<()>;
    async fn export_job(&self, job_id: &str) -> AppResult<Vec<u8>>;
    async fn health(&self) -> AppResult<String>;
}
