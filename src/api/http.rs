use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::JobService;
use crate::error::{ApiError, AppResult};
use crate::model::{BulkEditRequest, EditOutcome, EditRecord, Filter, Issue, Job, RowPage};
use crate::session::rows::encode_filters;

/// reqwest-backed client for the job service REST API.
#[derive(Clone)]
pub struct HttpJobService {
    base: Url,
    client: reqwest::Client,
}

impl HttpJobService {
    pub fn new(base: &str) -> Result<Self> {
        let mut base_url = Url::parse(base).context("invalid API base URL")?;
        // join() replaces the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder().build().context("failed to build HTTP client")?;
        Ok(Self { base: base_url, client })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base
            .join(path)
            .map_err(|e| ApiError::network(format!("invalid request url '{}': {}", path, e)))
    }

    fn job_endpoint(&self, job_id: &str, suffix: &str) -> AppResult<Url> {
        let encoded = urlencoding::encode(job_id);
        if suffix.is_empty() {
            self.endpoint(&format!("api/jobs/{}", encoded))
        } else {
            self.endpoint(&format!("api/jobs/{}/{}", encoded, suffix))
        }
    }
}

async fn ensure_success(resp: Response) -> AppResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.bytes().await.unwrap_or_default();
    let err = ApiError::from_response(status.as_u16(), &body);
    debug!(target: "databuddy", "request failed: status={} code={}", status.as_u16(), err.code_str());
    Err(err)
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> AppResult<T> {
    let resp = ensure_success(resp).await?;
    Ok(resp.json::<T>().await?)
}

impl JobService for HttpJobService {
    async fn create_job(&self, file_name: &str, bytes: Vec<u8>) -> AppResult<Job> {
        let url = self.endpoint("api/jobs")?;
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let resp = self.client.post(url).multipart(form).send().await?;
        read_json(resp).await
    }

    async fn get_job(&self, job_id: &str) -> AppResult<Job> {
        let url = self.job_endpoint(job_id, "")?;
        let resp = self.client.get(url).send().await?;
        read_json(resp).await
    }

    async fn list_issues(&self, job_id: &str) -> AppResult<Vec<Issue>> {
        let url = self.job_endpoint(job_id, "issues")?;
        let resp = self.client.get(url).send().await?;
        read_json(resp).await
    }

    async fn list_rows(&self, job_id: &str, offset: u64, limit: u64, filters: &[Filter]) -> AppResult<RowPage> {
        let url = self.job_endpoint(job_id, "rows")?;
        let mut params: Vec<(&str, String)> = vec![("offset", offset.to_string()), ("limit", limit.to_string())];
        if let Some(encoded) = encode_filters(filters)? {
            params.push(("filters", encoded));
        }
        let resp = self.client.get(url).query(&params).send().await?;
        read_json(resp).await
    }

    async fn apply_edits(&self, job_id: &str, edits: &[EditRecord]) -> AppResult<EditOutcome> {
        let url = self.job_endpoint(job_id, "edits")?;
        let resp = self
            .client
            .post(url)
            .json(&serde_json::json!({ "edits": edits }))
            .send()
            .await?;
        read_json(resp).await
    }

    async fn apply_bulk(&self, job_id: &str, request: &BulkEditRequest) -> AppResult<EditOutcome> {
        let url = self.job_endpoint(job_id, "bulk")?;
        let resp = self.client.post(url).json(request).send().await?;
        read_json(resp).await
    }

    async fn delete_job(&self, job_id: &str) -> AppResult<()> {
        let url = self.job_endpoint(job_id, "")?;
        let resp = self.client.delete(url).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn export_job(&self, job_id: &str) -> AppResult<Vec<u8>> {
        let url = self.job_endpoint(job_id, "export")?;
        let resp = self.client.get(url).send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn health(&self) -> AppResult<String> {
        let url = self.endpoint("api/health")?;
        let resp = self.client.get(url).send().await?;
        let v: serde_json::Value = read_json(resp).await?;
        Ok(v.get("status").and_then(|s| s.as_str()).unwrap_or("unknown").to_string())
    }
}
