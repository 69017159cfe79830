//! Background job records.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::debug;

use shortgen_models::{JobId, JobRecord};

use crate::error::{ComposeError, ComposeResult};

/// Persistence for background-video job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, record: &JobRecord) -> ComposeResult<()>;

    /// Overwrite the status fields of an existing record.
    async fn update(&self, record: &JobRecord) -> ComposeResult<()>;

    async fn get(&self, id: &JobId) -> ComposeResult<Option<JobRecord>>;
}

/// In-process store for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<JobId, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, record: &JobRecord) -> ComposeResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(ComposeError::job_store(format!(
                "job {} already exists",
                record.id
            )));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &JobRecord) -> ComposeResult<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(ComposeError::job_store(format!("job {} not found", record.id))),
        }
    }

    async fn get(&self, id: &JobId) -> ComposeResult<Option<JobRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }
}

/// Connection settings for [`RestJobStore`].
#[derive(Debug, Clone)]
pub struct RestJobStoreConfig {
    /// Base URL of the REST API, e.g. `https://project.supabase.co/rest/v1`
    pub base_url: String,
    pub api_key: String,
    pub table: String,
}

impl RestJobStoreConfig {
    /// `None` unless `JOB_STORE_URL` and `JOB_STORE_API_KEY` are set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("JOB_STORE_URL").ok()?;
        let api_key = std::env::var("JOB_STORE_API_KEY").ok()?;
        Some(Self {
            base_url,
            api_key,
            table: std::env::var("JOB_STORE_TABLE").unwrap_or_else(|_| "video_jobs".to_string()),
        })
    }
}

/// Job records in a REST-exposed table (PostgREST conventions).
///
/// Rows are addressed with an `id=eq.<id>` filter.
#[derive(Debug, Clone)]
pub struct RestJobStore {
    client: Client,
    config: RestJobStoreConfig,
}

impl RestJobStore {
    pub fn new(config: RestJobStoreConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: RestJobStoreConfig) -> Self {
        Self { client, config }
    }

    fn table_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.table
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    async fn check(response: reqwest::Response, action: &str) -> ComposeResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ComposeError::job_store(format!(
            "{} failed with HTTP {}: {}",
            action, status, body
        )))
    }
}

#[async_trait]
impl JobStore for RestJobStore {
    async fn create(&self, record: &JobRecord) -> ComposeResult<()> {
        debug!(job_id = %record.id, "Creating job record");
        let response = self
            .authorized(self.client.post(self.table_url()))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|e| ComposeError::job_store(e.to_string()))?;
        Self::check(response, "create").await?;
        Ok(())
    }

    async fn update(&self, record: &JobRecord) -> ComposeResult<()> {
        debug!(job_id = %record.id, status = record.status.as_str(), "Updating job record");
        let response = self
            .authorized(self.client.patch(self.table_url()))
            .query(&[("id", format!("eq.{}", record.id))])
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({
                "status": record.status,
                "error": record.error,
                "updated_at": record.updated_at,
            }))
            .send()
            .await
            .map_err(|e| ComposeError::job_store(e.to_string()))?;
        Self::check(response, "update").await?;
        Ok(())
    }

    async fn get(&self, id: &JobId) -> ComposeResult<Option<JobRecord>> {
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())])
            .send()
            .await
            .map_err(|e| ComposeError::job_store(e.to_string()))?;
        let rows: Vec<JobRecord> = Self::check(response, "get")
            .await?
            .json()
            .await
            .map_err(|e| ComposeError::job_store(e.to_string()))?;
        Ok(rows.into_iter().next())
    }
}
