//! Background-video dispatch.
//!
//! Background-video requests are not rendered here. A job record is stored
//! as `processing` and the job is handed to the external render worker; the
//! caller gets the job ID back right away.

use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use shortgen_models::{JobId, JobRecord, MediaSource};

use crate::error::{ComposeError, ComposeResult};
use crate::jobs::JobStore;
use crate::logging::JobLogger;
use crate::metrics;

/// Storage key a job's video is written to.
pub fn artifact_key(job_id: &JobId) -> String {
    format!("videos/{}.mp4", job_id)
}

/// Body of the render worker's `/render` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderDispatch {
    pub job_id: JobId,
    pub audio_url: String,
    pub background_url: String,
    pub output_path: String,
    pub max_duration: u32,
}

#[derive(Clone)]
pub struct BackgroundDispatcher {
    client: Client,
    worker_url: String,
    jobs: Arc<dyn JobStore>,
    max_duration_secs: u32,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundDispatcher {
    pub fn new(worker_url: impl Into<String>, jobs: Arc<dyn JobStore>, max_duration_secs: u32) -> Self {
        Self {
            client: Client::new(),
            worker_url: worker_url.into(),
            jobs,
            max_duration_secs,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn render_endpoint(&self) -> String {
        format!("{}/render", self.worker_url.trim_end_matches('/'))
    }

    /// Record the job and hand it to the render worker in the background.
    pub async fn dispatch(
        &self,
        audio: &MediaSource,
        background_video: &MediaSource,
    ) -> ComposeResult<JobId> {
        let audio_url = audio.as_remote().ok_or_else(|| {
            ComposeError::invalid_request("background video mode requires a remote audio URL")
        })?;
        let background_url = background_video.as_remote().ok_or_else(|| {
            ComposeError::invalid_request("background video mode requires a remote video URL")
        })?;

        let job_id = JobId::new();
        let record = JobRecord::processing(
            job_id.clone(),
            audio_url.as_str(),
            background_url.as_str(),
            artifact_key(&job_id),
        );
        self.jobs.create(&record).await?;

        let logger = JobLogger::new(&job_id, "dispatch");
        logger.log_start("background video job recorded");

        let this = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = this.deliver(record).await {
                logger.log_error(&e.to_string());
            }
        });

        let mut pending = self.pending.lock().await;
        pending.retain(|h| !h.is_finished());
        pending.push(handle);

        Ok(job_id)
    }

    /// Wait for every in-flight delivery.
    pub async fn drain(&self) {
        let handles: Vec<_> = self.pending.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Dispatch task panicked: {}", e);
            }
        }
    }

    /// POST the job to the render worker, marking the record failed if that
    /// does not succeed.
    pub async fn deliver(&self, mut record: JobRecord) -> ComposeResult<()> {
        let payload = RenderDispatch {
            job_id: record.id.clone(),
            audio_url: record.audio_url.clone(),
            background_url: record.background_url.clone(),
            output_path: record.output_path.clone(),
            max_duration: self.max_duration_secs,
        };

        let sent = self.post(&payload).await;
        metrics::record_dispatch(sent.is_ok());

        match sent {
            Ok(()) => {
                info!(job_id = %record.id, "Dispatched to render worker");
                Ok(())
            }
            Err(e) => {
                record.fail(e.to_string());
                if let Err(store_err) = self.jobs.update(&record).await {
                    warn!(job_id = %record.id, "Failed to mark job failed: {}", store_err);
                }
                Err(e)
            }
        }
    }

    async fn post(&self, payload: &RenderDispatch) -> ComposeResult<()> {
        let response = self
            .client
            .post(self.render_endpoint())
            .json(payload)
            .send()
            .await
            .map_err(|e| ComposeError::dispatch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ComposeError::dispatch_failed(format!(
                "render worker returned HTTP {}",
                status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::MemoryJobStore;
    use shortgen_models::JobStatus;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_artifact_key() {
        let id = JobId::from_string("abc");
        assert_eq!(artifact_key(&id), "videos/abc.mp4");
    }

    #[test]
    fn test_payload_is_camel_case() {
        let payload = RenderDispatch {
            job_id: JobId::from_string("abc"),
            audio_url: "https://a".into(),
            background_url: "https://b".into(),
            output_path: "videos/abc.mp4".into(),
            max_duration: 60,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["jobId"], "abc");
        assert_eq!(json["backgroundUrl"], "https://b");
        assert_eq!(json["outputPath"], "videos/abc.mp4");
        assert_eq!(json["maxDuration"], 60);
    }

    #[tokio::test]
    async fn test_dispatch_requires_remote_references() {
        let store = Arc::new(MemoryJobStore::new());
        let dispatcher = BackgroundDispatcher::new("http://localhost:1", store.clone(), 60);
        let inline = MediaSource::parse("data:audio/mpeg;base64,AAAA").unwrap();
        let remote = MediaSource::parse("https://cdn.example.com/bg.mp4").unwrap();

        let err = dispatcher.dispatch(&inline, &remote).await.unwrap_err();
        assert!(matches!(err, ComposeError::InvalidRequest(_)));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_failed_delivery_marks_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryJobStore::new());
        let dispatcher = BackgroundDispatcher::new(server.uri(), store.clone(), 60);
        let record = JobRecord::processing(
            JobId::new(),
            "https://cdn.example.com/voice.mp3",
            "https://cdn.example.com/bg.mp4",
            "videos/x.mp4",
        );
        store.create(&record).await.unwrap();

        let err = dispatcher.deliver(record.clone()).await.unwrap_err();
        assert!(err.to_string().contains("503"));

        let stored = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.error.unwrap().contains("503"));
    }
}
