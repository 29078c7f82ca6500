//! Packaging-job orchestration against the PLATEAU pack API.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/citygml/pack` | Submit a packaging job (`{"urls": [...]}` → `{"id": ...}`) |
//! | GET    | `/citygml/pack/{id}/status` | Current job status |
//! | GET    | `/citygml/pack/{id}.zip` | Packaged archive (default download location) |
//!
//! Remote status strings are translated in [`map_remote_status`] and nowhere
//! else; everything past this module sees only [`PackStatus`].

use std::sync::Arc;
use std::time::Duration;

use plateau_core::job::dedup_urls;
use plateau_core::{DownloadDescriptor, Observation, PackJob, PackJobId, PackStatus};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::PlateauApiError;
use crate::gateway::HttpGateway;
use crate::retry::TransientBudget;

/// Content type assumed for the default archive location.
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Shortest delay between two status polls of one wait. Smaller requested
/// intervals are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize)]
struct PackRequest<'a> {
    urls: &'a [String],
}

#[derive(Debug, Deserialize)]
struct PackSubmitResponse {
    id: String,
}

/// Status payload as returned by the service. Only `status` is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusPayload {
    status: String,
    #[serde(default, alias = "download_url")]
    download_url: Option<String>,
    #[serde(default, alias = "content_type")]
    content_type: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Translate a remote status string into a lifecycle state.
///
/// Returns `None` for vocabulary this client does not recognize.
pub fn map_remote_status(raw: &str) -> Option<PackStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "accepted" | "queued" | "pending" | "waiting" => Some(PackStatus::Queued),
        "processing" | "running" | "in_progress" | "packing" => Some(PackStatus::Processing),
        "succeeded" | "success" | "completed" | "done" | "ready" => Some(PackStatus::Completed),
        "failed" | "failure" | "error" | "cancelled" | "canceled" => Some(PackStatus::Failed),
        _ => None,
    }
}

/// Submits packaging jobs and follows them to a terminal state.
#[derive(Debug, Clone)]
pub struct PackJobOrchestrator {
    gateway: HttpGateway,
    clock: Arc<dyn Clock>,
    max_transient_failures: u32,
}

impl PackJobOrchestrator {
    pub(crate) fn new(
        gateway: HttpGateway,
        clock: Arc<dyn Clock>,
        max_transient_failures: u32,
    ) -> Self {
        Self {
            gateway,
            clock,
            max_transient_failures,
        }
    }

    /// Submit a packaging request for `urls`.
    ///
    /// Duplicates are removed keeping first-occurrence order. An empty list
    /// fails with `EmptyRequest` before any request is sent.
    ///
    /// Calls `POST {base_url}/citygml/pack`.
    pub async fn submit<I, S>(&self, urls: I) -> Result<PackJob, PlateauApiError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls = dedup_urls(urls);
        if urls.is_empty() {
            return Err(PlateauApiError::EmptyRequest);
        }

        let endpoint = "POST /citygml/pack";
        let url = self.gateway.url(&["citygml", "pack"])?;
        let resp: PackSubmitResponse = self
            .gateway
            .post_json(endpoint, url, &PackRequest { urls: &urls })
            .await?;

        let id = PackJobId::new(resp.id).map_err(|_| PlateauApiError::UnexpectedResponse {
            endpoint: endpoint.into(),
            detail: "empty job id".into(),
        })?;
        tracing::info!(job_id = %id, files = urls.len(), "pack job submitted");
        Ok(PackJob::submitted(id, urls))
    }

    /// Probe a job's status once.
    ///
    /// The returned job is seeded from this single reading; the requested URL
    /// list is not known to the status endpoint and is left empty.
    pub async fn poll(&self, id: &PackJobId) -> Result<PackJob, PlateauApiError> {
        let observation = self.observe(id).await?;
        Ok(PackJob::from_observation(id.clone(), observation))
    }

    /// Probe a job's status and fold the reading into `job`.
    ///
    /// Terminal jobs are not re-polled. Returns whether the job changed.
    pub async fn refresh(&self, job: &mut PackJob) -> Result<bool, PlateauApiError> {
        if job.status().is_terminal() {
            return Ok(false);
        }
        let observation = self.observe(job.id()).await?;
        Ok(fold(job, observation))
    }

    /// Poll until the job is terminal or `timeout` has elapsed.
    ///
    /// Up to the configured number of consecutive transient poll failures are
    /// tolerated; anything else surfaces immediately. On timeout the remote
    /// job is left alone and may be polled again. `poll_interval` is raised
    /// to at least [`MIN_POLL_INTERVAL`].
    pub async fn await_completion(
        &self,
        id: &PackJobId,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<PackJob, PlateauApiError> {
        self.drive(id.clone(), None, poll_interval, timeout).await
    }

    /// Like [`await_completion`](Self::await_completion) but continues from a
    /// job already in hand, keeping its requested URLs.
    pub async fn await_job(
        &self,
        job: PackJob,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<PackJob, PlateauApiError> {
        if job.status().is_terminal() {
            return Ok(job);
        }
        self.drive(job.id().clone(), Some(job), poll_interval, timeout)
            .await
    }

    /// Download location of a completed job.
    pub fn resolve_download(&self, job: &PackJob) -> Result<DownloadDescriptor, PlateauApiError> {
        match (job.status(), job.download()) {
            (PackStatus::Completed, Some(descriptor)) => Ok(descriptor.clone()),
            (status, _) => Err(PlateauApiError::NotReady {
                id: job.id().to_string(),
                status,
            }),
        }
    }

    /// Default archive location for a job id.
    pub fn default_download(&self, id: &PackJobId) -> Result<DownloadDescriptor, PlateauApiError> {
        let file = format!("{id}.zip");
        let url = self.gateway.url(&["citygml", "pack", &file])?;
        Ok(DownloadDescriptor {
            url: url.to_string(),
            content_type: Some(ZIP_CONTENT_TYPE.to_string()),
            size_bytes: None,
        })
    }

    async fn drive(
        &self,
        id: PackJobId,
        mut job: Option<PackJob>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<PackJob, PlateauApiError> {
        let started = self.clock.now();
        let mut budget = TransientBudget::new(self.max_transient_failures);
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);

        loop {
            match self.observe(&id).await {
                Ok(observation) => {
                    budget.reset();
                    match job.as_mut() {
                        Some(j) => {
                            fold(j, observation);
                        }
                        None => {
                            job = Some(PackJob::from_observation(id.clone(), observation));
                        }
                    }
                }
                Err(e) => budget.absorb(e)?,
            }

            let last_status = job.as_ref().map_or(PackStatus::Queued, PackJob::status);
            if let Some(j) = job.as_ref().filter(|j| j.status().is_terminal()) {
                tracing::info!(job_id = %id, status = %j.status(), "pack job finished");
                return Ok(j.clone());
            }

            let waited = self.clock.now().saturating_duration_since(started);
            if waited >= timeout {
                tracing::warn!(job_id = %id, %last_status, ?waited, "pack job wait timed out");
                return Err(PlateauApiError::Timeout {
                    id: id.to_string(),
                    last_status,
                    waited,
                });
            }
            self.clock.sleep(poll_interval.min(timeout - waited)).await;
        }
    }

    async fn observe(&self, id: &PackJobId) -> Result<Observation, PlateauApiError> {
        let endpoint = format!("GET /citygml/pack/{id}/status");
        let url = self
            .gateway
            .url(&["citygml", "pack", id.as_str(), "status"])?;

        let resp = self.gateway.get(&endpoint, url, &[]).await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PlateauApiError::UnknownJob { id: id.to_string() });
        }
        let payload: StatusPayload = self.gateway.read_json(&endpoint, resp).await?;
        self.to_observation(&endpoint, id, payload)
    }

    fn to_observation(
        &self,
        endpoint: &str,
        id: &PackJobId,
        payload: StatusPayload,
    ) -> Result<Observation, PlateauApiError> {
        let status = map_remote_status(&payload.status).ok_or_else(|| {
            PlateauApiError::UnexpectedResponse {
                endpoint: endpoint.into(),
                detail: format!("unrecognized job status {:?}", payload.status),
            }
        })?;

        Ok(match status {
            PackStatus::Queued => Observation::Queued,
            PackStatus::Processing => Observation::Processing,
            PackStatus::Completed => {
                let descriptor = match payload.download_url.filter(|u| !u.trim().is_empty()) {
                    Some(url) => DownloadDescriptor {
                        url,
                        content_type: payload.content_type,
                        size_bytes: payload.size,
                    },
                    None => {
                        let mut d = self.default_download(id)?;
                        d.size_bytes = payload.size;
                        d
                    }
                };
                Observation::Completed(descriptor)
            }
            PackStatus::Failed => Observation::Failed {
                reason: failure_reason(payload.error, payload.message),
            },
        })
    }
}

/// Fold an observation into a job, logging readings that were ignored.
fn fold(job: &mut PackJob, observation: Observation) -> bool {
    let reported = observation.status();
    let changed = job.observe(observation);
    if changed {
        tracing::info!(job_id = %job.id(), status = %job.status(), "pack job state changed");
    } else if reported != job.status() {
        tracing::warn!(
            job_id = %job.id(),
            current = %job.status(),
            %reported,
            "ignoring stale pack status"
        );
    }
    changed
}

fn failure_reason(error: Option<serde_json::Value>, message: Option<String>) -> String {
    match (error, message) {
        (Some(serde_json::Value::String(s)), _) if !s.is_empty() => s,
        (Some(v), _) if !v.is_null() => v.to_string(),
        (_, Some(m)) if !m.is_empty() => m,
        _ => "packaging failed without a reason".to_string(),
    }
}
