//! # Packaging Job State Model
//!
//! A [`PackJob`] tracks one server-side request to bundle CityGML files into
//! a single zip archive.
//!
//! ## States
//!
//! QUEUED → PROCESSING → COMPLETED | FAILED
//!
//! Terminal states: COMPLETED, FAILED
//!
//! ## Monotonicity
//!
//! The remote service is eventually consistent: a status read issued after
//! a PROCESSING read may still report QUEUED. [`PackJob::observe`] folds each
//! [`Observation`] into the job and ignores any that would move it backwards
//! or out of a terminal state, so the sequence of states a caller sees never
//! revisits a state it has left.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Opaque identifier issued by the remote service for a packaging job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackJobId(String);

impl PackJobId {
    /// Wrap a remote-issued id.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyJobId`] for an empty or blank string.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.trim().is_empty() {
            return Err(ValidationError::EmptyJobId);
        }
        Ok(Self(s))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a packaging job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackStatus {
    /// Accepted by the service, not yet started.
    Queued,
    /// Archive is being built.
    Processing,
    /// Archive is ready for download (terminal).
    Completed,
    /// Packaging failed irrecoverably (terminal).
    Failed,
}

impl PackStatus {
    /// Whether this state is terminal (no further transitions).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position along the lifecycle; both terminal states share the last rank.
    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }
}

impl fmt::Display for PackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Where to fetch a completed job's archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadDescriptor {
    /// Absolute URL of the archive.
    pub url: String,
    /// Content type advertised by the service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Archive size in bytes, if advertised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// One status reading of a job, already mapped out of the remote vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The job is waiting to start.
    Queued,
    /// The job is running.
    Processing,
    /// The job finished; the archive can be downloaded.
    Completed(DownloadDescriptor),
    /// The job failed.
    Failed {
        /// Reason reported by the service.
        reason: String,
    },
}

impl Observation {
    /// The state this observation reports.
    pub fn status(&self) -> PackStatus {
        match self {
            Self::Queued => PackStatus::Queued,
            Self::Processing => PackStatus::Processing,
            Self::Completed(_) => PackStatus::Completed,
            Self::Failed { .. } => PackStatus::Failed,
        }
    }
}

/// A packaging request and everything observed about it so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackJob {
    id: PackJobId,
    status: PackStatus,
    requested_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    download: Option<DownloadDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
    submitted_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PackJob {
    /// A freshly submitted job in the QUEUED state.
    pub fn submitted(id: PackJobId, requested_urls: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: PackStatus::Queued,
            requested_urls,
            download: None,
            failure_reason: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    /// A job known only by id, seeded from a single status reading.
    ///
    /// Used when a caller polls an id it did not submit in this process; the
    /// requested URL list is unknown and left empty.
    pub fn from_observation(id: PackJobId, observation: Observation) -> Self {
        let mut job = Self::submitted(id, Vec::new());
        job.observe(observation);
        job
    }

    /// Fold a status reading into the job.
    ///
    /// Returns `true` when the job's state changed. Readings that would move
    /// the job backwards, sideways between terminal states, or out of a
    /// terminal state are ignored.
    pub fn observe(&mut self, observation: Observation) -> bool {
        let next = observation.status();
        if self.status.is_terminal() || next.rank() <= self.status.rank() {
            return false;
        }

        match observation {
            Observation::Completed(descriptor) => self.download = Some(descriptor),
            Observation::Failed { reason } => self.failure_reason = Some(reason),
            Observation::Queued | Observation::Processing => {}
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    /// Remote-issued job id.
    pub fn id(&self) -> &PackJobId {
        &self.id
    }

    /// Current state.
    pub fn status(&self) -> PackStatus {
        self.status
    }

    /// Source file URLs in submission order, without duplicates.
    pub fn requested_urls(&self) -> &[String] {
        &self.requested_urls
    }

    /// Archive location, present only once COMPLETED.
    pub fn download(&self) -> Option<&DownloadDescriptor> {
        self.download.as_ref()
    }

    /// Failure reason, present only once FAILED.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// When the job was submitted (or first seen).
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// When the job last changed state.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Remove duplicate URLs, keeping the first occurrence of each.
pub fn dedup_urls<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(Into::into)
        .filter(|u| seen.insert(u.clone()))
        .collect()
}
