use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{DeploymentId, JobId, OwnerId, ServiceId, TaskIds};

/// Output stream a log line was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of build or deploy output.
///
/// `message` keeps its line terminator; only the final flushed line of a stream may lack one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub deployment_id: DeploymentId,
    pub job_id: JobId,
    pub service_id: ServiceId,
    pub owner_id: OwnerId,
    pub stream: LogStream,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Per-writer sequence number, starting at 1.
    pub sequence: u64,
    pub phase: String,
}

impl LogEvent {
    pub fn new(
        ids: &TaskIds,
        stream: LogStream,
        message: String,
        sequence: u64,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            deployment_id: ids.deployment_id.clone(),
            job_id: ids.job_id.clone(),
            service_id: ids.service_id.clone(),
            owner_id: ids.owner_id.clone(),
            stream,
            message,
            timestamp: OffsetDateTime::now_utc(),
            sequence,
            phase: phase.into(),
        }
    }
}

/// Terminal status reported once a deployment's log streams are complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndStatus {
    Success,
    Failed,
    Timeout,
}

impl EndStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, EndStatus::Success)
    }
}

impl fmt::Display for EndStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EndStatus::Success => "success",
            EndStatus::Failed => "failed",
            EndStatus::Timeout => "timeout",
        })
    }
}

/// Marks the end of both log streams of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEndEvent {
    pub deployment_id: DeploymentId,
    pub job_id: JobId,
    pub status: EndStatus,
}

impl LogEndEvent {
    pub fn new(ids: &TaskIds, status: EndStatus) -> Self {
        Self {
            deployment_id: ids.deployment_id.clone(),
            job_id: ids.job_id.clone(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> TaskIds {
        TaskIds::new("dep-1", "job-1", "svc-1", "own-1")
    }

    #[test]
    fn log_event_wire_shape() {
        let event = LogEvent::new(&ids(), LogStream::Stderr, "boom\n".into(), 7, "build");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["deployment_id"], "dep-1");
        assert_eq!(value["owner_id"], "own-1");
        assert_eq!(value["stream"], "stderr");
        assert_eq!(value["message"], "boom\n");
        assert_eq!(value["sequence"], 7);
        assert_eq!(value["phase"], "build");
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));

        let back: LogEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn end_event_status_is_lowercase() {
        let event = LogEndEvent::new(&ids(), EndStatus::Timeout);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""status":"timeout""#));
        assert!(!EndStatus::Failed.is_success());
    }
}
