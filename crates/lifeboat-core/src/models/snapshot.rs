use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::SnapshotError;
use crate::format::human_bytes;

/// Phase of a backup or restore job as reported by the backup controller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobPhase {
    #[default]
    New,
    InProgress,
    Completed,
    PartiallyFailed,
    Failed,
    FailedValidation,
    Deleting,
    #[serde(other)]
    Unknown,
}

impl JobPhase {
    /// Terminal phases never change again. `PartiallyFailed` is terminal and
    /// is not an error.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Completed
                | JobPhase::PartiallyFailed
                | JobPhase::Failed
                | JobPhase::FailedValidation
        )
    }

    /// Decode an optional phase string; an absent or empty phase means the
    /// controller has not picked the job up yet.
    pub fn from_status(phase: Option<&str>) -> Self {
        match phase {
            None | Some("") => JobPhase::New,
            Some(phase) => phase.parse().unwrap_or(JobPhase::Unknown),
        }
    }
}

impl Display for JobPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            JobPhase::New => "New",
            JobPhase::InProgress => "InProgress",
            JobPhase::Completed => "Completed",
            JobPhase::PartiallyFailed => "PartiallyFailed",
            JobPhase::Failed => "Failed",
            JobPhase::FailedValidation => "FailedValidation",
            JobPhase::Deleting => "Deleting",
            JobPhase::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for JobPhase {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(JobPhase::New),
            "InProgress" => Ok(JobPhase::InProgress),
            "Completed" => Ok(JobPhase::Completed),
            "PartiallyFailed" => Ok(JobPhase::PartiallyFailed),
            "Failed" => Ok(JobPhase::Failed),
            "FailedValidation" => Ok(JobPhase::FailedValidation),
            "Deleting" => Ok(JobPhase::Deleting),
            _ => Err(SnapshotError::Decode(format!("Invalid job phase: {}", s))),
        }
    }
}

/// What caused a backup to be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotTrigger {
    Manual,
    PreUpgrade,
    Schedule,
}

impl Display for SnapshotTrigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SnapshotTrigger::Manual => write!(f, "manual"),
            SnapshotTrigger::PreUpgrade => write!(f, "pre-upgrade"),
            SnapshotTrigger::Schedule => write!(f, "schedule"),
        }
    }
}

impl FromStr for SnapshotTrigger {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SnapshotTrigger::Manual),
            "pre-upgrade" => Ok(SnapshotTrigger::PreUpgrade),
            "schedule" => Ok(SnapshotTrigger::Schedule),
            _ => Err(SnapshotError::Validation(format!(
                "Invalid snapshot trigger: {}",
                s
            ))),
        }
    }
}

/// Aggregate over a backup's per-volume sub-jobs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSummary {
    pub count: u64,
    /// Volume backups whose phase is exactly `Completed`.
    pub success_count: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub name: String,
    pub status: JobPhase,
    pub trigger: Option<SnapshotTrigger>,
    pub app_slug: Option<String>,
    pub sequence: Option<i64>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub volume_count: u64,
    pub volume_success_count: u64,
    pub volume_bytes: u64,
    pub volume_size_human: String,
}

impl Snapshot {
    pub fn volume_summary(&self) -> VolumeSummary {
        VolumeSummary {
            count: self.volume_count,
            success_count: self.volume_success_count,
            total_bytes: self.volume_bytes,
        }
    }
}

/// Error or warning line surfaced to the operator verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotIssue {
    pub title: String,
    pub message: String,
    pub namespace: Option<String>,
}

/// Pre/post backup hook run recorded in the backup logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookExecution {
    pub name: String,
    pub namespace: Option<String>,
    pub pod_name: Option<String>,
    pub container_name: Option<String>,
    pub phase: Option<String>,
    pub command: Option<String>,
    pub started: Option<DateTime<Utc>>,
    pub failed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedBackupLogs {
    pub errors: Vec<SnapshotIssue>,
    pub warnings: Vec<SnapshotIssue>,
    pub hook_executions: Vec<HookExecution>,
}

/// Progress of one volume backup or restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeProgress {
    pub name: String,
    pub pod_name: Option<String>,
    pub pod_namespace: Option<String>,
    pub phase: String,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub size_bytes_human: String,
    pub done_bytes_human: String,
    pub completion_percent: Option<u8>,
    pub time_remaining_seconds: Option<u64>,
}

/// Byte counters and timing of a single volume transfer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub total_bytes: u64,
    pub bytes_done: u64,
    pub started: Option<DateTime<Utc>>,
}

impl TransferProgress {
    /// `bytes_done / total_bytes` as a whole percentage.
    pub fn completion_percent(&self) -> Option<u8> {
        if self.total_bytes == 0 {
            return None;
        }
        let done = self.bytes_done.min(self.total_bytes) as f64;
        Some(((done / self.total_bytes as f64) * 100.0).round() as u8)
    }

    /// Remaining bytes divided by the average rate so far
    /// (`bytes_done / elapsed_seconds`).
    pub fn time_remaining_seconds(&self, now: DateTime<Utc>) -> Option<u64> {
        let started = self.started?;
        let elapsed = (now - started).num_seconds();
        if elapsed <= 0 || self.bytes_done == 0 || self.total_bytes == 0 {
            return None;
        }
        let rate = self.bytes_done as f64 / elapsed as f64;
        let remaining = self.total_bytes.saturating_sub(self.bytes_done) as f64;
        Some((remaining / rate).round() as u64)
    }
}

impl VolumeProgress {
    pub fn new(
        name: String,
        pod_name: Option<String>,
        pod_namespace: Option<String>,
        phase: String,
        finished: Option<DateTime<Utc>>,
        progress: TransferProgress,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            pod_name,
            pod_namespace,
            phase,
            started: progress.started,
            finished,
            size_bytes_human: human_bytes(progress.total_bytes),
            done_bytes_human: human_bytes(progress.bytes_done),
            completion_percent: progress.completion_percent(),
            time_remaining_seconds: if finished.is_some() {
                None
            } else {
                progress.time_remaining_seconds(now)
            },
        }
    }
}

/// Full view of one backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDetail {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub namespaces: Vec<String>,
    pub volumes: Vec<VolumeProgress>,
    /// Present only for terminal backups whose logs could be fetched and parsed.
    pub logs: Option<ParsedBackupLogs>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_job_phase_decoding() {
        assert_eq!(JobPhase::from_status(None), JobPhase::New);
        assert_eq!(JobPhase::from_status(Some("")), JobPhase::New);
        assert_eq!(JobPhase::from_status(Some("InProgress")), JobPhase::InProgress);
        assert_eq!(JobPhase::from_status(Some("Exploded")), JobPhase::Unknown);

        let phase: JobPhase = serde_json::from_str("\"Something\"").unwrap();
        assert_eq!(phase, JobPhase::Unknown);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(JobPhase::Completed.is_terminal());
        assert!(JobPhase::PartiallyFailed.is_terminal());
        assert!(JobPhase::Failed.is_terminal());
        assert!(JobPhase::FailedValidation.is_terminal());
        assert!(!JobPhase::New.is_terminal());
        assert!(!JobPhase::InProgress.is_terminal());
        assert!(!JobPhase::Deleting.is_terminal());
    }

    #[test]
    fn test_trigger_round_trips_through_strings() {
        for trigger in [
            SnapshotTrigger::Manual,
            SnapshotTrigger::PreUpgrade,
            SnapshotTrigger::Schedule,
        ] {
            assert_eq!(trigger.to_string().parse::<SnapshotTrigger>().unwrap(), trigger);
        }
        assert!("nightly".parse::<SnapshotTrigger>().is_err());
    }

    #[test]
    fn test_transfer_progress() {
        let now = Utc::now();
        let progress = TransferProgress {
            total_bytes: 1000,
            bytes_done: 250,
            started: Some(now - Duration::seconds(10)),
        };

        assert_eq!(progress.completion_percent(), Some(25));
        // 25 bytes/s, 750 bytes left.
        assert_eq!(progress.time_remaining_seconds(now), Some(30));
    }

    #[test]
    fn test_transfer_progress_without_data() {
        let now = Utc::now();
        let progress = TransferProgress {
            total_bytes: 0,
            bytes_done: 0,
            started: None,
        };
        assert_eq!(progress.completion_percent(), None);
        assert_eq!(progress.time_remaining_seconds(now), None);

        let stalled = TransferProgress {
            total_bytes: 100,
            bytes_done: 0,
            started: Some(now - Duration::seconds(5)),
        };
        assert_eq!(stalled.completion_percent(), Some(0));
        assert_eq!(stalled.time_remaining_seconds(now), None);
    }
}
