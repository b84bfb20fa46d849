//! JSON output structures for the mirrorsync CLI

use mirrorsync_engine::{describe_failure, ApplyResult, DestinationReport};
use mirrorsync_sync::SyncSummary;
use serde::{Deserialize, Serialize};

/// Complete JSON output for one invocation
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResultJson {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// One entry per destination, in configuration order
    pub destinations: Vec<DestinationJson>,
    /// Overall result
    pub result: OperationResult,
}

/// Operation metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// mirrorsync version
    pub version: String,
    /// Subcommand that produced the report
    pub operation: String,
    /// Timestamp when the report was produced
    pub timestamp: String,
    /// Source path
    pub source_path: String,
}

/// Outcome for one destination
#[derive(Debug, Serialize, Deserialize)]
pub struct DestinationJson {
    /// Destination root
    pub destination_path: String,
    /// Mode the destination was processed in
    pub mode: String,
    /// No fatal error and no failed task
    pub success: bool,
    /// Fatal error that aborted this destination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Change counters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SyncSummary>,
    /// Sync record written for this destination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
    /// Entries skipped while scanning
    pub skipped: Vec<String>,
    /// Apply statistics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_stats: Option<ApplyStatsJson>,
}

/// Apply statistics in JSON format
#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyStatsJson {
    /// Number of files copied
    pub files_copied: usize,
    /// Number of files deleted
    pub files_deleted: usize,
    /// Total bytes copied
    pub bytes_copied: u64,
    /// Tasks never dispatched
    pub cancelled: usize,
    /// Duration in seconds
    pub duration_seconds: f64,
    /// Failed tasks
    pub failures: Vec<FailureJson>,
}

/// One failed task
#[derive(Debug, Serialize, Deserialize)]
pub struct FailureJson {
    /// `copy` or `delete`
    pub operation: String,
    /// Relative path
    pub path: String,
    /// Short failure category
    pub reason: String,
    /// Full error message
    pub message: String,
}

/// Overall operation result
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether every destination succeeded
    pub success: bool,
    /// Result message
    pub message: String,
}

impl RunResultJson {
    /// Build the report for `reports` produced by `operation`
    pub fn new(source_path: String, operation: &str, reports: &[DestinationReport]) -> Self {
        let destinations: Vec<DestinationJson> =
            reports.iter().map(DestinationJson::from_report).collect();
        let failed = destinations.iter().filter(|d| !d.success).count();

        let success = failed == 0;
        let message = if success {
            format!(
                "{} completed for {} destination(s)",
                operation,
                destinations.len()
            )
        } else {
            format!(
                "{} failed for {} of {} destination(s)",
                operation,
                failed,
                destinations.len()
            )
        };

        Self {
            metadata: OperationMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                operation: operation.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                source_path,
            },
            destinations,
            result: OperationResult { success, message },
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl DestinationJson {
    fn from_report(report: &DestinationReport) -> Self {
        let mut json = Self {
            destination_path: report.destination.display().to_string(),
            mode: report.mode.to_string(),
            success: report.is_success(),
            error: None,
            summary: None,
            log_path: None,
            skipped: Vec::new(),
            apply_stats: None,
        };

        match &report.outcome {
            Ok(run) => {
                json.summary = Some(run.summary);
                json.log_path = run.log_path.as_ref().map(|p| p.display().to_string());
                json.skipped = run.skipped.iter().map(ToString::to_string).collect();
                json.apply_stats = run.apply.as_ref().map(ApplyStatsJson::from_apply_result);
            }
            Err(e) => json.error = Some(e.to_string()),
        }

        json
    }
}

impl ApplyStatsJson {
    fn from_apply_result(result: &ApplyResult) -> Self {
        Self {
            files_copied: result.copied.len(),
            files_deleted: result.deleted.len(),
            bytes_copied: result.bytes_copied,
            cancelled: result.cancelled.len(),
            duration_seconds: result.duration.as_secs_f64(),
            failures: result
                .failed
                .iter()
                .map(|failure| FailureJson {
                    operation: failure.kind.to_string(),
                    path: failure.path.to_string(),
                    reason: describe_failure(&failure.error).to_string(),
                    message: failure.error.to_string(),
                })
                .collect(),
        }
    }
}
