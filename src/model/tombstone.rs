use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline step a processing failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStep {
    DigitalTwinRequest,
    SchemaRequest,
    SchemaValidation,
    SubmodelRequest,
    UsagePolicyValidation,
}

/// Details of one processing failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingError {
    pub process_step: ProcessStep,
    pub error_detail: String,
    /// How many remote attempts were made before giving up
    pub retry_counter: u32,
    pub last_attempt: DateTime<Utc>,
}

/// Structured record of one irrecoverable failure, replacing a missing result.
///
/// Multiple tombstones may exist per node; each carries the node's global
/// asset id as correlation id and enough context (step, endpoint, attempt
/// count) to decide whether a re-run is worthwhile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub global_asset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    pub processing_error: ProcessingError,
}

impl Tombstone {
    pub fn from_failure(
        global_asset_id: impl Into<String>,
        endpoint_url: Option<String>,
        process_step: ProcessStep,
        error_detail: impl Into<String>,
        retry_counter: u32,
    ) -> Self {
        Self {
            global_asset_id: global_asset_id.into(),
            endpoint_url,
            processing_error: ProcessingError {
                process_step,
                error_detail: error_detail.into(),
                retry_counter,
                last_attempt: Utc::now(),
            },
        }
    }

    pub fn process_step(&self) -> ProcessStep {
        self.processing_error.process_step
    }
}
