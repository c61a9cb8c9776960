use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Result returned when a recording sink is finished.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub metadata: RecordingMetadata,
    pub checksum: String,
}

/// Metadata stored alongside a recording.
///
/// Serializable for the JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub sample_rate: f64,
    pub channels: u16,
    pub frames: u64,
    pub buffers: u64,
    pub is_encrypted: bool,
    pub created_at: String,
    pub encryption_algorithm: Option<String>,
    pub encryption_key_id: Option<String>,
}

/// What the recorder knows when it closes a file.
#[derive(Debug, Clone)]
pub struct RecordingSummary<'a> {
    pub file_path: &'a str,
    pub checksum: &'a str,
    pub sample_rate: f64,
    pub channels: u16,
    pub frames: u64,
    pub buffers: u64,
}

impl RecordingMetadata {
    pub fn new(
        summary: RecordingSummary<'_>,
        encryption_algorithm: Option<String>,
        encryption_key_id: Option<String>,
    ) -> Self {
        let duration_secs = if summary.sample_rate > 0.0 {
            summary.frames as f64 / summary.sample_rate
        } else {
            0.0
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs,
            file_path: summary.file_path.to_string(),
            checksum: summary.checksum.to_string(),
            sample_rate: summary.sample_rate,
            channels: summary.channels,
            frames: summary.frames,
            buffers: summary.buffers,
            is_encrypted: encryption_algorithm.is_some(),
            created_at: chrono::Utc::now().to_rfc3339(),
            encryption_algorithm,
            encryption_key_id,
        }
    }
}
