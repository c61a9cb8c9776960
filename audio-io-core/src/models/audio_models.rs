use serde::{Deserialize, Serialize};

/// Transport type for an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioTransportType {
    BuiltIn,
    Bluetooth,
    BluetoothLE,
    Usb,
    Virtual,
    Unknown,
}

/// The capture device backing a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub transport_type: Option<AudioTransportType>,
}

/// Counters for debugging a capture session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDiagnostics {
    pub frames_received: u64,
    pub frames_forwarded: u64,
    pub frames_dropped_format_mismatch: u64,
    pub frames_dropped_construction: u64,
    pub frames_dropped_rebuilding: u64,
    pub frames_dropped_inactive: u64,
    pub frames_queued: u64,
    pub encoder_rejections: u64,
    pub recorder_rejections: u64,
    pub monitor_failures: u64,
    pub graph_rebuilds: u64,
    pub device_attachments: u64,
    pub input_format: String,
}

impl SessionDiagnostics {
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped_format_mismatch
            + self.frames_dropped_construction
            + self.frames_dropped_rebuilding
            + self.frames_dropped_inactive
    }
}
