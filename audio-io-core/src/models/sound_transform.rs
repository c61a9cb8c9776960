use serde::{Deserialize, Serialize};

/// Volume and pan applied to the monitor output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundTransform {
    /// Linear volume, 0.0 to 1.0.
    pub volume: f32,
    /// Stereo position, -1.0 (left) to 1.0 (right).
    pub pan: f32,
}

impl SoundTransform {
    pub fn new(volume: f32, pan: f32) -> Self {
        Self { volume, pan }.clamped()
    }

    /// Same transform with both fields forced into range. NaN maps to the default.
    pub fn clamped(self) -> Self {
        let volume = if self.volume.is_nan() { 1.0 } else { self.volume.clamp(0.0, 1.0) };
        let pan = if self.pan.is_nan() { 0.0 } else { self.pan.clamp(-1.0, 1.0) };
        Self { volume, pan }
    }
}

impl Default for SoundTransform {
    fn default() -> Self {
        Self { volume: 1.0, pan: 0.0 }
    }
}
