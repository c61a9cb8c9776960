use serde::{Deserialize, Serialize};

use super::dsp_parameters::DspParameters;
use super::error::PipelineError;
use super::sound_transform::SoundTransform;

/// What happens to frames that arrive while the graph is being rebuilt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RebuildPolicy {
    /// Drop the frame and log a warning.
    #[default]
    Drop,
    /// Convert and hold up to `capacity` frames, replaying them once the
    /// new graph is running.
    Queue { capacity: usize },
}

/// Options for a capture session attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Policy for frames arriving mid-rebuild (default: drop).
    pub rebuild_policy: RebuildPolicy,

    /// Initial DSP parameters applied on attach from `Detached`.
    pub dsp: DspParameters,

    /// Initial monitor volume/pan.
    pub sound_transform: SoundTransform,

    /// Render the processed signal locally (default: true).
    pub enable_monitor: bool,

    /// Longest delay time the delay stage can be set to, in seconds (default: 2.0).
    pub max_delay_secs: f32,
}

impl SessionOptions {
    pub fn validate(&self) -> Result<(), String> {
        if !self.max_delay_secs.is_finite() || self.max_delay_secs <= 0.0 || self.max_delay_secs > 10.0 {
            return Err(format!("max delay must be in (0, 10] seconds, got {}", self.max_delay_secs));
        }
        if let RebuildPolicy::Queue { capacity } = self.rebuild_policy {
            if capacity == 0 {
                return Err("rebuild queue capacity must be non-zero".into());
            }
        }
        if self.dsp.delay_time > self.max_delay_secs {
            return Err(format!(
                "initial delay time {} exceeds max delay {}",
                self.dsp.delay_time, self.max_delay_secs
            ));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| PipelineError::ConfigurationFailed(format!("invalid options: {}", e)))?;
        options.validate().map_err(PipelineError::ConfigurationFailed)?;
        Ok(options)
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            rebuild_policy: RebuildPolicy::Drop,
            dsp: DspParameters::default(),
            sound_transform: SoundTransform::default(),
            enable_monitor: true,
            max_delay_secs: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SessionOptions::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let options = SessionOptions {
            max_delay_secs: 0.0,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = SessionOptions {
            rebuild_policy: RebuildPolicy::Queue { capacity: 0 },
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn from_json_fills_defaults() {
        let options = SessionOptions::from_json(
            r#"{ "rebuild_policy": { "mode": "queue", "capacity": 4 }, "dsp": { "gain": 2.0 } }"#,
        )
        .unwrap();
        assert_eq!(options.rebuild_policy, RebuildPolicy::Queue { capacity: 4 });
        assert_eq!(options.dsp.gain, 2.0);
        assert_eq!(options.dsp.delay_time, 0.5);
        assert!(options.enable_monitor);
    }

    #[test]
    fn from_json_reports_errors() {
        let err = SessionOptions::from_json("{ not json").unwrap_err();
        assert!(matches!(err, PipelineError::ConfigurationFailed(_)));
    }
}
