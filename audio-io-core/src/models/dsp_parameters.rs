use serde::{Deserialize, Serialize};

/// Full parameter set of the processing chain.
///
/// Dry/wet balances run from 0.0 (dry only) to 1.0 (wet only).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DspParameters {
    /// Delay time in seconds.
    pub delay_time: f32,
    /// Delay feedback, 0.0 to 0.99.
    pub delay_feedback: f32,
    /// Seconds taken to glide to a new delay time.
    pub delay_ramp: f32,
    pub delay_balance: f32,
    /// Reverb feedback, 0.0 to 0.99.
    pub reverb_feedback: f32,
    /// Reverb damping cutoff in Hz.
    pub reverb_cutoff_hz: f32,
    pub reverb_balance: f32,
    /// Linear output gain.
    pub gain: f32,
}

impl Default for DspParameters {
    fn default() -> Self {
        Self {
            delay_time: 0.5,
            delay_feedback: 0.5,
            delay_ramp: 0.5,
            delay_balance: 0.5,
            reverb_feedback: 0.6,
            reverb_cutoff_hz: 4000.0,
            reverb_balance: 0.5,
            gain: 1.0,
        }
    }
}

pub const MAX_FEEDBACK: f32 = 0.99;
pub const MAX_GAIN: f32 = 16.0;

/// A single parameter write. Values outside their range are clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DspParameter {
    DelayTime(f32),
    DelayFeedback(f32),
    DelayRamp(f32),
    DelayBalance(f32),
    ReverbFeedback(f32),
    ReverbCutoff(f32),
    ReverbBalance(f32),
    Gain(f32),
}

impl DspParameter {
    /// The value forced into the parameter's valid range.
    ///
    /// `max_delay_secs` bounds the delay time. NaN becomes 0.
    pub fn clamped(self, max_delay_secs: f32) -> Self {
        fn clamp(v: f32, lo: f32, hi: f32) -> f32 {
            if v.is_nan() {
                lo.max(0.0)
            } else {
                v.clamp(lo, hi)
            }
        }
        match self {
            Self::DelayTime(v) => Self::DelayTime(clamp(v, 0.0, max_delay_secs)),
            Self::DelayFeedback(v) => Self::DelayFeedback(clamp(v, 0.0, MAX_FEEDBACK)),
            Self::DelayRamp(v) => Self::DelayRamp(clamp(v, 0.0, 10.0)),
            Self::DelayBalance(v) => Self::DelayBalance(clamp(v, 0.0, 1.0)),
            Self::ReverbFeedback(v) => Self::ReverbFeedback(clamp(v, 0.0, MAX_FEEDBACK)),
            Self::ReverbCutoff(v) => Self::ReverbCutoff(clamp(v, 20.0, 20_000.0)),
            Self::ReverbBalance(v) => Self::ReverbBalance(clamp(v, 0.0, 1.0)),
            Self::Gain(v) => Self::Gain(clamp(v, 0.0, MAX_GAIN)),
        }
    }
}

impl DspParameters {
    /// Every field as an individual write, in chain order.
    pub fn as_updates(&self) -> [DspParameter; 8] {
        [
            DspParameter::DelayTime(self.delay_time),
            DspParameter::DelayFeedback(self.delay_feedback),
            DspParameter::DelayRamp(self.delay_ramp),
            DspParameter::DelayBalance(self.delay_balance),
            DspParameter::ReverbFeedback(self.reverb_feedback),
            DspParameter::ReverbCutoff(self.reverb_cutoff_hz),
            DspParameter::ReverbBalance(self.reverb_balance),
            DspParameter::Gain(self.gain),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_initial_delay_settings() {
        let p = DspParameters::default();
        assert_eq!(p.delay_time, 0.5);
        assert_eq!(p.delay_feedback, 0.5);
        assert_eq!(p.delay_ramp, 0.5);
        assert_eq!(p.gain, 1.0);
    }

    #[test]
    fn clamping() {
        assert_eq!(DspParameter::DelayTime(9.0).clamped(2.0), DspParameter::DelayTime(2.0));
        assert_eq!(DspParameter::DelayFeedback(1.5).clamped(2.0), DspParameter::DelayFeedback(0.99));
        assert_eq!(DspParameter::Gain(-1.0).clamped(2.0), DspParameter::Gain(0.0));
        assert_eq!(DspParameter::ReverbCutoff(f32::NAN).clamped(2.0), DspParameter::ReverbCutoff(20.0));
    }
}
