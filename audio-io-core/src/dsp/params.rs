//! Live parameter storage shared between the control surface and DSP nodes.
//!
//! Each value is an `f32` stored in an `AtomicU32`, so writes from any thread
//! never take the graph lock. Topology changes still go through the graph.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::models::dsp_parameters::{DspParameter, DspParameters};

#[derive(Debug)]
pub struct AtomicParam(AtomicU32);

impl AtomicParam {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct DelayParams {
    pub time: AtomicParam,
    pub feedback: AtomicParam,
    pub ramp: AtomicParam,
}

#[derive(Debug)]
pub struct MixerParams {
    pub balance: AtomicParam,
}

#[derive(Debug)]
pub struct ReverbParams {
    pub feedback: AtomicParam,
    pub cutoff_hz: AtomicParam,
}

#[derive(Debug)]
pub struct GainParams {
    pub gain: AtomicParam,
}

/// Cloneable handle to every parameter of the chain.
///
/// Nodes built by the graph hold clones of the same `Arc`s, so a write is
/// picked up by the next rendered block. The handle outlives rebuilds.
#[derive(Debug, Clone)]
pub struct DspControls {
    pub(crate) delay: Arc<DelayParams>,
    pub(crate) delay_mix: Arc<MixerParams>,
    pub(crate) reverb: Arc<ReverbParams>,
    pub(crate) reverb_mix: Arc<MixerParams>,
    pub(crate) booster: Arc<GainParams>,
    max_delay_secs: Arc<AtomicParam>,
}

impl DspControls {
    pub fn new(params: &DspParameters, max_delay_secs: f32) -> Self {
        let controls = Self {
            delay: Arc::new(DelayParams {
                time: AtomicParam::new(0.0),
                feedback: AtomicParam::new(0.0),
                ramp: AtomicParam::new(0.0),
            }),
            delay_mix: Arc::new(MixerParams { balance: AtomicParam::new(0.0) }),
            reverb: Arc::new(ReverbParams {
                feedback: AtomicParam::new(0.0),
                cutoff_hz: AtomicParam::new(0.0),
            }),
            reverb_mix: Arc::new(MixerParams { balance: AtomicParam::new(0.0) }),
            booster: Arc::new(GainParams { gain: AtomicParam::new(0.0) }),
            max_delay_secs: Arc::new(AtomicParam::new(max_delay_secs)),
        };
        controls.load(params);
        controls
    }

    pub fn max_delay_secs(&self) -> f32 {
        self.max_delay_secs.get()
    }

    pub fn set_max_delay_secs(&self, secs: f32) {
        self.max_delay_secs.set(secs);
        let time = self.delay.time.get();
        if time > secs {
            self.delay.time.set(secs);
        }
    }

    /// Write one parameter, clamped to its range.
    pub fn apply(&self, parameter: DspParameter) {
        match parameter.clamped(self.max_delay_secs()) {
            DspParameter::DelayTime(v) => self.delay.time.set(v),
            DspParameter::DelayFeedback(v) => self.delay.feedback.set(v),
            DspParameter::DelayRamp(v) => self.delay.ramp.set(v),
            DspParameter::DelayBalance(v) => self.delay_mix.balance.set(v),
            DspParameter::ReverbFeedback(v) => self.reverb.feedback.set(v),
            DspParameter::ReverbCutoff(v) => self.reverb.cutoff_hz.set(v),
            DspParameter::ReverbBalance(v) => self.reverb_mix.balance.set(v),
            DspParameter::Gain(v) => self.booster.gain.set(v),
        }
    }

    pub fn load(&self, params: &DspParameters) {
        for update in params.as_updates() {
            self.apply(update);
        }
    }

    pub fn snapshot(&self) -> DspParameters {
        DspParameters {
            delay_time: self.delay.time.get(),
            delay_feedback: self.delay.feedback.get(),
            delay_ramp: self.delay.ramp.get(),
            delay_balance: self.delay_mix.balance.get(),
            reverb_feedback: self.reverb.feedback.get(),
            reverb_cutoff_hz: self.reverb.cutoff_hz.get(),
            reverb_balance: self.reverb_mix.balance.get(),
            gain: self.booster.gain.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_param_round_trips_bits() {
        let p = AtomicParam::new(0.25);
        assert_eq!(p.get(), 0.25);
        p.set(-3.5);
        assert_eq!(p.get(), -3.5);
    }

    #[test]
    fn load_and_snapshot() {
        let controls = DspControls::new(&DspParameters::default(), 2.0);
        assert_eq!(controls.snapshot(), DspParameters::default());
    }

    #[test]
    fn apply_is_visible_through_clones() {
        let controls = DspControls::new(&DspParameters::default(), 2.0);
        let handle = controls.clone();
        handle.apply(DspParameter::Gain(3.0));
        assert_eq!(controls.snapshot().gain, 3.0);
    }

    #[test]
    fn lowering_max_delay_clamps_time() {
        let controls = DspControls::new(&DspParameters::default(), 2.0);
        controls.apply(DspParameter::DelayTime(1.5));
        controls.set_max_delay_secs(1.0);
        assert_eq!(controls.snapshot().delay_time, 1.0);
        controls.apply(DspParameter::DelayTime(5.0));
        assert_eq!(controls.snapshot().delay_time, 1.0);
    }
}
