//! Processing stages of the chain.
//!
//! Each node is a black box with a fixed arity: one input, or a dry and a
//! wet input for mixers. The kernels are plain; anything more
//! elaborate belongs behind the same `process` signature.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::params::{DelayParams, GainParams, MixerParams, ReverbParams};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a constructed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Delay,
    Mixer,
    Reverb,
    Gain,
}

pub enum DspNode {
    Delay(DelayNode),
    Mixer(MixerNode),
    Reverb(ReverbNode),
    Gain(GainNode),
}

impl DspNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Delay(_) => NodeKind::Delay,
            Self::Mixer(_) => NodeKind::Mixer,
            Self::Reverb(_) => NodeKind::Reverb,
            Self::Gain(_) => NodeKind::Gain,
        }
    }

    /// Render one block. `wet` is only read by mixers.
    pub fn process(&mut self, input: &[Vec<f32>], wet: Option<&[Vec<f32>]>) -> Vec<Vec<f32>> {
        match self {
            Self::Delay(node) => node.process(input),
            Self::Mixer(node) => node.process(input, wet.unwrap_or(input)),
            Self::Reverb(node) => node.process(input),
            Self::Gain(node) => node.process(input),
        }
    }
}

/// Feedback delay whose time glides linearly to new targets over the ramp duration.
pub struct DelayNode {
    params: Arc<DelayParams>,
    lines: Vec<Vec<f32>>,
    write_pos: usize,
    current_delay: f32,
    sample_rate: f32,
}

impl DelayNode {
    pub fn new(params: Arc<DelayParams>, channels: usize, sample_rate: f32, max_delay_secs: f32) -> Self {
        let line_len = (max_delay_secs * sample_rate).ceil() as usize + 1;
        let current_delay = (params.time.get() * sample_rate).clamp(0.0, (line_len - 1) as f32);
        Self {
            params,
            lines: vec![vec![0.0; line_len]; channels],
            write_pos: 0,
            current_delay,
            sample_rate,
        }
    }

    fn process(&mut self, input: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let line_len = self.lines.first().map(Vec::len).unwrap_or(1);
        let target = (self.params.time.get() * self.sample_rate).clamp(0.0, (line_len - 1) as f32);
        let feedback = self.params.feedback.get();
        let ramp_samples = self.params.ramp.get() * self.sample_rate;
        let step = if ramp_samples >= 1.0 {
            ((target - self.current_delay).abs() / ramp_samples).max(f32::EPSILON)
        } else {
            f32::INFINITY
        };

        let frames = input.first().map(Vec::len).unwrap_or(0);
        let mut output = vec![vec![0.0f32; frames]; input.len()];
        for i in 0..frames {
            if self.current_delay < target {
                self.current_delay = (self.current_delay + step).min(target);
            } else if self.current_delay > target {
                self.current_delay = (self.current_delay - step).max(target);
            }
            let delay = self.current_delay.round() as usize;
            let read_pos = (self.write_pos + line_len - delay) % line_len;

            for ((line, source), out) in self.lines.iter_mut().zip(input).zip(output.iter_mut()) {
                let x = source[i];
                if delay == 0 {
                    line[self.write_pos] = x;
                    out[i] = x;
                } else {
                    let y = line[read_pos];
                    line[self.write_pos] = x + y * feedback;
                    out[i] = y;
                }
            }
            self.write_pos = (self.write_pos + 1) % line_len;
        }
        output
    }
}

/// Crossfades a dry and a wet input.
pub struct MixerNode {
    params: Arc<MixerParams>,
}

impl MixerNode {
    pub fn new(params: Arc<MixerParams>) -> Self {
        Self { params }
    }

    fn process(&mut self, dry: &[Vec<f32>], wet: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let balance = self.params.balance.get();
        dry.iter()
            .zip(wet)
            .map(|(d, w)| d.iter().zip(w).map(|(d, w)| d * (1.0 - balance) + w * balance).collect())
            .collect()
    }
}

/// Comb delays in samples at 44.1 kHz, scaled to the running rate.
const COMB_TUNING_44K: [usize; 4] = [1116, 1188, 1277, 1356];

struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    filter_store: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            pos: 0,
            filter_store: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, x: f32, feedback: f32, damp: f32) -> f32 {
        let y = self.buffer[self.pos];
        self.filter_store = y * (1.0 - damp) + self.filter_store * damp;
        self.buffer[self.pos] = x + self.filter_store * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        y
    }
}

/// Parallel damped comb filters per channel; output is fully wet.
pub struct ReverbNode {
    params: Arc<ReverbParams>,
    combs: Vec<Vec<Comb>>,
    sample_rate: f32,
}

impl ReverbNode {
    pub fn new(params: Arc<ReverbParams>, channels: usize, sample_rate: f32) -> Self {
        let scale = sample_rate / 44_100.0;
        let combs = (0..channels)
            .map(|ch| {
                // Spread channels slightly to decorrelate the tails.
                COMB_TUNING_44K
                    .iter()
                    .map(|&len| Comb::new(((len + ch * 23) as f32 * scale) as usize))
                    .collect()
            })
            .collect();
        Self {
            params,
            combs,
            sample_rate,
        }
    }

    fn process(&mut self, input: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let feedback = self.params.feedback.get();
        let cutoff = self.params.cutoff_hz.get().min(self.sample_rate * 0.49);
        let damp = (-2.0 * PI * cutoff / self.sample_rate).exp();
        let norm = 1.0 / COMB_TUNING_44K.len() as f32;

        input
            .iter()
            .zip(self.combs.iter_mut())
            .map(|(source, combs)| {
                source
                    .iter()
                    .map(|&x| combs.iter_mut().map(|c| c.tick(x, feedback, damp)).sum::<f32>() * norm)
                    .collect()
            })
            .collect()
    }
}

pub struct GainNode {
    params: Arc<GainParams>,
}

impl GainNode {
    pub fn new(params: Arc<GainParams>) -> Self {
        Self { params }
    }

    fn process(&mut self, input: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let gain = self.params.gain.get();
        input.iter().map(|p| p.iter().map(|s| s * gain).collect()).collect()
    }
}
