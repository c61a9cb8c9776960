use crate::models::buffers::PlanarBuffer;
use crate::models::dsp_parameters::{DspParameter, DspParameters};
use crate::models::error::PipelineError;
use crate::models::format::FormatDescriptor;
use crate::models::state::GraphState;

use super::node::{DelayNode, DspNode, GainNode, MixerNode, NodeId, NodeKind, ReverbNode};
use super::params::DspControls;

/// Receives every buffer rendered by the last stage.
pub type TapBlock = Box<dyn FnMut(PlanarBuffer) + Send>;

/// Where a stage reads from: the raw input tap or an earlier stage's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bus {
    Input,
    Stage(usize),
}

struct DspStage {
    id: NodeId,
    node: DspNode,
    input: Bus,
    wet: Option<Bus>,
}

/// The fixed chain, built in one place and dropped as a unit:
///
/// ```text
/// input ─┬─→ delay ─→ delay mix(dry: input, wet: delay) ─┬─→ reverb ─→ reverb mix(dry, wet: reverb) ─→ booster ─→ tap
///        └──────────────↗                                └──────────────↗
/// ```
struct DspChain {
    format: FormatDescriptor,
    stages: Vec<DspStage>,
}

impl DspChain {
    fn build(format: FormatDescriptor, controls: &DspControls) -> Self {
        let channels = format.channels() as usize;
        let rate = format.sample_rate() as f32;

        let delay = DspNode::Delay(DelayNode::new(
            controls.delay.clone(),
            channels,
            rate,
            controls.max_delay_secs(),
        ));
        let delay_mix = DspNode::Mixer(MixerNode::new(controls.delay_mix.clone()));
        let reverb = DspNode::Reverb(ReverbNode::new(controls.reverb.clone(), channels, rate));
        let reverb_mix = DspNode::Mixer(MixerNode::new(controls.reverb_mix.clone()));
        let booster = DspNode::Gain(GainNode::new(controls.booster.clone()));

        let stage = |node, input, wet| DspStage {
            id: NodeId::next(),
            node,
            input,
            wet,
        };
        let stages = vec![
            stage(delay, Bus::Input, None),
            stage(delay_mix, Bus::Input, Some(Bus::Stage(0))),
            stage(reverb, Bus::Stage(1), None),
            stage(reverb_mix, Bus::Stage(1), Some(Bus::Stage(2))),
            stage(booster, Bus::Stage(3), None),
        ];

        Self { format, stages }
    }

    fn render(&mut self, input: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
        let mut outputs: Vec<Vec<Vec<f32>>> = Vec::with_capacity(self.stages.len());
        for stage in &mut self.stages {
            let source = resolve(stage.input, &input, &outputs);
            let wet = stage.wet.map(|bus| resolve(bus, &input, &outputs));
            let rendered = stage.node.process(source, wet);
            outputs.push(rendered);
        }
        outputs.pop().unwrap_or(input)
    }
}

fn resolve<'a>(bus: Bus, input: &'a [Vec<f32>], outputs: &'a [Vec<Vec<f32>>]) -> &'a [Vec<f32>] {
    match bus {
        Bus::Input => input,
        Bus::Stage(i) => &outputs[i],
    }
}

/// Point-in-time view of the graph for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub state: GraphState,
    pub format: Option<FormatDescriptor>,
    pub nodes: Vec<(NodeId, NodeKind)>,
    pub rebuild_count: u64,
    pub has_tap: bool,
}

/// Owns the processing chain and its lifecycle.
///
/// Topology changes (`attach`, `rebuild`, `dispose`) and `render` all take
/// `&mut self`, so a rebuild can never interleave with a block in flight.
/// Parameter writes go through [`DspControls`] and need no exclusivity.
pub struct DspGraph {
    state: GraphState,
    chain: Option<DspChain>,
    controls: DspControls,
    tap: Option<TapBlock>,
    rebuild_count: u64,
}

impl DspGraph {
    pub fn new(params: &DspParameters, max_delay_secs: f32) -> Self {
        Self {
            state: GraphState::Detached,
            chain: None,
            controls: DspControls::new(params, max_delay_secs),
            tap: None,
            rebuild_count: 0,
        }
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    /// DSP-native format the chain was built for.
    pub fn format(&self) -> Option<FormatDescriptor> {
        self.chain.as_ref().map(|c| c.format)
    }

    pub fn controls(&self) -> &DspControls {
        &self.controls
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.chain
            .as_ref()
            .map(|c| c.stages.iter().map(|s| s.id).collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            state: self.state,
            format: self.format(),
            nodes: self
                .chain
                .as_ref()
                .map(|c| c.stages.iter().map(|s| (s.id, s.node.kind())).collect())
                .unwrap_or_default(),
            rebuild_count: self.rebuild_count,
            has_tap: self.tap.is_some(),
        }
    }

    /// Build the chain for `format`. Detached → Attached.
    pub fn attach(&mut self, format: &FormatDescriptor) -> Result<(), PipelineError> {
        if self.state != GraphState::Detached {
            return Err(PipelineError::ConfigurationFailed(
                "graph is already attached".into(),
            ));
        }
        let format = format.to_dsp_format();
        self.chain = Some(DspChain::build(format, &self.controls));
        self.state = GraphState::Attached;
        log::info!("DSP graph attached ({})", format);
        Ok(())
    }

    /// Tear the chain down and build it again for `format`.
    /// Attached → Rebuilding → Attached. The tap goes with the old chain.
    pub fn rebuild(&mut self, format: &FormatDescriptor) -> Result<(), PipelineError> {
        if self.state == GraphState::Detached {
            return Err(PipelineError::ConfigurationFailed(
                "cannot rebuild a detached graph".into(),
            ));
        }
        self.state = GraphState::Rebuilding;
        self.tap = None;
        self.chain = None;

        let format = format.to_dsp_format();
        self.chain = Some(DspChain::build(format, &self.controls));
        self.rebuild_count += 1;
        self.state = GraphState::Attached;
        log::info!("DSP graph rebuilt ({}), rebuild #{}", format, self.rebuild_count);
        Ok(())
    }

    /// Drop every node and the tap. No-op when already detached.
    pub fn dispose(&mut self) {
        if self.state == GraphState::Detached {
            log::debug!("DSP graph already detached");
            return;
        }
        self.tap = None;
        self.chain = None;
        self.state = GraphState::Detached;
        log::info!("DSP graph disposed");
    }

    /// Install the tap on the booster output, replacing any previous one.
    pub fn install_tap(&mut self, tap: TapBlock) -> Result<(), PipelineError> {
        if self.state != GraphState::Attached {
            return Err(PipelineError::ConfigurationFailed(
                "tap requires an attached graph".into(),
            ));
        }
        self.tap = Some(tap);
        Ok(())
    }

    pub fn remove_tap(&mut self) {
        self.tap = None;
    }

    /// Run one buffer through the chain and hand the result to the tap.
    pub fn render(&mut self, buffer: PlanarBuffer) -> Result<(), PipelineError> {
        let chain = match (&self.state, self.chain.as_mut()) {
            (GraphState::Attached, Some(chain)) => chain,
            _ => {
                return Err(PipelineError::ConfigurationFailed(
                    "graph is not attached".into(),
                ))
            }
        };
        if !chain.format.same_graph_layout(buffer.format()) {
            return Err(PipelineError::InvalidFormat(format!(
                "graph runs {}, buffer is {}",
                chain.format,
                buffer.format()
            )));
        }

        let presentation_time = buffer.presentation_time;
        let rendered = chain.render(buffer.into_planes());
        let mut output = PlanarBuffer::from_planes(chain.format, rendered)?;
        output.presentation_time = presentation_time;

        if let Some(tap) = self.tap.as_mut() {
            tap(output);
        }
        Ok(())
    }

    pub fn set_parameter(&self, parameter: DspParameter) {
        self.controls.apply(parameter);
    }

    pub fn set_parameters(&self, parameters: &DspParameters) {
        self.controls.load(parameters);
    }

    /// Reload parameters and delay range before a fresh attach.
    pub(crate) fn reset_controls(&self, parameters: &DspParameters, max_delay_secs: f32) {
        self.controls.set_max_delay_secs(max_delay_secs);
        self.controls.load(parameters);
    }
}
