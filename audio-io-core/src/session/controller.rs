use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::dsp::graph::{DspGraph, GraphSnapshot};
use crate::dsp::params::DspControls;
use crate::models::audio_models::SessionDiagnostics;
use crate::models::buffers::{PlanarBuffer, RawFrame};
use crate::models::config::{RebuildPolicy, SessionOptions};
use crate::models::dsp_parameters::{DspParameter, DspParameters};
use crate::models::error::PipelineError;
use crate::models::format::FormatDescriptor;
use crate::models::sound_transform::SoundTransform;
use crate::models::state::{GraphState, SessionState};
use crate::monitor::playback_monitor::PlaybackMonitor;
use crate::processing::buffer_bridge::BufferBridge;
use crate::transport::adapter::TransportAdapter;
use crate::traits::audio_engine::AudioEngine;
use crate::traits::capture_device::{CaptureDevice, RawFrameCallback};
use crate::traits::capture_session::CaptureSession;
use crate::traits::playback::PlaybackRenderer;
use crate::traits::session_delegate::SessionDelegate;
use crate::traits::stream_sink::StreamSink;

/// Everything that changes with the device attachment, guarded as one unit.
struct CaptureContext {
    state: SessionState,
    graph: DspGraph,
    engine: Box<dyn AudioEngine>,
    device: Option<Box<dyn CaptureDevice>>,
    input_format: Option<FormatDescriptor>,
    options: SessionOptions,
    /// Bumped on every attach and teardown; callbacks from an older
    /// attachment are ignored.
    generation: u64,
}

/// The tap's half of the pipeline: bridge → transport, then the monitor.
///
/// The graph's tap only fills `outbox`. Buffers are delivered by `flush`
/// once the context lock is released, so sinks may call back into the
/// controller.
struct OutputPath {
    bridge: BufferBridge,
    transport: TransportAdapter,
    monitor: PlaybackMonitor,
    diagnostics: Mutex<SessionDiagnostics>,
    outbox: Mutex<Vec<PlanarBuffer>>,
    /// Held by the thread currently delivering. Never taken by lifecycle code.
    delivery: Mutex<()>,
}

impl OutputPath {
    /// Deliver everything the graph has rendered, in order.
    ///
    /// A call made while another delivery is running (including one from
    /// inside a sink) returns at once; the running delivery picks the
    /// buffers up.
    fn flush(&self) {
        while let Some(delivering) = self.delivery.try_lock() {
            loop {
                let batch = std::mem::take(&mut *self.outbox.lock());
                if batch.is_empty() {
                    break;
                }
                for buffer in batch {
                    self.deliver(buffer);
                }
            }
            drop(delivering);
            if self.outbox.lock().is_empty() {
                break;
            }
        }
    }

    fn deliver(&self, buffer: PlanarBuffer) {
        let format = *buffer.format();
        let streaming = match self.bridge.to_streaming(&buffer, &format) {
            Ok(streaming) => streaming,
            Err(e) => {
                self.record_drop(&e);
                return;
            }
        };

        let outcome = self.transport.forward(&streaming);
        {
            let mut d = self.diagnostics.lock();
            d.frames_forwarded += 1;
            if !outcome.recorder_accepted {
                d.recorder_rejections += 1;
            }
            if !outcome.encoder_accepted {
                d.encoder_rejections += 1;
            }
        }

        // Sinks have their copy; the monitor only ever sees what capture already kept.
        self.monitor.schedule_buffer(buffer);
    }

    fn record(&self, update: impl FnOnce(&mut SessionDiagnostics)) {
        update(&mut self.diagnostics.lock());
    }

    fn record_drop(&self, error: &PipelineError) {
        log::warn!("Dropping frame: {}", error);
        self.record(|d| match error {
            PipelineError::FormatMismatch { .. } => d.frames_dropped_format_mismatch += 1,
            _ => d.frames_dropped_construction += 1,
        });
    }
}

struct ControllerInner {
    /// Serializes attach, detach, dispose and format-change rebuilds.
    lifecycle: Mutex<()>,
    context: Mutex<CaptureContext>,
    rebuilding: AtomicBool,
    policy: RwLock<RebuildPolicy>,
    pending: Mutex<VecDeque<PlanarBuffer>>,
    output: Arc<OutputPath>,
    controls: DspControls,
    delegate: RwLock<Option<Arc<dyn SessionDelegate>>>,
}

impl ControllerInner {
    fn attach(self: &Arc<Self>, mut device: Box<dyn CaptureDevice>, options: SessionOptions) -> Result<(), PipelineError> {
        options.validate().map_err(PipelineError::ConfigurationFailed)?;
        let lifecycle = self.lifecycle.lock();

        *self.policy.write() = options.rebuild_policy;
        self.rebuilding.store(true, Ordering::Release);
        self.notify_state(SessionState::Rebuilding);

        // The old device is stopped outside the context lock: its stop may
        // wait for a callback that is itself waiting on that lock.
        let previous = {
            let mut ctx = self.context.lock();
            ctx.state = SessionState::Rebuilding;
            ctx.generation += 1;
            ctx.device.take()
        };
        if let Some(mut old) = previous {
            log::info!("Releasing device '{}'", old.device_info().name);
            if let Err(e) = old.stop() {
                log::warn!("Failed to stop previous device: {}", e);
            }
        }

        let configured = {
            let mut ctx = self.context.lock();
            let result = self.configure(&mut ctx, device.as_ref(), &options);
            if result.is_err() {
                self.teardown(&mut ctx);
            }
            result.map(|rebuilt| (rebuilt, ctx.generation))
        };
        let (rebuilt, generation) = match configured {
            Ok(configured) => configured,
            Err(e) => return Err(self.fail_attach(e)),
        };

        if let Err(e) = device.start(self.frame_callback(generation)) {
            self.teardown(&mut self.context.lock());
            return Err(self.fail_attach(e));
        }

        let format = {
            let mut ctx = self.context.lock();
            log::info!("Device '{}' attached", device.device_info().name);
            ctx.device = Some(device);
            ctx.state = SessionState::Attached;
            self.output.record(|d| d.device_attachments += 1);
            ctx.input_format
        };
        self.finish_rebuild();
        drop(lifecycle);
        self.output.flush();

        self.notify_state(SessionState::Attached);
        if let (Some(format), true) = (format, rebuilt) {
            self.notify_rebuilt(&format);
        }
        Ok(())
    }

    /// Validate the device and bring graph, monitor and engine up for its
    /// format. Returns whether an existing graph was rebuilt.
    fn configure(
        &self,
        ctx: &mut CaptureContext,
        device: &dyn CaptureDevice,
        options: &SessionOptions,
    ) -> Result<bool, PipelineError> {
        if !device.is_available() {
            return Err(PipelineError::DeviceUnavailable(device.device_info().name));
        }
        let format = device.format()?;

        let fresh = ctx.graph.state() == GraphState::Detached;
        if fresh {
            ctx.graph.reset_controls(&options.dsp, options.max_delay_secs);
            self.output.bridge.reset_clock();
        } else {
            self.controls.set_max_delay_secs(options.max_delay_secs);
        }
        ctx.options = options.clone();

        self.build_graph(ctx, format)?;
        // Creates the player when monitoring is enabled, otherwise only stored.
        self.output.monitor.set_sound_transform(options.sound_transform);
        Ok(!fresh)
    }

    /// Stop the engine, invalidate the encoder, (re)build the chain and its
    /// tap, rebind the monitor and start the engine again.
    fn build_graph(&self, ctx: &mut CaptureContext, format: FormatDescriptor) -> Result<(), PipelineError> {
        if ctx.engine.is_running() {
            if let Err(e) = ctx.engine.stop() {
                log::warn!("Engine failed to stop cleanly: {}", e);
            }
        }
        self.output.transport.invalidate();

        let rebuild = ctx.graph.state() != GraphState::Detached;
        if rebuild {
            ctx.graph.rebuild(&format)?;
            self.output.record(|d| d.graph_rebuilds += 1);
        } else {
            ctx.graph.attach(&format)?;
        }
        self.output.bridge.rebase(format.sample_rate());

        let output = Arc::clone(&self.output);
        ctx.graph.install_tap(Box::new(move |buffer| output.outbox.lock().push(buffer)))?;

        let dsp_format = format.to_dsp_format();
        if ctx.options.enable_monitor {
            self.output.monitor.attach(&dsp_format);
        } else {
            self.output.monitor.unbind();
        }

        ctx.input_format = Some(format);
        self.output.record(|d| d.input_format = format.to_string());

        ctx.engine
            .start(&dsp_format)
            .map_err(PipelineError::EngineStartFailure)
    }

    /// Bring everything down to `Detached`, except the device which the
    /// caller stops outside the lock.
    fn teardown(&self, ctx: &mut CaptureContext) {
        if ctx.engine.is_running() {
            if let Err(e) = ctx.engine.stop() {
                log::warn!("Engine failed to stop cleanly: {}", e);
            }
        }
        ctx.graph.dispose();
        self.output.outbox.lock().clear();
        self.output.monitor.unbind();
        ctx.input_format = None;
        ctx.state = SessionState::Detached;
        ctx.generation += 1;
    }

    fn fail_attach(&self, error: PipelineError) -> PipelineError {
        log::error!("Attach failed: {}", error);
        self.pending.lock().clear();
        self.rebuilding.store(false, Ordering::Release);
        self.notify_error(&error);
        self.notify_state(SessionState::Detached);
        error
    }

    /// Leave the rebuilding window and replay whatever was queued during it.
    fn finish_rebuild(&self) {
        let mut ctx = self.context.lock();
        let queued = {
            let mut pending = self.pending.lock();
            self.rebuilding.store(false, Ordering::Release);
            std::mem::take(&mut *pending)
        };
        if queued.is_empty() {
            return;
        }

        log::debug!("Replaying {} frames queued during rebuild", queued.len());
        for buffer in queued {
            let matches = ctx.graph.format().is_some_and(|f| f.same_graph_layout(buffer.format()));
            if ctx.state != SessionState::Attached || !matches {
                log::warn!("Queued frame no longer matches the graph, dropped");
                self.output.record(|d| d.frames_dropped_rebuilding += 1);
                continue;
            }
            if let Err(e) = ctx.graph.render(buffer) {
                self.output.record_drop(&e);
            }
        }
    }

    fn detach(&self) -> Result<(), PipelineError> {
        let _lifecycle = self.lifecycle.lock();
        let device = {
            let mut ctx = self.context.lock();
            if ctx.state == SessionState::Detached && ctx.device.is_none() {
                log::debug!("Capture session already detached");
                return Ok(());
            }
            self.teardown(&mut ctx);
            ctx.device.take()
        };
        self.pending.lock().clear();

        if let Some(mut device) = device {
            if let Err(e) = device.stop() {
                log::warn!("Failed to stop device '{}': {}", device.device_info().name, e);
            }
        }
        log::info!("Capture session detached");
        self.notify_state(SessionState::Detached);
        Ok(())
    }

    fn dispose(&self) -> Result<(), PipelineError> {
        self.detach()?;
        self.output.monitor.detach();
        Ok(())
    }

    fn on_format_changed(&self, format: FormatDescriptor) {
        let lifecycle = self.lifecycle.lock();
        let result = {
            let mut ctx = self.context.lock();
            if ctx.state == SessionState::Detached {
                log::debug!("Format change to {} ignored, session detached", format);
                return;
            }
            if ctx.input_format == Some(format) && ctx.state == SessionState::Attached {
                return;
            }
            self.rebuilding.store(true, Ordering::Release);
            self.rebuild_in_band(&mut ctx, format)
        };
        self.finish_rebuild();
        drop(lifecycle);
        self.output.flush();
        self.report_rebuild(result, &format);
    }

    /// Rebuild for a new input format while the device keeps running.
    /// A failure leaves the session `Degraded`.
    fn rebuild_in_band(&self, ctx: &mut CaptureContext, format: FormatDescriptor) -> Result<(), PipelineError> {
        log::info!("Input format changed to {}, rebuilding", format);
        ctx.state = SessionState::Rebuilding;
        match self.build_graph(ctx, format) {
            Ok(()) => {
                ctx.state = SessionState::Attached;
                Ok(())
            }
            Err(e) => {
                ctx.state = SessionState::Degraded;
                Err(e)
            }
        }
    }

    fn report_rebuild(&self, result: Result<(), PipelineError>, format: &FormatDescriptor) {
        match result {
            Ok(()) => self.notify_rebuilt(format),
            Err(e) => {
                log::error!("Rebuild for {} failed, session degraded: {}", format, e);
                self.notify_error(&e);
                self.notify_state(SessionState::Degraded);
            }
        }
    }

    /// Entry point for every hardware buffer. `generation` is set for frames
    /// delivered through a device callback.
    fn on_raw_frame(&self, frame: &RawFrame<'_>, generation: Option<u64>) {
        self.output.record(|d| d.frames_received += 1);
        if self.rebuilding.load(Ordering::Acquire) && self.hold_during_rebuild(frame) {
            return;
        }

        let mut ctx = self.context.lock();
        if generation.is_some_and(|g| g != ctx.generation)
            || ctx.state != SessionState::Attached
            || !ctx.engine.is_running()
        {
            log::trace!("Frame dropped, session not running");
            self.output.record(|d| d.frames_dropped_inactive += 1);
            return;
        }

        let mut rebuild = None;
        if ctx.input_format != Some(frame.format) {
            let result = self.rebuild_in_band(&mut ctx, frame.format);
            let failed = result.is_err();
            rebuild = Some(result);
            if failed {
                self.output.record(|d| d.frames_dropped_inactive += 1);
            }
        }

        if ctx.state == SessionState::Attached {
            let result = self
                .output
                .bridge
                .to_planar(frame)
                .and_then(|planar| ctx.graph.render(planar));
            if let Err(e) = result {
                self.output.record_drop(&e);
            }
        }
        drop(ctx);
        self.output.flush();

        if let Some(result) = rebuild {
            self.report_rebuild(result, &frame.format);
        }
    }

    /// Apply the rebuild policy. Returns false when the rebuild finished in
    /// the meantime and the frame should be processed normally.
    fn hold_during_rebuild(&self, frame: &RawFrame<'_>) -> bool {
        let policy = *self.policy.read();
        match policy {
            RebuildPolicy::Drop => {
                log::warn!("Frame dropped during graph rebuild");
                self.output.record(|d| d.frames_dropped_rebuilding += 1);
                true
            }
            RebuildPolicy::Queue { capacity } => {
                let planar = match self.output.bridge.to_planar(frame) {
                    Ok(planar) => planar,
                    Err(e) => {
                        self.output.record_drop(&e);
                        return true;
                    }
                };
                let mut pending = self.pending.lock();
                if !self.rebuilding.load(Ordering::Acquire) {
                    return false;
                }
                if pending.len() >= capacity {
                    log::warn!("Rebuild queue full ({}), frame dropped", capacity);
                    self.output.record(|d| d.frames_dropped_rebuilding += 1);
                } else {
                    pending.push_back(planar);
                    self.output.record(|d| d.frames_queued += 1);
                }
                true
            }
        }
    }

    fn frame_callback(self: &Arc<Self>, generation: u64) -> RawFrameCallback {
        let inner = Arc::downgrade(self);
        Arc::new(move |frame: &RawFrame<'_>| {
            if let Some(inner) = inner.upgrade() {
                inner.on_raw_frame(frame, Some(generation));
            }
        })
    }

    fn delegate(&self) -> Option<Arc<dyn SessionDelegate>> {
        self.delegate.read().clone()
    }

    fn notify_state(&self, state: SessionState) {
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(state);
        }
    }

    fn notify_error(&self, error: &PipelineError) {
        if let Some(delegate) = self.delegate() {
            delegate.on_error(error);
        }
    }

    fn notify_rebuilt(&self, format: &FormatDescriptor) {
        if let Some(delegate) = self.delegate() {
            delegate.on_rebuilt(format);
        }
    }
}

/// Owns one capture session: device attachment, DSP graph, engine, monitor
/// and the fan-out to the encoder and recorder.
///
/// ```text
/// [CaptureDevice] → on_raw_frame → [BufferBridge::to_planar] → [DspGraph] ─tap─┐
///                                                                              ↓
///            [PlaybackMonitor] ←── [TransportAdapter → recorder, encoder] ← [to_streaming]
/// ```
///
/// Frames are processed on whichever thread the device calls back on, one at
/// a time. Attach, detach and rebuilds are serialized against rendering by
/// the context lock; parameter and sound-transform writes never take it.
/// Sinks and the monitor run after that lock is released, so they may query
/// the controller or signal a format change from inside `append`.
pub struct CaptureSessionController {
    inner: Arc<ControllerInner>,
}

impl CaptureSessionController {
    pub fn new(engine: Box<dyn AudioEngine>, encoder: Arc<dyn StreamSink>, recorder: Arc<dyn StreamSink>) -> Self {
        let options = SessionOptions::default();
        let graph = DspGraph::new(&options.dsp, options.max_delay_secs);
        let controls = graph.controls().clone();
        let output = Arc::new(OutputPath {
            bridge: BufferBridge::new(48000.0),
            transport: TransportAdapter::new(encoder, recorder),
            monitor: PlaybackMonitor::new(None),
            diagnostics: Mutex::new(SessionDiagnostics::default()),
            outbox: Mutex::new(Vec::new()),
            delivery: Mutex::new(()),
        });

        Self {
            inner: Arc::new(ControllerInner {
                lifecycle: Mutex::new(()),
                context: Mutex::new(CaptureContext {
                    state: SessionState::Detached,
                    graph,
                    engine,
                    device: None,
                    input_format: None,
                    options,
                    generation: 0,
                }),
                rebuilding: AtomicBool::new(false),
                policy: RwLock::new(RebuildPolicy::default()),
                pending: Mutex::new(VecDeque::new()),
                output,
                controls,
                delegate: RwLock::new(None),
            }),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn SessionDelegate>) {
        *self.inner.delegate.write() = Some(delegate);
    }

    /// Renderer for the monitor. Takes effect for the next player created.
    pub fn set_playback_renderer(&self, renderer: Option<Arc<dyn PlaybackRenderer>>) {
        self.inner.output.monitor.set_renderer(renderer);
    }

    /// Feed a frame directly, for drivers that push rather than call back.
    pub fn on_raw_frame(&self, frame: &RawFrame<'_>) {
        self.inner.on_raw_frame(frame, None);
    }

    /// Handle for the encoder or a DSP stage to signal format changes.
    pub fn format_change_notifier(&self) -> FormatChangeNotifier {
        FormatChangeNotifier {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn graph_snapshot(&self) -> GraphSnapshot {
        self.inner.context.lock().graph.snapshot()
    }

    pub fn dsp_parameters(&self) -> DspParameters {
        self.inner.controls.snapshot()
    }

    pub fn monitor(&self) -> &PlaybackMonitor {
        &self.inner.output.monitor
    }

    pub fn input_format(&self) -> Option<FormatDescriptor> {
        self.inner.context.lock().input_format
    }
}

impl CaptureSession for CaptureSessionController {
    fn state(&self) -> SessionState {
        self.inner.context.lock().state
    }

    fn diagnostics(&self) -> SessionDiagnostics {
        let mut diagnostics = self.inner.output.diagnostics.lock().clone();
        diagnostics.monitor_failures = self.inner.output.monitor.failures();
        diagnostics
    }

    fn attach(&self, device: Box<dyn CaptureDevice>, options: SessionOptions) -> Result<(), PipelineError> {
        self.inner.attach(device, options)
    }

    fn detach(&self) -> Result<(), PipelineError> {
        self.inner.detach()
    }

    fn dispose(&self) -> Result<(), PipelineError> {
        self.inner.dispose()
    }

    fn on_format_changed(&self, format: FormatDescriptor) {
        self.inner.on_format_changed(format);
    }

    fn set_dsp_parameter(&self, parameter: DspParameter) {
        self.inner.controls.apply(parameter);
    }

    fn set_dsp_parameters(&self, parameters: &DspParameters) {
        self.inner.controls.load(parameters);
    }

    fn set_sound_transform(&self, transform: SoundTransform) {
        self.inner.output.monitor.set_sound_transform(transform);
    }
}

impl Drop for CaptureSessionController {
    fn drop(&mut self) {
        if let Err(e) = self.inner.dispose() {
            log::error!("Failed to dispose capture session: {}", e);
        }
    }
}

/// Cloneable handle that forwards format changes to a controller without
/// keeping it alive.
#[derive(Clone)]
pub struct FormatChangeNotifier {
    inner: Weak<ControllerInner>,
}

impl FormatChangeNotifier {
    /// Returns false once the controller is gone.
    pub fn on_format_changed(&self, format: FormatDescriptor) -> bool {
        match self.inner.upgrade() {
            Some(inner) => {
                inner.on_format_changed(format);
                true
            }
            None => false,
        }
    }
}
