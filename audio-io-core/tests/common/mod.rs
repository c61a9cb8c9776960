//! Test doubles for driving a `CaptureSessionController` end to end.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use audio_io_core::processing::sample_codec;
use audio_io_core::{
    AudioEngine, CaptureDevice, CaptureSessionController, DeviceInfo, FormatDescriptor, InlineEngine, PipelineError,
    PlanarBuffer, PlaybackRenderer, PlayerNode, RawFrame, RawFrameCallback, SampleRepresentation, SessionDelegate,
    SessionState, SinkError, StreamSink, StreamingBuffer,
};
use parking_lot::Mutex;

pub fn mono_float() -> FormatDescriptor {
    FormatDescriptor::new(48000.0, 1, SampleRepresentation::Float32, false).unwrap()
}

pub fn stereo_int16() -> FormatDescriptor {
    FormatDescriptor::new(44100.0, 2, SampleRepresentation::Int16, true).unwrap()
}

pub fn float_bytes(samples: &[f32]) -> Vec<u8> {
    sample_codec::encode_f32_plane(samples)
}

/// Tracks how many devices are started at once across a whole test.
#[derive(Default)]
pub struct AttachmentCounter {
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    pub starts: AtomicUsize,
}

impl AttachmentCounter {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

pub struct DeviceHandle {
    callback: Mutex<Option<RawFrameCallback>>,
}

impl DeviceHandle {
    /// Deliver a frame the way a driver would. Returns false when the device
    /// is not started.
    pub fn emit(&self, frame: &RawFrame<'_>) -> bool {
        let callback = self.callback.lock().clone();
        match callback {
            Some(callback) => {
                callback(frame);
                true
            }
            None => false,
        }
    }

    pub fn emit_float(&self, format: FormatDescriptor, samples: &[f32]) -> bool {
        let data = float_bytes(samples);
        let frames = samples.len() / format.channels() as usize;
        self.emit(&RawFrame::new(format, &data, frames))
    }
}

pub struct MockDevice {
    name: String,
    format: FormatDescriptor,
    available: bool,
    fail_start: bool,
    /// Frames of `format` emitted synchronously from inside `start`.
    emit_on_start: usize,
    handle: Arc<DeviceHandle>,
    counter: Arc<AttachmentCounter>,
    started: bool,
}

impl MockDevice {
    pub fn new(name: &str, format: FormatDescriptor, counter: &Arc<AttachmentCounter>) -> (Self, Arc<DeviceHandle>) {
        let handle = Arc::new(DeviceHandle {
            callback: Mutex::new(None),
        });
        let device = Self {
            name: name.to_string(),
            format,
            available: true,
            fail_start: false,
            emit_on_start: 0,
            handle: Arc::clone(&handle),
            counter: Arc::clone(counter),
            started: false,
        };
        (device, handle)
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn emitting_on_start(mut self, frames: usize) -> Self {
        self.emit_on_start = frames;
        self
    }
}

impl CaptureDevice for MockDevice {
    fn is_available(&self) -> bool {
        self.available
    }

    fn format(&self) -> Result<FormatDescriptor, PipelineError> {
        Ok(self.format)
    }

    fn start(&mut self, callback: RawFrameCallback) -> Result<(), PipelineError> {
        if self.fail_start {
            return Err(PipelineError::DeviceUnavailable(format!("{} refused to start", self.name)));
        }
        assert!(!self.started, "device started twice");
        self.started = true;
        let live = self.counter.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counter.max_live.fetch_max(live, Ordering::SeqCst);
        self.counter.starts.fetch_add(1, Ordering::SeqCst);

        for i in 0..self.emit_on_start {
            let data = float_bytes(&vec![i as f32 / 100.0; 256 * self.format.channels() as usize]);
            callback(&RawFrame::new(self.format, &data, 256));
        }
        *self.handle.callback.lock() = Some(callback);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        if self.started {
            self.started = false;
            self.counter.live.fetch_sub(1, Ordering::SeqCst);
        }
        *self.handle.callback.lock() = None;
        Ok(())
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            id: self.name.clone(),
            name: self.name.clone(),
            is_default: true,
            transport_type: None,
        }
    }
}

/// Engine whose `start` succeeds until the `fail_from`-th call.
pub struct FlakyEngine {
    starts: usize,
    fail_from: usize,
    running: bool,
}

impl FlakyEngine {
    pub fn failing_from(fail_from: usize) -> Self {
        Self {
            starts: 0,
            fail_from,
            running: false,
        }
    }
}

impl AudioEngine for FlakyEngine {
    fn start(&mut self, _format: &FormatDescriptor) -> Result<(), String> {
        self.starts += 1;
        if self.starts >= self.fail_from {
            return Err("output device busy".into());
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), String> {
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

pub struct CollectingSink {
    name: String,
    reject: bool,
    pub buffers: Mutex<Vec<StreamingBuffer>>,
    pub invalidations: AtomicUsize,
}

impl CollectingSink {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reject: false,
            buffers: Mutex::new(Vec::new()),
            invalidations: AtomicUsize::new(0),
        })
    }

    pub fn rejecting(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reject: true,
            buffers: Mutex::new(Vec::new()),
            invalidations: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl StreamSink for CollectingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, buffer: &StreamingBuffer) -> Result<(), SinkError> {
        if self.reject {
            return Err(SinkError::rejected("test sink rejects everything"));
        }
        self.buffers.lock().push(buffer.clone());
        Ok(())
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

type AppendHook = Box<dyn Fn(&StreamingBuffer) + Send + Sync>;

/// Sink that runs a caller-supplied hook from inside `append`, the way an
/// encoder reacts to the stream it is fed.
pub struct HookSink {
    hook: Mutex<Option<Arc<AppendHook>>>,
    pub buffers: Mutex<Vec<StreamingBuffer>>,
}

impl HookSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            hook: Mutex::new(None),
            buffers: Mutex::new(Vec::new()),
        })
    }

    pub fn set_hook(&self, hook: impl Fn(&StreamingBuffer) + Send + Sync + 'static) {
        *self.hook.lock() = Some(Arc::new(Box::new(hook)));
    }

    pub fn count(&self) -> usize {
        self.buffers.lock().len()
    }
}

impl StreamSink for HookSink {
    fn name(&self) -> &str {
        "hook"
    }

    fn append(&self, buffer: &StreamingBuffer) -> Result<(), SinkError> {
        self.buffers.lock().push(buffer.clone());
        let hook = self.hook.lock().clone();
        if let Some(hook) = hook {
            hook(buffer);
        }
        Ok(())
    }

    fn invalidate(&self) {}
}

/// Run `f` on another thread and fail the test if it has not returned
/// within a few seconds.
pub fn completes_within_timeout<F>(f: F) -> bool
where
    F: FnOnce() + Send + 'static,
{
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        f();
        let _ = done_tx.send(());
    });
    done_rx.recv_timeout(std::time::Duration::from_secs(5)).is_ok()
}

#[derive(Default)]
pub struct RendererStats {
    pub live: AtomicUsize,
    pub created: AtomicUsize,
    pub scheduled: AtomicUsize,
    pub plays: AtomicUsize,
    pub volume: Mutex<Option<f32>>,
}

pub struct MockRenderer {
    pub stats: Arc<RendererStats>,
    fail: bool,
}

impl MockRenderer {
    pub fn new() -> (Arc<Self>, Arc<RendererStats>) {
        let stats = Arc::new(RendererStats::default());
        (
            Arc::new(Self {
                stats: Arc::clone(&stats),
                fail: false,
            }),
            stats,
        )
    }

    pub fn failing() -> (Arc<Self>, Arc<RendererStats>) {
        let stats = Arc::new(RendererStats::default());
        (
            Arc::new(Self {
                stats: Arc::clone(&stats),
                fail: true,
            }),
            stats,
        )
    }
}

impl PlaybackRenderer for MockRenderer {
    fn attach_player(&self, _format: &FormatDescriptor) -> Result<Box<dyn PlayerNode>, PipelineError> {
        assert_eq!(self.stats.live.load(Ordering::SeqCst), 0, "previous player still attached");
        self.stats.live.fetch_add(1, Ordering::SeqCst);
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockPlayer {
            stats: Arc::clone(&self.stats),
            playing: false,
            fail: self.fail,
        }))
    }
}

struct MockPlayer {
    stats: Arc<RendererStats>,
    playing: bool,
    fail: bool,
}

impl PlayerNode for MockPlayer {
    fn schedule_buffer(&mut self, _buffer: PlanarBuffer) -> Result<(), PipelineError> {
        if self.fail {
            return Err(PipelineError::PlaybackFailed("output unplugged".into()));
        }
        self.stats.scheduled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn play(&mut self) -> Result<(), PipelineError> {
        self.playing = true;
        self.stats.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn set_volume(&mut self, volume: f32) {
        *self.stats.volume.lock() = Some(volume);
    }

    fn set_pan(&mut self, _pan: f32) {}

    fn detach(&mut self) {
        self.stats.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingDelegate {
    pub states: Mutex<Vec<SessionState>>,
    pub errors: Mutex<Vec<PipelineError>>,
    pub rebuilt: Mutex<Vec<FormatDescriptor>>,
}

impl SessionDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: SessionState) {
        self.states.lock().push(state);
    }

    fn on_error(&self, error: &PipelineError) {
        self.errors.lock().push(error.clone());
    }

    fn on_rebuilt(&self, format: &FormatDescriptor) {
        self.rebuilt.lock().push(*format);
    }
}

pub struct Harness {
    pub controller: CaptureSessionController,
    pub encoder: Arc<CollectingSink>,
    pub recorder: Arc<CollectingSink>,
    pub counter: Arc<AttachmentCounter>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_engine(Box::new(InlineEngine::new()))
    }

    pub fn with_engine(engine: Box<dyn AudioEngine>) -> Self {
        let encoder = CollectingSink::new("encoder");
        let recorder = CollectingSink::new("recorder");
        let controller = CaptureSessionController::new(engine, encoder.clone(), recorder.clone());
        Self {
            controller,
            encoder,
            recorder,
            counter: Arc::new(AttachmentCounter::default()),
        }
    }

    pub fn device(&self, name: &str, format: FormatDescriptor) -> (MockDevice, Arc<DeviceHandle>) {
        MockDevice::new(name, format, &self.counter)
    }
}
