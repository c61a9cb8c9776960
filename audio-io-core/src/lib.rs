//! # audio-io-core
//!
//! Platform-agnostic audio capture and processing core.
//!
//! Live frames from a capture device are bridged into planar PCM, run through
//! a fixed DSP chain (delay → dry/wet → reverb → dry/wet → booster), bridged
//! back into streaming buffers and fanned out to an encoder sink and a
//! recording sink. The processed signal is also rendered locally for
//! monitoring. Platform backends implement `CaptureDevice`, `AudioEngine` and
//! `PlaybackRenderer` and plug into the generic `CaptureSessionController`.
//!
//! ## Architecture
//!
//! ```text
//! audio-io-core (this crate)
//! ├── traits/       ← CaptureDevice, AudioEngine, PlaybackRenderer, StreamSink, CaptureSession, SessionDelegate
//! ├── models/       ← PipelineError, FormatDescriptor, buffers, SessionOptions, DspParameters, state
//! ├── processing/   ← buffer bridge, sample codec, WAV header generation
//! ├── dsp/          ← DspGraph, nodes, live parameter controls
//! ├── monitor/      ← PlaybackMonitor
//! ├── transport/    ← TransportAdapter (recorder + encoder fan-out)
//! ├── session/      ← CaptureSessionController, InlineEngine
//! └── storage/      ← WavRecorder, AesGcmEncryptor, metadata sidecar
//! ```

pub mod dsp;
pub mod models;
pub mod monitor;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;
pub mod transport;

// Re-export key types at crate root for convenience.
pub use dsp::graph::{DspGraph, GraphSnapshot};
pub use models::audio_models::{AudioTransportType, DeviceInfo, SessionDiagnostics};
pub use models::buffers::{MediaTime, PlanarBuffer, RawFrame, StreamingBuffer};
pub use models::config::{RebuildPolicy, SessionOptions};
pub use models::dsp_parameters::{DspParameter, DspParameters};
pub use models::error::{PipelineError, SinkError};
pub use models::format::{FormatDescriptor, SampleRepresentation, StreamDescription};
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::sound_transform::SoundTransform;
pub use models::state::{GraphState, SessionState};
pub use monitor::playback_monitor::PlaybackMonitor;
pub use processing::buffer_bridge::{BufferBridge, PipelineClock};
pub use session::controller::{CaptureSessionController, FormatChangeNotifier};
pub use session::inline_engine::InlineEngine;
pub use storage::aes_encryptor::AesGcmEncryptor;
pub use storage::wav_recorder::WavRecorder;
pub use traits::audio_engine::AudioEngine;
pub use traits::capture_device::{CaptureDevice, RawFrameCallback};
pub use traits::capture_session::CaptureSession;
pub use traits::encryptor::CaptureEncryptor;
pub use traits::playback::{PlaybackRenderer, PlayerNode};
pub use traits::session_delegate::SessionDelegate;
pub use traits::stream_sink::StreamSink;
pub use transport::adapter::{ForwardOutcome, TransportAdapter};
