use crate::models::audio_models::SessionDiagnostics;
use crate::models::config::SessionOptions;
use crate::models::dsp_parameters::{DspParameter, DspParameters};
use crate::models::error::PipelineError;
use crate::models::format::FormatDescriptor;
use crate::models::sound_transform::SoundTransform;
use crate::models::state::SessionState;

use super::capture_device::CaptureDevice;

/// Control surface of a capture session. Every method may be called from
/// any thread.
pub trait CaptureSession: Send + Sync {
    /// Current session state.
    fn state(&self) -> SessionState;

    fn diagnostics(&self) -> SessionDiagnostics;

    /// Attach a device and start processing. Any previous attachment is torn
    /// down first. Transitions: detached/attached → attached.
    fn attach(&self, device: Box<dyn CaptureDevice>, options: SessionOptions) -> Result<(), PipelineError>;

    /// Stop processing and release the device. Idempotent.
    fn detach(&self) -> Result<(), PipelineError>;

    /// Detach and drop every resource held for monitoring. Idempotent.
    fn dispose(&self) -> Result<(), PipelineError>;

    /// Rebuild the graph for a format signalled by the encoder or a DSP stage.
    fn on_format_changed(&self, format: FormatDescriptor);

    /// Best-effort, last write wins.
    fn set_dsp_parameter(&self, parameter: DspParameter);

    fn set_dsp_parameters(&self, parameters: &DspParameters);

    fn set_sound_transform(&self, transform: SoundTransform);
}
