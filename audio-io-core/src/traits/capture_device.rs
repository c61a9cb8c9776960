use std::sync::Arc;

use crate::models::audio_models::DeviceInfo;
use crate::models::buffers::RawFrame;
use crate::models::error::PipelineError;
use crate::models::format::FormatDescriptor;

/// Callback invoked once per hardware buffer.
///
/// The frame borrows device memory and must not be retained after the call.
pub type RawFrameCallback = Arc<dyn Fn(&RawFrame<'_>) + Send + Sync + 'static>;

/// A hardware capture source.
///
/// Implemented by platform drivers; the session only needs frames with a
/// self-describing format.
pub trait CaptureDevice: Send {
    /// Whether the device can currently be opened.
    fn is_available(&self) -> bool;

    /// The format the device will deliver after `start`.
    fn format(&self) -> Result<FormatDescriptor, PipelineError>;

    /// Start delivering frames to `callback`.
    ///
    /// Frames may arrive on any thread, but always one at a time.
    fn start(&mut self, callback: RawFrameCallback) -> Result<(), PipelineError>;

    /// Stop delivery. After this returns the callback is not invoked again.
    fn stop(&mut self) -> Result<(), PipelineError>;

    fn device_info(&self) -> DeviceInfo;
}
