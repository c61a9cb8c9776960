use crate::models::buffers::PlanarBuffer;
use crate::models::error::PipelineError;
use crate::models::format::FormatDescriptor;

/// Local playback output the monitor renders into.
pub trait PlaybackRenderer: Send + Sync {
    /// Create a player node and attach it to the output for `format`.
    fn attach_player(&self, format: &FormatDescriptor) -> Result<Box<dyn PlayerNode>, PipelineError>;
}

/// One attached player node.
///
/// None of these calls may block on the audio device.
pub trait PlayerNode: Send {
    fn schedule_buffer(&mut self, buffer: PlanarBuffer) -> Result<(), PipelineError>;

    fn play(&mut self) -> Result<(), PipelineError>;

    fn is_playing(&self) -> bool;

    fn set_volume(&mut self, volume: f32);

    fn set_pan(&mut self, pan: f32);

    /// Detach from the output. Called exactly once, before the node is dropped.
    fn detach(&mut self);
}
