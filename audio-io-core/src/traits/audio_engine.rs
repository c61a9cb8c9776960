use crate::models::format::FormatDescriptor;

/// Host that runs the DSP graph.
///
/// Errors are plain strings: the session maps them into
/// `PipelineError::EngineStartFailure` or logs them.
pub trait AudioEngine: Send {
    fn start(&mut self, format: &FormatDescriptor) -> Result<(), String>;

    fn stop(&mut self) -> Result<(), String>;

    fn is_running(&self) -> bool;
}
