use crate::models::error::PipelineError;
use crate::models::format::FormatDescriptor;
use crate::models::state::SessionState;

/// Lifecycle notifications from a capture session.
///
/// Called on whichever thread performed the change: the caller of
/// `attach`/`detach` or the capture context for in-band format changes.
/// Implementations must not call back into the session synchronously.
pub trait SessionDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: SessionState);

    /// Called when a session-level error occurs.
    fn on_error(&self, error: &PipelineError);

    /// Called after the DSP graph was rebuilt for a new input format.
    fn on_rebuilt(&self, _format: &FormatDescriptor) {}
}
