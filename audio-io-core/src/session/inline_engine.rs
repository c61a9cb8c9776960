use crate::models::format::FormatDescriptor;
use crate::traits::audio_engine::AudioEngine;

/// Engine that renders the graph synchronously on the capture context.
///
/// There is no separate render thread, so the engine only gates processing:
/// frames are rendered while it is running and dropped otherwise.
#[derive(Debug, Default)]
pub struct InlineEngine {
    format: Option<FormatDescriptor>,
}

impl InlineEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format of the graph the engine was started for.
    pub fn format(&self) -> Option<FormatDescriptor> {
        self.format
    }
}

impl AudioEngine for InlineEngine {
    fn start(&mut self, format: &FormatDescriptor) -> Result<(), String> {
        if !format.is_dsp_format() {
            return Err(format!("engine renders float planar audio, got {}", format));
        }
        self.format = Some(*format);
        log::debug!("Inline engine started ({})", format);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), String> {
        if self.format.take().is_some() {
            log::debug!("Inline engine stopped");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.format.is_some()
    }
}
