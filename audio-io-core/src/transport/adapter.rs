use std::sync::Arc;

use crate::models::buffers::StreamingBuffer;
use crate::traits::stream_sink::StreamSink;

/// Which sinks accepted a forwarded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardOutcome {
    pub recorder_accepted: bool,
    pub encoder_accepted: bool,
}

/// Fan-out from the bridge to the recording sink and the encoder sink.
///
/// Both sinks see every buffer. A rejection is logged and dropped for that
/// sink only; nothing is retried.
pub struct TransportAdapter {
    encoder: Arc<dyn StreamSink>,
    recorder: Arc<dyn StreamSink>,
}

impl TransportAdapter {
    pub fn new(encoder: Arc<dyn StreamSink>, recorder: Arc<dyn StreamSink>) -> Self {
        Self { encoder, recorder }
    }

    /// Recorder first, then encoder, synchronously.
    pub fn forward(&self, buffer: &StreamingBuffer) -> ForwardOutcome {
        ForwardOutcome {
            recorder_accepted: Self::deliver(self.recorder.as_ref(), buffer),
            encoder_accepted: Self::deliver(self.encoder.as_ref(), buffer),
        }
    }

    /// Tell the encoder the current graph is going away.
    pub fn invalidate(&self) {
        log::debug!("Invalidating encoder '{}'", self.encoder.name());
        self.encoder.invalidate();
    }

    pub fn encoder(&self) -> &Arc<dyn StreamSink> {
        &self.encoder
    }

    pub fn recorder(&self) -> &Arc<dyn StreamSink> {
        &self.recorder
    }

    fn deliver(sink: &dyn StreamSink, buffer: &StreamingBuffer) -> bool {
        match sink.append(buffer) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Sink '{}' rejected buffer at {:.6}s: {}", sink.name(), buffer.presentation_time.seconds(), e);
                false
            }
        }
    }
}
