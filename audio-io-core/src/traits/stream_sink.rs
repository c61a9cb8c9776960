use crate::models::buffers::StreamingBuffer;
use crate::models::error::SinkError;

/// Consumer of streaming buffers: the encoder or the recorder.
///
/// `append` is called synchronously on the capture context, in arrival
/// order. A rejected buffer is not retried.
pub trait StreamSink: Send + Sync {
    fn name(&self) -> &str;

    fn append(&self, buffer: &StreamingBuffer) -> Result<(), SinkError>;

    /// Discard any state tied to the previous graph. Called before a rebuild.
    fn invalidate(&self) {}
}
