//! Conversion between hardware frames, DSP planar buffers and transport
//! streaming buffers.
//!
//! ```text
//! RawFrame ──to_planar──→ PlanarBuffer ──(DSP chain)──→ PlanarBuffer ──to_streaming──→ StreamingBuffer
//! ```
//!
//! Sample data is always copied across the bridge: a planar buffer and the
//! streaming buffer built from it are held by different stages at once.

use parking_lot::Mutex;

use crate::models::buffers::{MediaTime, PlanarBuffer, RawFrame, StreamingBuffer};
use crate::models::error::PipelineError;
use crate::models::format::{FormatDescriptor, StreamDescription};
use crate::processing::sample_codec;

/// Deinterleave/decode a hardware frame into DSP planes.
///
/// Fails with `FormatMismatch` when the frame's byte size disagrees with
/// `channels x sample width x frame_count`.
pub fn to_planar(frame: &RawFrame<'_>) -> Result<PlanarBuffer, PipelineError> {
    if frame.frame_count == 0 {
        return Err(PipelineError::BufferConstructionFailure("frame holds no samples".into()));
    }
    if !frame.is_size_consistent() {
        return Err(PipelineError::FormatMismatch {
            expected: frame.format.expected_byte_len(frame.frame_count),
            actual: frame.data.len(),
        });
    }

    let format = frame.format;
    let channels = format.channels() as usize;
    let planes = if format.is_interleaved() || channels == 1 {
        sample_codec::deinterleave(frame.data, channels, format.sample())
    } else {
        sample_codec::split_planes(frame.data, channels, format.sample())
    };

    let mut buffer = PlanarBuffer::from_planes(format.to_dsp_format(), planes)?;
    buffer.presentation_time = frame.presentation_time;
    Ok(buffer)
}

/// Pack a planar buffer into the transport representation.
///
/// `format` must describe the buffer (DSP representation, same rate and
/// channel count); the stream description is synthesized from it.
pub fn to_streaming(
    buffer: &PlanarBuffer,
    format: &FormatDescriptor,
    presentation_time: MediaTime,
) -> Result<StreamingBuffer, PipelineError> {
    if !format.is_dsp_format() {
        return Err(PipelineError::BufferConstructionFailure(format!(
            "streaming buffers are built from float planar data, got {}",
            format
        )));
    }
    if !format.same_graph_layout(buffer.format()) || buffer.channel_count() != format.channels() as usize {
        return Err(PipelineError::BufferConstructionFailure(format!(
            "buffer format {} does not match {}",
            buffer.format(),
            format
        )));
    }
    let frames = buffer.frame_length();
    if frames == 0 {
        return Err(PipelineError::BufferConstructionFailure("buffer holds no frames".into()));
    }
    if format.sample_rate() > i32::MAX as f64 || format.sample_rate().round() < 1.0 {
        return Err(PipelineError::BufferConstructionFailure(format!(
            "sample rate {} cannot be used as a timescale",
            format.sample_rate()
        )));
    }
    if !presentation_time.is_valid() {
        return Err(PipelineError::BufferConstructionFailure(
            "presentation time has no timescale".into(),
        ));
    }

    Ok(StreamingBuffer {
        description: StreamDescription::from_format(format),
        planes: buffer.planes().map(sample_codec::encode_f32_plane).collect(),
        frame_count: frames,
        duration: MediaTime::from_frames(frames as u64, format.sample_rate()),
        presentation_time,
    })
}

/// Running presentation clock, counted in frames at the current rate.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineClock {
    frames: u64,
    sample_rate: f64,
}

impl PipelineClock {
    pub fn new(sample_rate: f64) -> Self {
        Self { frames: 0, sample_rate }
    }

    pub fn now(&self) -> MediaTime {
        MediaTime::from_frames(self.frames, self.sample_rate)
    }

    pub fn advance(&mut self, frames: usize) {
        self.frames += frames as u64;
    }

    /// Switch to a new rate, keeping the elapsed time.
    pub fn rebase(&mut self, sample_rate: f64) {
        if sample_rate == self.sample_rate || self.sample_rate <= 0.0 {
            self.sample_rate = sample_rate;
            return;
        }
        self.frames = (self.frames as f64 * sample_rate / self.sample_rate).round() as u64;
        self.sample_rate = sample_rate;
    }

    pub fn reset(&mut self) {
        self.frames = 0;
    }
}

/// The bridge as used by a session: stateless conversions plus the clock
/// that stamps buffers arriving without a presentation time.
#[derive(Debug)]
pub struct BufferBridge {
    clock: Mutex<PipelineClock>,
}

impl BufferBridge {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            clock: Mutex::new(PipelineClock::new(sample_rate)),
        }
    }

    pub fn to_planar(&self, frame: &RawFrame<'_>) -> Result<PlanarBuffer, PipelineError> {
        to_planar(frame)
    }

    /// Convert using the buffer's own presentation time, or the running clock.
    /// The clock only advances when the conversion succeeds.
    pub fn to_streaming(
        &self,
        buffer: &PlanarBuffer,
        format: &FormatDescriptor,
    ) -> Result<StreamingBuffer, PipelineError> {
        let mut clock = self.clock.lock();
        let presentation_time = buffer.presentation_time.unwrap_or_else(|| clock.now());
        let streaming = to_streaming(buffer, format, presentation_time)?;
        clock.advance(streaming.frame_count);
        Ok(streaming)
    }

    pub fn rebase(&self, sample_rate: f64) {
        self.clock.lock().rebase(sample_rate);
    }

    pub fn reset_clock(&self) {
        self.clock.lock().reset();
    }

    pub fn now(&self) -> MediaTime {
        self.clock.lock().now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::SampleRepresentation;
    use approx::assert_relative_eq;

    fn mono_float(frames: usize) -> (FormatDescriptor, Vec<u8>) {
        let format = FormatDescriptor::new(48000.0, 1, SampleRepresentation::Float32, false).unwrap();
        let samples: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        (format, sample_codec::encode_f32_plane(&samples))
    }

    #[test]
    fn round_trip_preserves_frames_and_channels() {
        let format = FormatDescriptor::new(44100.0, 2, SampleRepresentation::Int16, true).unwrap();
        let data = vec![0u8; format.expected_byte_len(256)];
        let frame = RawFrame::new(format, &data, 256);

        let planar = to_planar(&frame).unwrap();
        let streaming = to_streaming(&planar, planar.format(), MediaTime::ZERO).unwrap();

        assert_eq!(streaming.frame_count, 256);
        assert_eq!(streaming.channel_count(), 2);
        assert_eq!(streaming.planes[0].len(), 256 * 4);
        assert_eq!(streaming.description.to_format().unwrap(), format.to_dsp_format());
    }

    #[test]
    fn planar_data_is_copied_not_aliased() {
        let (format, data) = mono_float(8);
        let planar = to_planar(&RawFrame::new(format, &data, 8)).unwrap();
        let streaming = to_streaming(&planar, planar.format(), MediaTime::ZERO).unwrap();
        drop(planar);
        assert_eq!(streaming.plane_samples(0)[4], 0.5);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let (format, data) = mono_float(8);
        let err = to_planar(&RawFrame::new(format, &data[..30], 8)).unwrap_err();
        assert_eq!(err, PipelineError::FormatMismatch { expected: 32, actual: 30 });
    }

    #[test]
    fn overflowing_frame_count_is_a_mismatch() {
        let (format, data) = mono_float(16);
        let frame = RawFrame::new(format, &data, usize::MAX / 2);
        assert!(!frame.is_size_consistent());
        let err = to_planar(&frame).unwrap_err();
        assert_eq!(err, PipelineError::FormatMismatch { expected: usize::MAX, actual: 64 });
    }

    #[test]
    fn empty_frame_is_rejected() {
        let (format, _) = mono_float(0);
        let err = to_planar(&RawFrame::new(format, &[], 0)).unwrap_err();
        assert!(matches!(err, PipelineError::BufferConstructionFailure(_)));
    }

    #[test]
    fn non_interleaved_stereo_frames_split_by_plane() {
        let format = FormatDescriptor::new(48000.0, 2, SampleRepresentation::Float32, false).unwrap();
        let mut data = sample_codec::encode_f32_plane(&[0.1, 0.2, 0.3]);
        data.extend(sample_codec::encode_f32_plane(&[0.4, 0.5, 0.6]));
        let planar = to_planar(&RawFrame::new(format, &data, 3)).unwrap();
        assert_eq!(planar.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(planar.channel(1), &[0.4, 0.5, 0.6]);
    }

    #[test]
    fn to_streaming_rejects_mismatched_format() {
        let (format, data) = mono_float(8);
        let planar = to_planar(&RawFrame::new(format, &data, 8)).unwrap();
        let stereo = FormatDescriptor::dsp(48000.0, 2).unwrap();
        assert!(matches!(
            to_streaming(&planar, &stereo, MediaTime::ZERO),
            Err(PipelineError::BufferConstructionFailure(_))
        ));
        let invalid_time = MediaTime::new(0, 0);
        assert!(to_streaming(&planar, planar.format(), invalid_time).is_err());
    }

    #[test]
    fn duration_from_frame_count() {
        let (format, data) = mono_float(1024);
        let planar = to_planar(&RawFrame::new(format, &data, 1024)).unwrap();
        let streaming = to_streaming(&planar, planar.format(), MediaTime::ZERO).unwrap();
        assert_relative_eq!(streaming.duration.seconds(), 1024.0 / 48000.0);
    }

    #[test]
    fn bridge_clock_stamps_and_advances() {
        let bridge = BufferBridge::new(48000.0);
        let (format, data) = mono_float(480);
        let frame = RawFrame::new(format, &data, 480);

        let first = bridge.to_streaming(&bridge.to_planar(&frame).unwrap(), &format.to_dsp_format()).unwrap();
        let second = bridge.to_streaming(&bridge.to_planar(&frame).unwrap(), &format.to_dsp_format()).unwrap();

        assert_eq!(first.presentation_time, MediaTime::new(0, 48000));
        assert_eq!(second.presentation_time, MediaTime::new(480, 48000));
    }

    #[test]
    fn supplied_presentation_time_wins() {
        let bridge = BufferBridge::new(48000.0);
        let (format, data) = mono_float(16);
        let frame = RawFrame::new(format, &data, 16).with_presentation_time(MediaTime::new(7, 1000));
        let streaming = bridge.to_streaming(&bridge.to_planar(&frame).unwrap(), &format.to_dsp_format()).unwrap();
        assert_eq!(streaming.presentation_time, MediaTime::new(7, 1000));
    }

    #[test]
    fn clock_rebase_keeps_elapsed_time() {
        let mut clock = PipelineClock::new(48000.0);
        clock.advance(48000);
        clock.rebase(44100.0);
        assert_eq!(clock.now(), MediaTime::new(44100, 44100));
    }
}
