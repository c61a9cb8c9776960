use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::format::{FormatDescriptor, StreamDescription};

/// Rational media time: `value / timescale` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime { value: 0, timescale: 1 };

    pub fn new(value: i64, timescale: i32) -> Self {
        Self { value, timescale }
    }

    /// Time spanned by `frames` frames at `sample_rate`, in the sample-rate timescale.
    pub fn from_frames(frames: u64, sample_rate: f64) -> Self {
        Self {
            value: frames as i64,
            timescale: sample_rate.round() as i32,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.timescale > 0
    }

    pub fn seconds(&self) -> f64 {
        if self.timescale <= 0 {
            return 0.0;
        }
        self.value as f64 / self.timescale as f64
    }

    /// Convert to another timescale, rounding to the nearest tick.
    pub fn rescaled(&self, timescale: i32) -> Self {
        if self.timescale == timescale || self.timescale <= 0 {
            return Self { value: self.value, timescale };
        }
        let value = (self.value as i128 * timescale as i128 + self.timescale as i128 / 2)
            / self.timescale as i128;
        Self {
            value: value as i64,
            timescale,
        }
    }
}

/// A hardware-format chunk as delivered by the capture device.
///
/// Borrows the device's memory, so it cannot outlive the callback that
/// delivered it. Non-interleaved data is laid out plane after plane.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub format: FormatDescriptor,
    pub data: &'a [u8],
    pub frame_count: usize,
    pub presentation_time: Option<MediaTime>,
}

impl<'a> RawFrame<'a> {
    pub fn new(format: FormatDescriptor, data: &'a [u8], frame_count: usize) -> Self {
        Self {
            format,
            data,
            frame_count,
            presentation_time: None,
        }
    }

    pub fn with_presentation_time(mut self, time: MediaTime) -> Self {
        self.presentation_time = Some(time);
        self
    }

    /// Whether `data` holds exactly `channels x sample width x frame_count` bytes.
    pub fn is_size_consistent(&self) -> bool {
        self.format.checked_byte_len(self.frame_count) == Some(self.data.len())
    }
}

/// PCM buffer in the DSP chain's native layout: one `f32` plane per channel.
///
/// Moves by value from stage to stage; cloning copies every plane.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarBuffer {
    format: FormatDescriptor,
    planes: Vec<Vec<f32>>,
    frame_capacity: usize,
    frame_length: usize,
    pub presentation_time: Option<MediaTime>,
}

impl PlanarBuffer {
    /// Allocate a silent buffer of `frame_capacity` frames with `frame_length` 0.
    pub fn new(format: FormatDescriptor, frame_capacity: usize) -> Result<Self, PipelineError> {
        if !format.is_dsp_format() {
            return Err(PipelineError::BufferConstructionFailure(format!(
                "planar buffers require a float planar format, got {}",
                format
            )));
        }
        if frame_capacity == 0 {
            return Err(PipelineError::BufferConstructionFailure(
                "frame capacity must be non-zero".into(),
            ));
        }
        Ok(Self {
            format,
            planes: vec![vec![0.0; frame_capacity]; format.channels() as usize],
            frame_capacity,
            frame_length: 0,
            presentation_time: None,
        })
    }

    /// Build a full buffer from existing planes. All planes must share one length.
    pub fn from_planes(format: FormatDescriptor, planes: Vec<Vec<f32>>) -> Result<Self, PipelineError> {
        if !format.is_dsp_format() {
            return Err(PipelineError::BufferConstructionFailure(format!(
                "planar buffers require a float planar format, got {}",
                format
            )));
        }
        if planes.len() != format.channels() as usize {
            return Err(PipelineError::BufferConstructionFailure(format!(
                "expected {} planes, got {}",
                format.channels(),
                planes.len()
            )));
        }
        let frames = planes.first().map(Vec::len).unwrap_or(0);
        if frames == 0 || planes.iter().any(|p| p.len() != frames) {
            return Err(PipelineError::BufferConstructionFailure(
                "planes must be non-empty and of equal length".into(),
            ));
        }
        Ok(Self {
            format,
            planes,
            frame_capacity: frames,
            frame_length: frames,
            presentation_time: None,
        })
    }

    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }

    pub fn channel_count(&self) -> usize {
        self.planes.len()
    }

    pub fn frame_capacity(&self) -> usize {
        self.frame_capacity
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn set_frame_length(&mut self, frames: usize) -> Result<(), PipelineError> {
        if frames > self.frame_capacity {
            return Err(PipelineError::BufferConstructionFailure(format!(
                "frame length {} exceeds capacity {}",
                frames, self.frame_capacity
            )));
        }
        self.frame_length = frames;
        Ok(())
    }

    /// Valid samples of one channel.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.planes[index][..self.frame_length]
    }

    /// Writable samples of one channel, up to capacity.
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.planes[index]
    }

    /// Valid samples of every channel.
    pub fn planes(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.planes.iter().map(move |p| &p[..self.frame_length])
    }

    /// Give up the planes, truncated to the valid frame length.
    pub fn into_planes(self) -> Vec<Vec<f32>> {
        let length = self.frame_length;
        self.planes
            .into_iter()
            .map(|mut p| {
                p.truncate(length);
                p
            })
            .collect()
    }

    pub fn duration(&self) -> MediaTime {
        MediaTime::from_frames(self.frame_length as u64, self.format.sample_rate())
    }
}

/// Transport-facing buffer: one byte region per plane plus explicit
/// description and timing. Owns its bytes independently of the
/// [`PlanarBuffer`] it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingBuffer {
    pub description: StreamDescription,
    pub planes: Vec<Vec<u8>>,
    pub frame_count: usize,
    pub duration: MediaTime,
    pub presentation_time: MediaTime,
}

impl StreamingBuffer {
    pub fn channel_count(&self) -> usize {
        self.planes.len()
    }

    pub fn byte_len(&self) -> usize {
        self.planes.iter().map(Vec::len).sum()
    }

    /// Decode one plane back to `f32` samples.
    ///
    /// Only valid for float descriptions, which is what the bridge produces.
    pub fn plane_samples(&self, index: usize) -> Vec<f32> {
        self.planes[index]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::SampleRepresentation;

    #[test]
    fn media_time_seconds_and_rescale() {
        let time = MediaTime::from_frames(1024, 48000.0);
        assert_eq!(time.timescale, 48000);
        assert!((time.seconds() - 1024.0 / 48000.0).abs() < 1e-12);

        let rescaled = MediaTime::new(48000, 48000).rescaled(44100);
        assert_eq!(rescaled, MediaTime::new(44100, 44100));
        assert_eq!(MediaTime::new(5, 0).seconds(), 0.0);
    }

    #[test]
    fn raw_frame_size_check() {
        let format = FormatDescriptor::new(48000.0, 2, SampleRepresentation::Int16, true).unwrap();
        let data = [0u8; 16];
        assert!(RawFrame::new(format, &data, 4).is_size_consistent());
        assert!(!RawFrame::new(format, &data, 5).is_size_consistent());
    }

    #[test]
    fn planar_buffer_rejects_non_dsp_format() {
        let format = FormatDescriptor::new(48000.0, 1, SampleRepresentation::Int16, true).unwrap();
        assert!(PlanarBuffer::new(format, 16).is_err());
    }

    #[test]
    fn planar_buffer_frame_length_bounded_by_capacity() {
        let format = FormatDescriptor::dsp(48000.0, 2).unwrap();
        let mut buffer = PlanarBuffer::new(format, 8).unwrap();
        assert_eq!(buffer.frame_length(), 0);
        buffer.set_frame_length(8).unwrap();
        assert!(buffer.set_frame_length(9).is_err());
        buffer.channel_mut(1)[0] = 0.25;
        assert_eq!(buffer.channel(1)[0], 0.25);
        assert_eq!(buffer.channel_count(), 2);
    }

    #[test]
    fn from_planes_requires_matching_layout() {
        let format = FormatDescriptor::dsp(48000.0, 2).unwrap();
        assert!(PlanarBuffer::from_planes(format, vec![vec![0.0; 4]]).is_err());
        assert!(PlanarBuffer::from_planes(format, vec![vec![0.0; 4], vec![0.0; 3]]).is_err());
        let buffer = PlanarBuffer::from_planes(format, vec![vec![0.0; 4], vec![1.0; 4]]).unwrap();
        assert_eq!(buffer.frame_length(), 4);
        assert_eq!(buffer.into_planes()[1], vec![1.0; 4]);
    }
}
