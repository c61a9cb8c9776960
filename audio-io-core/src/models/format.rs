use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// Maximum channel count accepted by the pipeline.
pub const MAX_CHANNELS: u16 = 8;

/// Highest sample rate accepted by the pipeline, in Hz.
pub const MAX_SAMPLE_RATE: f64 = 384_000.0;

/// Four-character code for linear PCM (`'lpcm'`).
pub const LINEAR_PCM_FORMAT_ID: u32 = four_char_code(b"lpcm");

pub const fn four_char_code(code: &[u8; 4]) -> u32 {
    ((code[0] as u32) << 24) | ((code[1] as u32) << 16) | ((code[2] as u32) << 8) | code[3] as u32
}

/// How a single sample is stored in memory. All encodings are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleRepresentation {
    Int16,
    Int24,
    Int32,
    Float32,
}

impl SampleRepresentation {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Int16 => 2,
            Self::Int24 => 3,
            Self::Int32 | Self::Float32 => 4,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        self.bytes_per_sample() as u16 * 8
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32)
    }
}

/// Describes the layout of an audio stream.
///
/// Fields are private: a descriptor never changes after construction, a new
/// stream format always yields a new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    sample_rate: f64,
    channels: u16,
    sample: SampleRepresentation,
    interleaved: bool,
}

impl FormatDescriptor {
    pub fn new(
        sample_rate: f64,
        channels: u16,
        sample: SampleRepresentation,
        interleaved: bool,
    ) -> Result<Self, PipelineError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(PipelineError::InvalidFormat(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }
        if sample_rate > MAX_SAMPLE_RATE {
            return Err(PipelineError::InvalidFormat(format!(
                "sample rate {} exceeds {} Hz",
                sample_rate, MAX_SAMPLE_RATE
            )));
        }
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(PipelineError::InvalidFormat(format!(
                "unsupported channel count: {}",
                channels
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
            sample,
            interleaved,
        })
    }

    /// Float32, non-interleaved: the representation the DSP chain runs on.
    pub fn dsp(sample_rate: f64, channels: u16) -> Result<Self, PipelineError> {
        Self::new(sample_rate, channels, SampleRepresentation::Float32, false)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample(&self) -> SampleRepresentation {
        self.sample
    }

    pub fn is_interleaved(&self) -> bool {
        self.interleaved
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.sample.bytes_per_sample()
    }

    /// Number of bytes a buffer of `frames` frames must carry in this format,
    /// or `None` when that does not fit in `usize`.
    pub fn checked_byte_len(&self, frames: usize) -> Option<usize> {
        self.bytes_per_frame().checked_mul(frames)
    }

    /// Like [`checked_byte_len`](Self::checked_byte_len), saturating at `usize::MAX`.
    pub fn expected_byte_len(&self, frames: usize) -> usize {
        self.bytes_per_frame().saturating_mul(frames)
    }

    /// Same rate and channel count, in the DSP-native representation.
    pub fn to_dsp_format(&self) -> Self {
        Self {
            sample_rate: self.sample_rate,
            channels: self.channels,
            sample: SampleRepresentation::Float32,
            interleaved: false,
        }
    }

    pub fn is_dsp_format(&self) -> bool {
        self.sample == SampleRepresentation::Float32 && !self.interleaved
    }

    /// Whether two formats would produce the same DSP graph.
    pub fn same_graph_layout(&self, other: &Self) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }
}

impl std::fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {:?}, {}",
            self.sample_rate,
            self.channels,
            self.sample,
            if self.interleaved { "interleaved" } else { "planar" }
        )
    }
}

pub const FORMAT_FLAG_IS_FLOAT: u32 = 1 << 0;
pub const FORMAT_FLAG_IS_SIGNED_INTEGER: u32 = 1 << 2;
pub const FORMAT_FLAG_IS_PACKED: u32 = 1 << 3;
pub const FORMAT_FLAG_IS_NON_INTERLEAVED: u32 = 1 << 5;

/// Transport-side description of a PCM stream, synthesized from a
/// [`FormatDescriptor`] when a streaming buffer is built.
///
/// For non-interleaved streams the per-frame sizes describe a single plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamDescription {
    pub sample_rate: f64,
    pub format_id: u32,
    pub format_flags: u32,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub bytes_per_frame: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
}

impl StreamDescription {
    pub fn from_format(format: &FormatDescriptor) -> Self {
        let sample = format.sample();
        let mut flags = FORMAT_FLAG_IS_PACKED;
        if sample.is_float() {
            flags |= FORMAT_FLAG_IS_FLOAT;
        } else {
            flags |= FORMAT_FLAG_IS_SIGNED_INTEGER;
        }
        let bytes_per_frame = if format.is_interleaved() {
            format.bytes_per_frame()
        } else {
            flags |= FORMAT_FLAG_IS_NON_INTERLEAVED;
            sample.bytes_per_sample()
        } as u32;

        Self {
            sample_rate: format.sample_rate(),
            format_id: LINEAR_PCM_FORMAT_ID,
            format_flags: flags,
            bytes_per_packet: bytes_per_frame,
            frames_per_packet: 1,
            bytes_per_frame,
            channels_per_frame: format.channels() as u32,
            bits_per_channel: sample.bits_per_sample() as u32,
        }
    }

    /// Recover the descriptor this description was synthesized from.
    pub fn to_format(&self) -> Result<FormatDescriptor, PipelineError> {
        if self.format_id != LINEAR_PCM_FORMAT_ID {
            return Err(PipelineError::InvalidFormat(format!(
                "unsupported format id {:#010x}",
                self.format_id
            )));
        }
        let is_float = self.format_flags & FORMAT_FLAG_IS_FLOAT != 0;
        let sample = match (is_float, self.bits_per_channel) {
            (true, 32) => SampleRepresentation::Float32,
            (false, 16) => SampleRepresentation::Int16,
            (false, 24) => SampleRepresentation::Int24,
            (false, 32) => SampleRepresentation::Int32,
            (float, bits) => {
                return Err(PipelineError::InvalidFormat(format!(
                    "unsupported sample layout: float={} bits={}",
                    float, bits
                )))
            }
        };
        let channels = u16::try_from(self.channels_per_frame)
            .map_err(|_| PipelineError::InvalidFormat("channel count out of range".into()))?;
        let interleaved = self.format_flags & FORMAT_FLAG_IS_NON_INTERLEAVED == 0;
        FormatDescriptor::new(self.sample_rate, channels, sample, interleaved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_formats() {
        assert!(FormatDescriptor::new(0.0, 2, SampleRepresentation::Int16, true).is_err());
        assert!(FormatDescriptor::new(f64::NAN, 2, SampleRepresentation::Int16, true).is_err());
        assert!(FormatDescriptor::new(48000.0, 0, SampleRepresentation::Int16, true).is_err());
        assert!(FormatDescriptor::new(48000.0, 9, SampleRepresentation::Int16, true).is_err());
    }

    #[test]
    fn rejects_sample_rates_above_limit() {
        assert!(FormatDescriptor::new(384_000.0, 2, SampleRepresentation::Float32, false).is_ok());
        let err = FormatDescriptor::new(1e9, 2, SampleRepresentation::Float32, false).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFormat(_)));
        assert!(FormatDescriptor::dsp(384_001.0, 1).is_err());
    }

    #[test]
    fn expected_byte_len() {
        let format = FormatDescriptor::new(44100.0, 2, SampleRepresentation::Int24, true).unwrap();
        assert_eq!(format.bytes_per_frame(), 6);
        assert_eq!(format.expected_byte_len(100), 600);
        assert_eq!(format.checked_byte_len(usize::MAX / 2), None);
        assert_eq!(format.expected_byte_len(usize::MAX / 2), usize::MAX);
    }

    #[test]
    fn dsp_format_keeps_layout() {
        let format = FormatDescriptor::new(44100.0, 2, SampleRepresentation::Int16, true).unwrap();
        let dsp = format.to_dsp_format();
        assert!(dsp.is_dsp_format());
        assert!(dsp.same_graph_layout(&format));
        assert_ne!(dsp, format);
    }

    #[test]
    fn lpcm_four_char_code() {
        assert_eq!(LINEAR_PCM_FORMAT_ID, 0x6C70_636D);
    }

    #[test]
    fn stream_description_round_trips_descriptor() {
        let planar = FormatDescriptor::dsp(48000.0, 2).unwrap();
        let description = StreamDescription::from_format(&planar);
        assert_eq!(description.bytes_per_frame, 4);
        assert_eq!(description.channels_per_frame, 2);
        assert_ne!(description.format_flags & FORMAT_FLAG_IS_NON_INTERLEAVED, 0);
        assert_eq!(description.to_format().unwrap(), planar);

        let packed = FormatDescriptor::new(16000.0, 2, SampleRepresentation::Int16, true).unwrap();
        let description = StreamDescription::from_format(&packed);
        assert_eq!(description.bytes_per_frame, 4);
        assert_eq!(description.to_format().unwrap(), packed);
    }
}
