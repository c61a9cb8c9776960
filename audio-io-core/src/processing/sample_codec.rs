//! Sample-level conversions between raw device bytes and `f32` planes.
//!
//! Integer samples are normalized by `2^(bits-1)`, so full-scale negative
//! values map to exactly -1.0.

use crate::models::format::SampleRepresentation;

/// Decode one little-endian sample. `bytes` must hold at least the sample width.
#[inline]
pub fn decode_sample(bytes: &[u8], sample: SampleRepresentation) -> f32 {
    match sample {
        SampleRepresentation::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32_768.0,
        SampleRepresentation::Int24 => {
            // Sign-extend by placing the 24 bits in the top of an i32.
            let value = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
            value as f32 / 8_388_608.0
        }
        SampleRepresentation::Int32 => {
            i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32 / 2_147_483_648.0
        }
        SampleRepresentation::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

/// Split interleaved `[L0, R0, L1, R1, ...]` bytes into one `f32` plane per channel.
pub fn deinterleave(data: &[u8], channels: usize, sample: SampleRepresentation) -> Vec<Vec<f32>> {
    let width = sample.bytes_per_sample();
    let frame_bytes = width * channels;
    if frame_bytes == 0 {
        return Vec::new();
    }

    let mut planes = vec![Vec::with_capacity(data.len() / frame_bytes); channels];
    for frame in data.chunks_exact(frame_bytes) {
        for (ch, plane) in planes.iter_mut().enumerate() {
            plane.push(decode_sample(&frame[ch * width..], sample));
        }
    }
    planes
}

/// Decode channel-major (plane after plane) bytes.
pub fn split_planes(data: &[u8], channels: usize, sample: SampleRepresentation) -> Vec<Vec<f32>> {
    let width = sample.bytes_per_sample();
    if channels == 0 {
        return Vec::new();
    }
    let plane_bytes = data.len() / channels;
    data.chunks_exact(plane_bytes.max(1))
        .take(channels)
        .map(|plane| plane.chunks_exact(width).map(|s| decode_sample(s, sample)).collect())
        .collect()
}

/// Encode an `f32` plane as little-endian bytes.
pub fn encode_f32_plane(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 4);
    for &sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}

/// Interleave planes into `[L0, R0, L1, R1, ...]`. Shorter planes are zero-padded.
pub fn interleave(planes: &[Vec<f32>]) -> Vec<f32> {
    let channels = planes.len();
    let frame_count = planes.iter().map(Vec::len).max().unwrap_or(0);
    if frame_count == 0 {
        return Vec::new();
    }

    let mut interleaved = vec![0.0f32; frame_count * channels];
    for (ch, plane) in planes.iter().enumerate() {
        for (i, &sample) in plane.iter().enumerate() {
            interleaved[i * channels + ch] = sample;
        }
    }
    interleaved
}
