//! WAV file format utilities.
//!
//! Generates the standard 44-byte RIFF header for PCM or IEEE float data
//! and the offsets patched once recording completes.

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Offset of the RIFF chunk size (file size - 8).
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Offset of the data sub-chunk size.
pub const DATA_SIZE_OFFSET: u64 = 40;

/// Format tag for integer PCM.
pub const WAVE_FORMAT_PCM: u16 = 1;

/// Format tag for IEEE float samples.
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

/// Generate a 44-byte WAV RIFF header.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (format chunk size)
/// [20-21]  format tag (1 = PCM, 3 = IEEE float)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(
    sample_rate: u32,
    bit_depth: u16,
    channels: u16,
    is_float: bool,
    data_size: u32,
) -> [u8; WAV_HEADER_SIZE] {
    let byte_rate = sample_rate * channels as u32 * bit_depth as u32 / 8;
    let block_align = channels * bit_depth / 8;
    let chunk_size = 36 + data_size;
    let format_tag = if is_float { WAVE_FORMAT_IEEE_FLOAT } else { WAVE_FORMAT_PCM };

    let mut header = [0u8; WAV_HEADER_SIZE];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&format_tag.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// RIFF chunk size for a file of `total_file_size` bytes, saturated to u32.
pub fn riff_chunk_size(total_file_size: u64) -> u32 {
    total_file_size.saturating_sub(8).min(u32::MAX as u64) as u32
}
