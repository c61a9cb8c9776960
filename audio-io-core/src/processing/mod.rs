pub mod buffer_bridge;
pub mod sample_codec;
pub mod wav_format;
