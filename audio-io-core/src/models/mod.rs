pub mod audio_models;
pub mod buffers;
pub mod config;
pub mod dsp_parameters;
pub mod error;
pub mod format;
pub mod recording_result;
pub mod sound_transform;
pub mod state;
