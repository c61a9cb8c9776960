pub mod audio_engine;
pub mod capture_device;
pub mod capture_session;
pub mod encryptor;
pub mod playback;
pub mod session_delegate;
pub mod stream_sink;
