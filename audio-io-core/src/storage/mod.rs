pub mod aes_encryptor;
pub mod metadata;
pub mod wav_recorder;

pub use aes_encryptor::AesGcmEncryptor;
pub use metadata::{read_metadata, write_metadata};
pub use wav_recorder::WavRecorder;
