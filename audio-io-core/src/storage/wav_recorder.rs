use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::models::buffers::StreamingBuffer;
use crate::models::error::{PipelineError, SinkError};
use crate::models::format::{StreamDescription, FORMAT_FLAG_IS_FLOAT};
use crate::models::recording_result::{RecordingMetadata, RecordingResult, RecordingSummary};
use crate::processing::{sample_codec, wav_format};
use crate::traits::encryptor::CaptureEncryptor;
use crate::traits::stream_sink::StreamSink;

struct RecorderState {
    file: Option<File>,
    description: Option<StreamDescription>,
    total_bytes_written: u64,
    frames: u64,
    buffers: u64,
    finished: bool,
}

/// Recording sink that writes every streaming buffer to a WAV file, with
/// optional AES-256-GCM chunk encryption.
///
/// The file is opened on the first buffer and takes its format from that
/// buffer's description; later buffers with a different description are
/// rejected.
///
/// ## File Format
///
/// **Plaintext (no encryptor):**
/// ```text
/// [44-byte WAV header]
/// [interleaved 32-bit float samples...]
/// ```
///
/// **Encrypted (with encryptor):**
/// ```text
/// [44-byte WAV header, unencrypted]
/// [Chunk 1: 4-byte LE length | sealed box (nonce + ciphertext + tag)]
/// [Chunk 2: ...]
/// ...
/// ```
pub struct WavRecorder {
    name: String,
    file_path: PathBuf,
    encryptor: Option<Arc<dyn CaptureEncryptor>>,
    state: Mutex<RecorderState>,
}

impl WavRecorder {
    pub fn new(file_path: PathBuf, encryptor: Option<Arc<dyn CaptureEncryptor>>) -> Self {
        Self {
            name: format!("wav:{}", file_path.display()),
            file_path,
            encryptor,
            state: Mutex::new(RecorderState {
                file: None,
                description: None,
                total_bytes_written: 0,
                frames: 0,
                buffers: 0,
                finished: false,
            }),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Total bytes written so far (including WAV header).
    pub fn bytes_written(&self) -> u64 {
        self.state.lock().total_bytes_written
    }

    pub fn frames_written(&self) -> u64 {
        self.state.lock().frames
    }

    /// Finalize the file: patch the WAV header sizes and compute the SHA-256
    /// checksum. No further buffers are accepted afterwards.
    pub fn finish(&self) -> Result<RecordingResult, PipelineError> {
        let mut state = self.state.lock();
        let description = state
            .description
            .ok_or_else(|| PipelineError::StorageError("no audio was recorded".into()))?;
        let total = state.total_bytes_written;
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| PipelineError::StorageError("recording already finished".into()))?;

        let data_size = total.saturating_sub(wav_format::WAV_HEADER_SIZE as u64).min(u32::MAX as u64) as u32;
        patch_u32(file, wav_format::RIFF_SIZE_OFFSET, wav_format::riff_chunk_size(total))?;
        patch_u32(file, wav_format::DATA_SIZE_OFFSET, data_size)?;
        file.flush().map_err(|e| PipelineError::StorageError(e.to_string()))?;

        state.file = None;
        state.finished = true;

        let checksum = sha256_file(&self.file_path)?;
        let file_path = self.file_path.to_string_lossy();
        let metadata = RecordingMetadata::new(
            RecordingSummary {
                file_path: &file_path,
                checksum: &checksum,
                sample_rate: description.sample_rate,
                channels: description.channels_per_frame as u16,
                frames: state.frames,
                buffers: state.buffers,
            },
            self.encryptor.as_ref().map(|e| e.algorithm().to_string()),
            self.encryptor
                .as_ref()
                .and_then(|e| e.key_metadata().get("keyId").cloned()),
        );
        log::info!(
            "Recording finished: {} ({} frames, {:.2}s)",
            self.file_path.display(),
            state.frames,
            metadata.duration_secs
        );

        Ok(RecordingResult {
            file_path: self.file_path.clone(),
            duration_secs: metadata.duration_secs,
            metadata,
            checksum,
        })
    }

    fn open(&self, state: &mut RecorderState, description: &StreamDescription) -> Result<(), SinkError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| SinkError::Storage(format!("failed to create directory: {}", e)))?;
        }
        let file =
            File::create(&self.file_path).map_err(|e| SinkError::Storage(format!("failed to create file: {}", e)))?;
        state.file = Some(file);

        let header = wav_format::generate_wav_header(
            description.sample_rate.round() as u32,
            description.bits_per_channel as u16,
            description.channels_per_frame as u16,
            description.format_flags & FORMAT_FLAG_IS_FLOAT != 0,
            0, // patched by finish()
        );
        write_raw(state, &header)?;
        state.description = Some(*description);
        log::debug!("Recording opened: {}", self.file_path.display());
        Ok(())
    }
}

impl StreamSink for WavRecorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, buffer: &StreamingBuffer) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.finished {
            return Err(SinkError::NotReady);
        }
        if buffer.description.format_flags & FORMAT_FLAG_IS_FLOAT == 0 || buffer.description.bits_per_channel != 32 {
            return Err(SinkError::rejected("recorder only accepts 32-bit float buffers"));
        }
        let current = state.description;
        match current {
            None => self.open(&mut state, &buffer.description)?,
            Some(description) if description != buffer.description => {
                return Err(SinkError::rejected(format!(
                    "stream changed from {} Hz/{} ch to {} Hz/{} ch",
                    description.sample_rate,
                    description.channels_per_frame,
                    buffer.description.sample_rate,
                    buffer.description.channels_per_frame
                )));
            }
            Some(_) => {}
        }

        let planes: Vec<Vec<f32>> = (0..buffer.channel_count()).map(|i| buffer.plane_samples(i)).collect();
        let data = sample_codec::encode_f32_plane(&sample_codec::interleave(&planes));

        if let Some(encryptor) = &self.encryptor {
            let sealed = encryptor
                .encrypt(&data)
                .map_err(|e| SinkError::Storage(format!("chunk encryption failed: {}", e)))?;
            write_raw(&mut state, &(sealed.len() as u32).to_le_bytes())?;
            write_raw(&mut state, &sealed)?;
        } else {
            write_raw(&mut state, &data)?;
        }

        state.frames += buffer.frame_count as u64;
        state.buffers += 1;
        Ok(())
    }
}

fn write_raw(state: &mut RecorderState, data: &[u8]) -> Result<(), SinkError> {
    let file = state.file.as_mut().ok_or(SinkError::NotReady)?;
    file.write_all(data)
        .map_err(|e| SinkError::Storage(format!("write failed: {}", e)))?;
    state.total_bytes_written += data.len() as u64;
    Ok(())
}

fn patch_u32(file: &mut File, offset: u64, value: u32) -> Result<(), PipelineError> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| PipelineError::StorageError(e.to_string()))?;
    file.write_all(&value.to_le_bytes())
        .map_err(|e| PipelineError::StorageError(e.to_string()))
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, PipelineError> {
    let data = fs::read(path)
        .map_err(|e| PipelineError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
