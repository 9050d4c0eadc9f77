use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::wav::{self, StreamFormat, CONTENT_TYPE_WAV, FORMAT_CODE_MULAW, FORMAT_CODE_PCM};
use crate::pb::{AudioEncoding, AudioForkingRequest};
use crate::storage::ObjectStore;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("unsupported audio encoding: {0}")]
    UnsupportedEncoding(i32),
    #[error("chunk received after session was closed")]
    SessionClosed,
}

/// Lifecycle of one streaming call's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingFirstChunk,
    Active,
    Finalized,
    Aborted,
}

/// Per-call capture state: one conversation, one detected format, one
/// append-only buffer per speaker role.
///
/// Owned exclusively by the call task; chunk events arrive strictly in
/// order, so no internal locking is needed. The format is locked from the
/// first chunk and never re-checked against later chunks.
pub struct CaptureSession {
    state: SessionState,
    conversation_id: Option<String>,
    format: Option<StreamFormat>,
    buffers: HashMap<String, Vec<u8>>,
    store: Arc<dyn ObjectStore>,
}

impl CaptureSession {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            state: SessionState::AwaitingFirstChunk,
            conversation_id: None,
            format: None,
            buffers: HashMap::new(),
            store,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Consume one inbound chunk and produce the acknowledgement message.
    ///
    /// The first chunk fixes the conversation id and audio format for the
    /// whole stream; an unsupported declared encoding aborts the session
    /// before any buffering happens.
    pub fn handle_chunk(&mut self, request: AudioForkingRequest) -> Result<String, CaptureError> {
        match self.state {
            SessionState::AwaitingFirstChunk => {
                let audio = request.audio.clone().unwrap_or_default();
                let format = match AudioEncoding::try_from(audio.encoding) {
                    Ok(AudioEncoding::Mulaw) => StreamFormat {
                        sample_rate_hz: audio.sample_rate_hertz,
                        bits_per_sample: 8,
                        format_code: FORMAT_CODE_MULAW,
                    },
                    Ok(AudioEncoding::Linear16) => StreamFormat {
                        sample_rate_hz: audio.sample_rate_hertz,
                        bits_per_sample: 16,
                        format_code: FORMAT_CODE_PCM,
                    },
                    _ => {
                        error!(encoding = audio.encoding, "Unsupported audio encoding");
                        self.state = SessionState::Aborted;
                        self.buffers.clear();
                        return Err(CaptureError::UnsupportedEncoding(audio.encoding));
                    }
                };

                info!(
                    conversation_id = %request.conversation_id,
                    sample_rate_hz = format.sample_rate_hz,
                    bits_per_sample = format.bits_per_sample,
                    format_code = format.format_code,
                    "Detected audio stream format"
                );
                self.conversation_id = Some(request.conversation_id.clone());
                self.format = Some(format);
                self.state = SessionState::Active;
                self.append_chunk(request)
            }
            SessionState::Active => self.append_chunk(request),
            SessionState::Finalized | SessionState::Aborted => Err(CaptureError::SessionClosed),
        }
    }

    fn append_chunk(&mut self, request: AudioForkingRequest) -> Result<String, CaptureError> {
        let audio = request.audio.unwrap_or_default();
        let buffer = self.buffers.entry(audio.role_id).or_default();
        if !audio.audio_data.is_empty() {
            buffer.extend_from_slice(&audio.audio_data);
        }
        Ok(format!(
            "processed chunk for conversation {}",
            request.conversation_id
        ))
    }

    /// Stream end: wrap every non-empty role buffer in a WAV container and
    /// upload it. One role's upload failure does not stop the others.
    /// Buffers are cleared unconditionally.
    pub async fn finalize(&mut self) {
        if self.state != SessionState::Active {
            warn!("Finalize requested but no audio was ever received; nothing to upload");
            self.state = SessionState::Finalized;
            return;
        }
        // Both are set on the Active transition.
        let (Some(conversation_id), Some(format)) = (self.conversation_id.clone(), self.format)
        else {
            self.state = SessionState::Finalized;
            return;
        };

        info!(conversation_id = %conversation_id, "Finalizing WAV files");
        for (role_id, buffer) in &self.buffers {
            if buffer.is_empty() {
                info!(role_id = %role_id, "Skipping upload, no audio data received");
                continue;
            }

            let key = object_key(&conversation_id, role_id);
            let file = wav::wav_file(format, buffer);
            if let Err(e) = self.store.put(&key, CONTENT_TYPE_WAV, file).await {
                error!(role_id = %role_id, key = %key, "Failed to upload WAV file: {e}");
            }
        }

        self.buffers.clear();
        self.state = SessionState::Finalized;
    }

    /// Transport error or cancellation: drop everything, upload nothing.
    pub fn abort(&mut self) {
        self.buffers.clear();
        self.state = SessionState::Aborted;
    }
}

/// Deterministic storage key: one object per role per conversation.
pub fn object_key(conversation_id: &str, role_id: &str) -> String {
    format!("audio/{conversation_id}-{role_id}.wav")
}
