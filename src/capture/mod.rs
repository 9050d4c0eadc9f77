mod service;
mod session;
mod wav;

pub use service::ConversationAudioService;
pub use session::{object_key, CaptureError, CaptureSession, SessionState};
pub use wav::{
    wav_file, wav_header, StreamFormat, CONTENT_TYPE_WAV, FORMAT_CODE_MULAW, FORMAT_CODE_PCM,
    WAV_HEADER_LEN,
};
