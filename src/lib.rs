pub mod auth;
pub mod capture;
pub mod config;
pub mod health;
pub mod pb;
pub mod server;
pub mod storage;

pub use auth::{
    AuthContext, AuthError, AuthLayer, Clock, KeyCache, KeyFetchError, KeyFetchOutcome, KeyFetcher,
    TokenValidator,
};
pub use capture::{CaptureSession, ConversationAudioService, SessionState, StreamFormat};
pub use config::Config;
pub use storage::{GcsObjectStore, MemoryObjectStore, ObjectStore};
