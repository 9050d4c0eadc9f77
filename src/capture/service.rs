use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{error, info_span, warn, Instrument};

use super::session::{CaptureError, CaptureSession};
use crate::auth::AuthContext;
use crate::pb::conversation_audio_server::ConversationAudio;
use crate::pb::{AudioForkingRequest, AudioForkingResponse};
use crate::storage::ObjectStore;

/// Binds one fresh [`CaptureSession`] to each streaming call and routes its
/// events there. Holds no state of its own beyond the storage handle.
pub struct ConversationAudioService {
    store: Option<Arc<dyn ObjectStore>>,
}

impl ConversationAudioService {
    /// `store` is `None` when no bucket is configured; in that mode every
    /// call is refused at open rather than accepting audio that cannot be
    /// persisted.
    pub fn new(store: Option<Arc<dyn ObjectStore>>) -> Self {
        if store.is_none() {
            warn!("No object storage configured; audio streams will be rejected");
        }
        Self { store }
    }
}

#[tonic::async_trait]
impl ConversationAudio for ConversationAudioService {
    type StreamConversationAudioStream = ReceiverStream<Result<AudioForkingResponse, Status>>;

    async fn stream_conversation_audio(
        &self,
        request: Request<Streaming<AudioForkingRequest>>,
    ) -> Result<Response<Self::StreamConversationAudioStream>, Status> {
        let store = self.store.clone().ok_or_else(|| {
            Status::failed_precondition("server is not configured to save audio streams")
        })?;

        let ctx = request.extensions().get::<AuthContext>().cloned();
        let span = match &ctx {
            Some(ctx) => info_span!(
                "capture_call",
                tracking_id = ctx.tracking_id.as_deref().unwrap_or(""),
                tenant_id = %ctx.tenant_id
            ),
            None => info_span!("capture_call"),
        };

        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel::<Result<AudioForkingResponse, Status>>(64);

        tokio::spawn(
            async move {
                let mut session = CaptureSession::new(store);
                loop {
                    match inbound.next().await {
                        Some(Ok(chunk)) => match session.handle_chunk(chunk) {
                            Ok(ack) => {
                                let response = AudioForkingResponse {
                                    status_message: ack,
                                };
                                if tx.send(Ok(response)).await.is_err() {
                                    // Caller went away mid-stream.
                                    session.abort();
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Rejecting audio stream: {e}");
                                let status = match e {
                                    CaptureError::UnsupportedEncoding(_) => {
                                        Status::invalid_argument(e.to_string())
                                    }
                                    CaptureError::SessionClosed => Status::internal(e.to_string()),
                                };
                                session.abort();
                                let _ = tx.send(Err(status)).await;
                                break;
                            }
                        },
                        Some(Err(status)) => {
                            error!("Client stream produced an error: {status}");
                            session.abort();
                            break;
                        }
                        None => {
                            session.finalize().await;
                            break;
                        }
                    }
                }
            }
            .instrument(span),
        );

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
