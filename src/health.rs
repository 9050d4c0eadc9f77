use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::info;

use crate::pb::health_check_response::ServingStatus;
use crate::pb::health_server::Health;
use crate::pb::{HealthCheckRequest, HealthCheckResponse};

/// Liveness endpoint. Reports SERVING while the main server accepts traffic;
/// flipped off during shutdown. Served plaintext and never authorized.
pub struct HealthService {
    serving: Arc<AtomicBool>,
}

impl HealthService {
    pub fn new(serving: Arc<AtomicBool>) -> Self {
        Self { serving }
    }
}

#[tonic::async_trait]
impl Health for HealthService {
    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let service = request.into_inner().service;
        let status = if self.serving.load(Ordering::SeqCst) {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        };
        info!(service = %service, status = ?status, "Health check");

        Ok(Response::new(HealthCheckResponse {
            status: status as i32,
        }))
    }
}
