use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::{HeaderMap, HeaderValue, Request, Response};
use tonic::body::BoxBody;
use tower::{Layer, Service};
use tracing::{info_span, warn, Instrument};

use super::token::TokenValidator;

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const TRACKING_ID_HEADER: &str = "trackingid";

/// Infrastructure methods reachable without a credential: reflection and
/// liveness probes.
const BYPASS_PREFIXES: &[&str] = &[
    "/grpc.reflection.v1alpha.ServerReflection",
    "/grpc.reflection.v1.ServerReflection",
    "/grpc.health.v1.Health",
    "/audiofork.v1.Health",
];

/// Per-call context resolved by the gate and threaded explicitly through the
/// call path (request extensions + tracing span); never stored globally.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub tracking_id: Option<String>,
    pub tenant_id: String,
}

/// Supported credential kinds. A closed set: admitting a new kind means
/// adding a variant and its validation arm, call sites stay unchanged.
pub enum Credential {
    Jwt(String),
}

impl Credential {
    /// Parse an `authorization` header value into a credential.
    pub fn from_header(value: &str) -> Option<Credential> {
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))?
            .trim();
        (!token.is_empty()).then(|| Credential::Jwt(token.to_string()))
    }
}

pub fn requires_auth(path: &str) -> bool {
    !BYPASS_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Tower layer gating every inbound call on token validation before it
/// reaches business logic.
#[derive(Clone)]
pub struct AuthLayer {
    validator: Arc<TokenValidator>,
}

impl AuthLayer {
    pub fn new(validator: Arc<TokenValidator>) -> Self {
        Self { validator }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            validator: self.validator.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    validator: Arc<TokenValidator>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AuthService<S>
where
    S: Service<Request<ReqBody>, Response = Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response<BoxBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Swap out the ready inner service; the clone is only polled later.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let validator = self.validator.clone();

        Box::pin(async move {
            if !requires_auth(req.uri().path()) {
                return inner.call(req).await;
            }

            let tracking_id = header_str(req.headers(), TRACKING_ID_HEADER);

            let credential = header_str(req.headers(), AUTHORIZATION_HEADER)
                .as_deref()
                .and_then(Credential::from_header);
            let Some(credential) = credential else {
                warn!(path = %req.uri().path(), "Missing or malformed authorization credential");
                return Ok(unauthenticated("missing bearer credential"));
            };

            let validated = match credential {
                Credential::Jwt(token) => validator.validate(&token).await,
            };

            match validated {
                Ok(token) => {
                    let ctx = AuthContext {
                        tracking_id: tracking_id.clone(),
                        tenant_id: token.subject,
                    };
                    let span = info_span!(
                        "authorized_call",
                        tracking_id = tracking_id.as_deref().unwrap_or(""),
                        tenant_id = %ctx.tenant_id
                    );
                    req.extensions_mut().insert(ctx);
                    inner.call(req).instrument(span).await
                }
                Err(e) => {
                    warn!(path = %req.uri().path(), "Authorization failed: {e}");
                    Ok(unauthenticated(&format!("authorization failed: {e}")))
                }
            }
        })
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Trailers-only gRPC response carrying UNAUTHENTICATED (code 16).
fn unauthenticated(message: &str) -> Response<BoxBody> {
    let mut response = Response::new(tonic::body::empty_body());
    let headers = response.headers_mut();
    headers.insert("content-type", HeaderValue::from_static("application/grpc"));
    headers.insert("grpc-status", HeaderValue::from_static("16"));
    if let Ok(value) = HeaderValue::from_str(message) {
        headers.insert("grpc-message", value);
    }
    response
}
