//! HTTP API.
//!
//! | Route | Method | Body |
//! |---|---|---|
//! | `/api/generate` | `POST` | [`GenerateRequest`] -> [`GenerateResponse`] |
//! | `/api/merge` | `POST` | [`MergeRequest`] -> [`GenerateResponse`] |
//! | `/health` | `GET` | `{"status":"ok"}` |
//!
//! Errors are answered as `{"error": {"kind": "...", "message": "..."}}`.

mod logging;

pub use logging::{REQUEST_ID_HEADER, RequestLoggerLayer, RequestLoggerService};

use crate::config::Config;
use crate::error::{Result, WeaverError};
use crate::generator::{GenerateRequest, GenerateResponse, MergeRequest, ProjectGenerator};
use http::header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, CONTENT_LENGTH, CONTENT_TYPE};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceBuilder;

/// Shared by every connection.
#[derive(Debug)]
struct AppState {
    generator: ProjectGenerator,
    max_body_bytes: usize,
}

/// A bound, not yet running, HTTP server.
#[derive(Debug)]
pub struct WeaverServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl WeaverServer {
    /// Binds `addr`. Port 0 picks a free port; see [`local_addr`](Self::local_addr).
    pub async fn bind(addr: SocketAddr, generator: ProjectGenerator, max_body_bytes: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, state: Arc::new(AppState { generator, max_body_bytes }) })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until the process exits.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` completes. Open connections finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self.local_addr()?;
        tracing::info!(%addr, model = %self.state.generator.model_id(), strategy = %self.state.generator.strategy(), "Weaver server listening");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            tracing::debug!(%peer, "New connection");
                            let state = Arc::clone(&self.state);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, state).await {
                                    tracing::warn!(%peer, error = %e, "Connection handler error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Error accepting connection");
                        }
                    }
                }
                () = &mut shutdown => {
                    tracing::info!("Shutdown signal received, stopping accept loop");
                    return Ok(());
                }
            }
        }
    }
}

/// Builds the generator from `config` and serves until Ctrl-C.
pub async fn serve(config: &Config) -> Result<()> {
    let generator = ProjectGenerator::from_config(config)?;
    let addr = config.server.socket_addr()?;
    let server = WeaverServer::bind(addr, generator, config.server.max_body_bytes).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
}

async fn handle_connection(stream: TcpStream, state: Arc<AppState>) -> Result<()> {
    let service = ServiceBuilder::new().layer(RequestLoggerLayer).service_fn(move |req: Request<Incoming>| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(route(&state, req).await) }
    });

    http1::Builder::new()
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
        .await?;
    Ok(())
}

const POST_METHODS: &[Method] = &[Method::POST, Method::OPTIONS];
const GET_METHODS: &[Method] = &[Method::GET, Method::OPTIONS];
const OPTIONS_ONLY: &[Method] = &[Method::OPTIONS];

/// Methods each known path answers, `None` for unknown paths.
fn allowed_methods(path: &str) -> Option<&'static [Method]> {
    match path {
        "/api/generate" | "/api/merge" => Some(POST_METHODS),
        "/health" => Some(GET_METHODS),
        _ => None,
    }
}

fn allow_header(methods: &[Method]) -> String {
    methods.iter().map(Method::as_str).collect::<Vec<_>>().join(", ")
}

async fn route(state: &AppState, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let path = req.uri().path().to_string();
    let allowed = allowed_methods(&path);

    if req.method() == Method::OPTIONS {
        let methods = allow_header(allowed.unwrap_or(OPTIONS_ONLY));
        return with_cors(
            Response::builder()
                .status(StatusCode::NO_CONTENT)
                .header(ALLOW, methods.as_str())
                .header(http::header::ACCESS_CONTROL_ALLOW_METHODS, methods.as_str())
                .header(ACCESS_CONTROL_ALLOW_HEADERS, "content-type, x-request-id"),
            Full::default(),
        );
    }

    let Some(allowed) = allowed else {
        return error_response(StatusCode::NOT_FOUND, "not_found", &format!("no route for {path}"));
    };
    if !allowed.contains(req.method()) {
        let mut response = error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            &format!("{} is not allowed on {path}", req.method()),
        );
        if let Ok(value) = allow_header(allowed).parse() {
            response.headers_mut().insert(ALLOW, value);
        }
        return response;
    }

    match path.as_str() {
        "/health" => json_response(StatusCode::OK, &json!({"status": "ok"})),
        "/api/generate" => match read_json::<GenerateRequest>(req, state.max_body_bytes).await {
            Ok(request) => respond(state.generator.generate(request).await),
            Err(response) => response,
        },
        _ => match read_json::<MergeRequest>(req, state.max_body_bytes).await {
            Ok(request) => respond(Ok(state.generator.merge(request))),
            Err(response) => response,
        },
    }
}

fn respond(result: Result<GenerateResponse>) -> Response<Full<Bytes>> {
    match result {
        Ok(body) => json_response(StatusCode::OK, &body),
        Err(e) => weaver_error_response(&e),
    }
}

/// Reads and parses a JSON body of at most `limit` bytes.
async fn read_json<T: DeserializeOwned>(
    req: Request<Incoming>,
    limit: usize,
) -> std::result::Result<T, Response<Full<Bytes>>> {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(too_large(limit));
    }

    let bytes = match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => return Err(too_large(limit)),
        Err(e) => {
            return Err(weaver_error_response(&WeaverError::InvalidInput(format!("failed to read request body: {e}"))));
        }
    };

    serde_json::from_slice(&bytes).map_err(|e| {
        weaver_error_response(&WeaverError::InvalidInput(format!("malformed request body: {e}")))
    })
}

fn too_large(limit: usize) -> Response<Full<Bytes>> {
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        "payload_too_large",
        &format!("request body exceeds {limit} bytes"),
    )
}

fn weaver_error_response(err: &WeaverError) -> Response<Full<Bytes>> {
    if err.status_code().is_server_error() {
        tracing::error!(kind = err.kind(), error = %err, "Request failed");
    } else {
        tracing::debug!(kind = err.kind(), error = %err, "Request rejected");
    }
    error_response(err.status_code(), err.kind(), &err.to_string())
}

fn error_response(status: StatusCode, kind: &str, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &json!({"error": {"kind": kind, "message": message}}))
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => with_cors(
            Response::builder().status(status).header(CONTENT_TYPE, "application/json"),
            Full::new(Bytes::from(bytes)),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            let mut response = Response::new(Full::new(Bytes::from_static(b"internal error")));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

fn with_cors(builder: http::response::Builder, body: Full<Bytes>) -> Response<Full<Bytes>> {
    builder.header(ACCESS_CONTROL_ALLOW_ORIGIN, "*").body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build response");
        let mut response = Response::new(Full::default());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}
