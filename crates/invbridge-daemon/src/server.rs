//! HTTP trigger server
//!
//! | Method | Path        | Response                                      |
//! |--------|-------------|-----------------------------------------------|
//! | GET    | `/`         | HTML page with a "Run sync" button            |
//! | POST   | `/run-sync` | `{"status": "started"}`; requests a run now   |
//! | GET    | `/status`   | current phase and the last [`RunReport`]      |
//! | GET    | `/metrics`  | Prometheus text exposition                    |
//!
//! Known paths with the wrong method answer 405; anything else 404.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use invbridge_core::domain::RunPhase;
use invbridge_sync::{RunReport, RunTrigger, SyncRunner};

use crate::metrics::SyncMetrics;

const JSON: &str = "application/json";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";
const HTML: &str = "text/html; charset=utf-8";

const INDEX_PAGE: &str = r#"<html>
    <head><title>fireTMS → Optima Sync</title></head>
    <body>
        <h1>fireTMS → Optima Sync</h1>
        <button onclick="fetch('/run-sync',{method:'POST'}).then(r=>r.json()).then(d=>alert(d.status))">Run sync</button>
    </body>
</html>
"#;

/// What the endpoints read from and act on
#[derive(Clone)]
pub struct TriggerContext {
    trigger: RunTrigger,
    reports: tokio::sync::watch::Receiver<Option<RunReport>>,
    phase: tokio::sync::watch::Receiver<RunPhase>,
    metrics: Arc<SyncMetrics>,
}

impl TriggerContext {
    pub fn new(runner: &SyncRunner, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            trigger: runner.trigger(),
            reports: runner.subscribe_reports(),
            phase: runner.engine().subscribe_phase(),
            metrics,
        }
    }
}

/// HTTP server exposing the trigger, status and metrics endpoints.
pub struct TriggerServer {
    listener: TcpListener,
    ctx: TriggerContext,
}

impl TriggerServer {
    /// Binds the listening socket.
    ///
    /// # Arguments
    /// * `endpoint` - Address to bind, e.g. `"127.0.0.1:8085"` (port 0 picks a free port)
    /// * `ctx` - Runner handles and metrics served by the endpoints
    pub async fn bind(endpoint: &str, ctx: TriggerContext) -> anyhow::Result<Self> {
        let addr: SocketAddr = endpoint.parse()?;
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, ctx })
    }

    /// The bound address
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves connections until `shutdown` is cancelled.
    ///
    /// Should be spawned as a background task.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(addr = %self.local_addr()?, "Trigger server listening");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = result?;
                    debug!(peer = %peer, "Trigger connection accepted");
                    let io = TokioIo::new(stream);
                    let ctx = self.ctx.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let ctx = ctx.clone();
                            async move { Ok::<_, hyper::Error>(handle_request(req, &ctx)) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, "Trigger HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Trigger server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn handle_request<B>(req: Request<B>, ctx: &TriggerContext) -> Response<Full<Bytes>> {
    route(req.method(), req.uri().path(), ctx)
}

/// Dispatches one request by method and path.
pub fn route(method: &Method, path: &str, ctx: &TriggerContext) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/") => text_response(StatusCode::OK, HTML, INDEX_PAGE.to_string()),
        (&Method::POST, "/run-sync") => {
            ctx.trigger.request_run();
            json_response(StatusCode::OK, &serde_json::json!({"status": "started"}))
        }
        (&Method::GET, "/status") => {
            let phase = *ctx.phase.borrow();
            let last_run = ctx.reports.borrow().clone();
            json_response(
                StatusCode::OK,
                &serde_json::json!({
                    "phase": phase,
                    "last_run": last_run,
                }),
            )
        }
        (&Method::GET, "/metrics") => match ctx.metrics.encode() {
            Ok(body) => text_response(StatusCode::OK, PROMETHEUS_TEXT, body),
            Err(e) => text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                format!("Failed to encode metrics: {e}"),
            ),
        },
        (_, "/" | "/run-sync" | "/status" | "/metrics") => {
            text_response(StatusCode::METHOD_NOT_ALLOWED, "text/plain", "Method Not Allowed".into())
        }
        _ => text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found".into()),
    }
}

fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<Full<Bytes>> {
    text_response(status, JSON, value.to_string())
}

fn text_response(
    status: StatusCode,
    content_type: &'static str,
    body: String,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
