use std::future::Future;
use std::net::SocketAddr;

use tokio::sync::watch;
use warp::Filter;

use super::PrometheusReporter;
use crate::domain::value_objects::{PublishState, SessionSnapshot};

const SERVICE_NAME: &str = "pipeline-rtmp-publish";

/// Health check response structure
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    state: String,
}

impl HealthResponse {
    fn new(status: &'static str, state: &PublishState) -> Self {
        Self {
            status,
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            state: state.to_string(),
        }
    }
}

/// Ready once a preview surface is attached
fn is_ready(snapshot: &SessionSnapshot) -> bool {
    snapshot.state != PublishState::Idle
}

/// Serve metrics, health probes and session status until `shutdown` resolves.
///
/// Returns once the server has drained.
pub async fn serve_metrics<F>(
    port: u16,
    status: watch::Receiver<SessionSnapshot>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    // CORS configuration for browser access
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "OPTIONS"])
        .allow_headers(vec!["Content-Type"]);

    let with_status = warp::any().map(move || status.borrow().clone());

    let metrics_route = warp::path("metrics").map(|| {
        let body = PrometheusReporter::gather_metrics();
        warp::reply::with_header(body, "content-type", "text/plain; version=0.0.4; charset=utf-8")
    });

    let health_route = warp::path("health")
        .and(with_status.clone())
        .map(|snapshot: SessionSnapshot| {
            let status = if snapshot.state.is_problematic() {
                "degraded"
            } else {
                "healthy"
            };
            warp::reply::json(&HealthResponse::new(status, &snapshot.state))
        });

    // Liveness probe endpoint (minimal check - is the process running?)
    let liveness_route =
        warp::path("livez").map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    // Readiness probe endpoint (is a preview surface attached?)
    let readiness_route = warp::path("readyz")
        .and(with_status.clone())
        .map(|snapshot: SessionSnapshot| {
            let (status, code) = if is_ready(&snapshot) {
                ("ready", warp::http::StatusCode::OK)
            } else {
                ("not_ready", warp::http::StatusCode::SERVICE_UNAVAILABLE)
            };
            warp::reply::with_status(
                warp::reply::json(&HealthResponse::new(status, &snapshot.state)),
                code,
            )
        });

    let status_route = warp::path("status")
        .and(with_status)
        .map(|snapshot: SessionSnapshot| warp::reply::json(&snapshot));

    let routes = metrics_route
        .or(health_route)
        .or(liveness_route)
        .or(readiness_route)
        .or(status_route)
        .with(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let (addr, server) = warp::serve(routes).try_bind_with_graceful_shutdown(addr, shutdown)?;

    tracing::info!("Metrics server listening on http://{}", addr);
    server.await;
    tracing::info!("Metrics server stopped");

    Ok(())
}
