use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info};

use pipeline_rtmp_publish::{
    frame_channel, serve_metrics, session_event_channel, Config, GStreamerMediaPipeline,
    GStreamerRtmpTransport, PrometheusReporter, PublishSession, SessionPorts, SessionRunner,
    TokioRetryScheduler, TracingObserver,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();
    config.validate()?;

    // Initialize logging
    let filter = if config.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Initialize GStreamer (infrastructure concern)
    gstreamer::init()?;

    // Initialize metrics
    PrometheusReporter::init_metrics()?;

    info!("Starting RTMP publish pipeline");
    info!(
        "  Publish target: {}",
        config.publish_url.as_deref().unwrap_or("(none, preview only)")
    );
    info!(
        "  Video: {}x{} @ {} bps",
        config.width, config.height, config.bitrate
    );
    info!("  Resume policy: {}", config.resume_policy);
    info!("  Metrics port: {}", config.metrics_port);

    // Convert CLI config to domain config
    let session_config = config.to_session_config()?;

    let (event_tx, event_rx) = session_event_channel();
    let (frame_tx, frame_rx) = frame_channel();

    // Create infrastructure implementations (dependency injection)
    let ports = SessionPorts {
        media: Box::new(GStreamerMediaPipeline::new(
            config.to_capture_settings(),
            *session_config.video(),
            frame_tx,
        )),
        transport: Box::new(GStreamerRtmpTransport::new(event_tx.clone())),
        scheduler: Box::new(TokioRetryScheduler::new(event_tx.clone())),
        observer: Arc::new(TracingObserver::new()),
        metrics: Arc::new(PrometheusReporter::new()),
    };

    // Create application service
    let session = PublishSession::new(ports, session_config);
    let (runner, handle) = SessionRunner::new(session, event_tx, event_rx, frame_rx);
    let runner_task = tokio::spawn(runner.run());

    // Start metrics server
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let metrics_server = tokio::spawn(serve_metrics(
        config.metrics_port,
        handle.subscribe(),
        async {
            shutdown_rx.await.ok();
        },
    ));

    // The process owns its capture surface for its whole lifetime
    handle.surface_created()?;

    if let Some(url) = &config.publish_url {
        if let Err(e) = handle.request_publish(url.as_str()).await {
            error!("Publish request rejected: {}", e);
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    handle.stop().await?;
    handle.shutdown().await?;
    drop(handle);

    let session = runner_task.await?;
    info!(
        session_id = %session.id(),
        transitions = session.lifecycle().transition_count(),
        "Publish session finished"
    );
    drop(session);

    // Signal shutdown to metrics server
    let _ = shutdown_tx.send(());

    // Wait for metrics server to shut down
    if let Err(e) = metrics_server.await? {
        error!("Metrics server error: {}", e);
    }

    info!("Pipeline shutdown complete");
    Ok(())
}
