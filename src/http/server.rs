//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the capture and management routers
//! - Wire up middleware (tracing, request ID, CORS header)
//! - Restore history and start the broadcast hub before serving
//! - Serve both listeners until shutdown, then drain the hub

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::broadcast::{BroadcastHub, HubHandle};
use crate::capture::{CapturePipeline, FsBlobStore, RequestNormalizer};
use crate::config::CatcherConfig;
use crate::http::capture::{capture_request, count_requests, serve_blob};
use crate::http::management::{stream_requests, view_requests};
use crate::lifecycle::{self, Shutdown, ShutdownSignal, StartupError};
use crate::storage::{FsRecordStore, HistoryCache};

/// State for the capture listener.
#[derive(Clone)]
pub struct CaptureState {
    pub pipeline: Arc<CapturePipeline>,
    pub history: HistoryCache,
    pub blobs: ServeDir,
}

/// State for the management listener.
#[derive(Clone)]
pub struct ManagementState {
    pub history: HistoryCache,
    pub hub: HubHandle,
    pub shutdown: ShutdownSignal,
    pub keep_alive_secs: u64,
}

/// Both listeners plus the hub task they share.
pub struct HttpServer {
    capture: Router,
    management: Router,
    history: HistoryCache,
    hub: HubHandle,
    hub_task: JoinHandle<()>,
    shutdown: ShutdownSignal,
}

impl HttpServer {
    /// Prepare storage, restore history and start the hub.
    ///
    /// Fails only when the storage directories are unusable.
    pub async fn new(config: CatcherConfig, shutdown: &Shutdown) -> Result<Self, StartupError> {
        let records = Arc::new(FsRecordStore::new(&config.storage.records_dir));
        let history = lifecycle::prepare(&config.storage, &*records).await?;

        let (hub, hub_task) = BroadcastHub::spawn(&config.broadcast);

        let blobs = Arc::new(FsBlobStore::new(&config.storage.blobs_dir));
        let normalizer = RequestNormalizer::new(&config.capture, blobs);
        let pipeline = Arc::new(CapturePipeline::new(
            normalizer,
            records,
            history.clone(),
            hub.clone(),
        ));

        let capture = Self::capture_router(CaptureState {
            pipeline,
            history: history.clone(),
            blobs: ServeDir::new(&config.storage.blobs_dir),
        });
        let management = Self::management_router(ManagementState {
            history: history.clone(),
            hub: hub.clone(),
            shutdown: shutdown.subscribe(),
            keep_alive_secs: config.management.keep_alive_secs,
        });

        Ok(Self {
            capture,
            management,
            history,
            hub,
            hub_task,
            shutdown: shutdown.subscribe(),
        })
    }

    /// Catch-all capture, counter and static blobs.
    ///
    /// Only GET and HEAD reach the blob directory; any other method on
    /// `/static/*` is captured like every other path.
    fn capture_router(state: CaptureState) -> Router {
        Router::new()
            .route("/requests", any(count_requests))
            .route("/static/{*path}", get(serve_blob).fallback(capture_request))
            .fallback(capture_request)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// History pages and live stream.
    fn management_router(state: ManagementState) -> Router {
        Router::new()
            .route("/view-requests", get(view_requests))
            .route("/sse", get(stream_requests))
            .with_state(state)
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Shared history, for callers that embed the server.
    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    /// Handle to the running hub.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Serve both listeners until shutdown is signalled.
    ///
    /// Once neither listener can produce captures, the hub is closed and
    /// awaited so queued records are relayed before returning.
    pub async fn run(
        self,
        capture_listener: TcpListener,
        management_listener: TcpListener,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            capture = %capture_listener.local_addr()?,
            management = %management_listener.local_addr()?,
            "HTTP servers starting"
        );

        let capture = axum::serve(
            capture_listener,
            self.capture
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(self.shutdown.clone().wait());
        let management = axum::serve(management_listener, self.management.into_make_service())
            .with_graceful_shutdown(self.shutdown.clone().wait());

        let (capture_result, management_result) =
            tokio::join!(capture.into_future(), management.into_future());
        tracing::info!("HTTP servers stopped");

        self.hub.close();
        if let Err(e) = self.hub_task.await {
            tracing::error!(error = %e, "Broadcast hub task failed");
        }

        capture_result?;
        management_result?;
        Ok(())
    }
}
