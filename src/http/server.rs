//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the relay endpoint
//! - Wire up middleware (request ID, tracing)
//! - Bound in-flight relays, including their body streaming
//! - Hot-swap the relay engine when configuration changes
//! - Bind server to listener and drain on shutdown
//!
//! # Design Decisions
//! - The in-flight permit moves into the relay task, so it is held until the
//!   last body chunk is written, not just until the head is returned

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::http::sink::ChannelSink;
use crate::relay::context::derive_base_url;
use crate::relay::{EngineError, ProxyRequest, RelayEngine, ResponseSink};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ArcSwap<RelayEngine>>,
    pub local_addr: SocketAddr,
    /// One permit per relay operation, `listener.max_in_flight` in total.
    pub in_flight: Arc<Semaphore>,
}

/// HTTP server fronting the relay engine.
pub struct HttpServer {
    config: RelayConfig,
    engine: Arc<ArcSwap<RelayEngine>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self, EngineError> {
        let engine = RelayEngine::from_config(&config)?;
        Ok(Self::with_engine(config, engine))
    }

    /// Create a server around a prebuilt engine.
    pub fn with_engine(config: RelayConfig, engine: RelayEngine) -> Self {
        Self {
            config,
            engine: Arc::new(ArcSwap::from_pointee(engine)),
        }
    }

    fn router(&self, state: AppState) -> Router {
        Router::new()
            .route(&self.config.relay.path, any(relay_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// New configurations arriving on `config_updates` replace the engine
    /// for subsequent requests; in-flight relays finish on the engine they
    /// started with. The route path and listener settings are fixed for the
    /// lifetime of the server.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<RelayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            path = %self.config.relay.path,
            "HTTP server starting"
        );

        tokio::spawn(reload_engine(
            self.engine.clone(),
            self.config.relay.path.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        let state = AppState {
            engine: self.engine.clone(),
            local_addr: addr,
            in_flight: Arc::new(Semaphore::new(self.config.listener.max_in_flight)),
        };
        let app = self.router(state).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight relays");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

async fn reload_engine(
    engine: Arc<ArcSwap<RelayEngine>>,
    path: String,
    mut updates: mpsc::UnboundedReceiver<RelayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let config = tokio::select! {
            update = updates.recv() => match update {
                Some(config) => config,
                None => return,
            },
            _ = shutdown.recv() => return,
        };

        if config.relay.path != path {
            tracing::warn!(
                current = %path,
                requested = %config.relay.path,
                "Relay path changes take effect after a restart"
            );
        }

        match RelayEngine::from_config(&config) {
            Ok(next) => {
                engine.store(Arc::new(next));
                tracing::info!("Relay engine reloaded");
            }
            Err(e) => {
                tracing::error!(error = %e, "Rejected configuration update, keeping current engine");
            }
        }
    }
}

/// Relay endpoint handler.
///
/// The relay runs in its own task and streams into a [`ChannelSink`]; the
/// handler returns as soon as the response head is known.
async fn relay_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<Body>,
) -> Response {
    // Waits while `max_in_flight` relays are running.
    let permit = match state.in_flight.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return (StatusCode::SERVICE_UNAVAILABLE, "Relay is shutting down").into_response(),
    };

    let engine = state.engine.load_full();

    let base_url = match engine.public_url() {
        Some(url) => url.clone(),
        None => match derive_base_url(req.headers(), req.uri(), &state.local_addr.to_string()) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(error = %e, "Cannot derive relay base URL");
                return (StatusCode::BAD_REQUEST, "Invalid Host header").into_response();
            }
        },
    };

    let request = ProxyRequest::from_http(req, Some(peer));
    let (mut sink, pending) = ChannelSink::channel(engine.stream_buffer_chunks());

    tokio::spawn(async move {
        let _permit = permit;
        if let Err(e) = engine.handle(request, base_url, &mut sink).await {
            if sink.is_committed() {
                sink.abort(e.to_string()).await;
            } else {
                sink.reject(&e).await;
            }
        }
    });

    pending.into_response().await
}
