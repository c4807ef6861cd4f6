use std::{
    future::Future,
    io,
    net::{SocketAddr, TcpListener},
};

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

mod env;

use env::APP_CONFIG;

use crate::{feed::FeedClient, log};

pub const FETCH_FAILED: &str = "Failed to fetch earthquake data";

#[derive(Clone)]
pub struct AppState {
    feed: FeedClient,
}

/// Body returned to the caller whenever the upstream feed could not be relayed.
#[derive(Debug, Serialize, PartialEq)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorEnvelope {
    pub error: String,
    pub details: String,
}

type RelayResponse = Result<Response, (StatusCode, Json<ErrorEnvelope>)>;

fn upstream_error(err: anyhow::Error) -> (StatusCode, Json<ErrorEnvelope>) {
    let details = format!("{:#}", err);
    error!(details = %details, "failed to fetch earthquake data");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorEnvelope {
            error: FETCH_FAILED.to_string(),
            details,
        }),
    )
}

fn json_passthrough(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn earthquakes(State(state): State<AppState>) -> RelayResponse {
    state
        .feed
        .fetch()
        .await
        .map(json_passthrough)
        .map_err(upstream_error)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

fn router(feed: FeedClient) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any);

    Router::new()
        .route("/healthz", get(health))
        .route("/api/earthquakes", get(earthquakes))
        .with_state(AppState { feed })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// A bound relay. Dropping it, or letting `serve` return, releases the
/// listener and the upstream client.
pub struct RelayServer {
    listener: TcpListener,
    addr: SocketAddr,
    app: Router,
}

impl RelayServer {
    pub fn bind(addr: SocketAddr, feed: FeedClient) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).with_context(|| format!("failed to bind {}", addr))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        info!(upstream = %feed.url(), "relay initialized");

        Ok(Self {
            listener,
            addr,
            app: router(feed),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves until `shutdown` resolves, then waits for in-flight requests.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("listening on {}", self.addr);

        axum::Server::from_tcp(self.listener)?
            .serve(self.app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .context("relay server failed")?;

        info!("relay server stopped");
        Ok(())
    }
}

/// Resolves with the name of whichever signal arrives first. A listener that
/// fails to install never resolves.
async fn first_signal<C, T>(ctrl_c: C, terminate: T) -> &'static str
where
    C: Future<Output = io::Result<()>>,
    T: Future<Output = io::Result<()>>,
{
    let ctrl_c = async {
        match ctrl_c.await {
            Ok(()) => "SIGINT",
            Err(err) => {
                error!("failed to listen for ctrl-c: {}", err);
                std::future::pending().await
            }
        }
    };
    let terminate = async {
        match terminate.await {
            Ok(()) => "SIGTERM",
            Err(err) => {
                error!("failed to listen for SIGTERM: {}", err);
                std::future::pending().await
            }
        }
    };

    tokio::select! {
        signal = ctrl_c => signal,
        signal = terminate => signal,
    }
}

#[cfg(unix)]
async fn terminate() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> io::Result<()> {
    std::future::pending().await
}

async fn shutdown_signal() {
    let signal = first_signal(tokio::signal::ctrl_c(), terminate()).await;
    info!(signal, "received shutdown signal, draining in-flight requests");
}

pub async fn start_server() -> Result<()> {
    log::init();

    let addr = SocketAddr::from(([0, 0, 0, 0], APP_CONFIG.port));

    let server = RelayServer::bind(addr, FeedClient::usgs()?)?;
    server.serve(shutdown_signal()).await
}
