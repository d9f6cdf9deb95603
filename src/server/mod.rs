//! HTTP surface for the stream relay.
//!
//! The server owns a [`StreamRecorder`] and shares it with all request
//! handlers via axum state. Endpoints:
//!
//! | Method | Path            | Description                                |
//! |--------|-----------------|--------------------------------------------|
//! | POST   | `/upload-chunk` | Append one raw PCM chunk to the container  |
//! | GET    | `/stream`       | Read the growing WAV (full or byte range)  |
//! | POST   | `/reset-stream` | Retire the container, start fresh          |
//! | GET    | `/health`       | Liveness probe                             |

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::{Result, WavecastError};
use crate::recorder::StreamRecorder;
use crate::store::FileStore;

mod handlers;

/// Configuration for the relay server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Network interface to bind to (e.g. "127.0.0.1" or "0.0.0.0").
    pub host: String,
    /// TCP port for the HTTP server.
    pub port: u16,
    /// Location of the single container file. Stable for the process
    /// lifetime; removed at startup, reset and shutdown.
    pub container_path: PathBuf,
    /// Upper bound on one uploaded chunk; oversize bodies are rejected
    /// before the handler runs.
    pub max_chunk_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            container_path: std::env::temp_dir().join("wavecast-stream.wav"),
            max_chunk_bytes: 8 * 1024 * 1024,
        }
    }
}

/// The relay HTTP server.
pub struct WavecastServer {
    config: ServerConfig,
    recorder: Arc<StreamRecorder>,
}

impl WavecastServer {
    /// Creates a server with a file-backed container at the configured
    /// path. Any stale container from a previous run is removed.
    pub async fn new(config: ServerConfig) -> Self {
        let store = Arc::new(FileStore::new(&config.container_path));
        let recorder = Arc::new(StreamRecorder::new(store).await);
        Self { config, recorder }
    }

    /// Creates a server around an existing recorder. Useful for tests that
    /// want direct access to the recorder alongside HTTP access.
    pub fn from_recorder(recorder: Arc<StreamRecorder>, host: String, port: u16) -> Self {
        Self {
            config: ServerConfig {
                host,
                port,
                ..ServerConfig::default()
            },
            recorder,
        }
    }

    /// Returns the shared recorder.
    pub fn recorder(&self) -> Arc<StreamRecorder> {
        self.recorder.clone()
    }

    /// Returns the server's bind address as "host:port".
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    fn create_router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/upload-chunk",
                post(handlers::upload_chunk).layer(DefaultBodyLimit::max(self.config.max_chunk_bytes)),
            )
            .route("/stream", get(handlers::get_stream))
            .route("/reset-stream", post(handlers::reset_stream))
            .layer(CorsLayer::very_permissive())
            .with_state(self.recorder.clone())
    }

    /// Runs the server until a termination signal arrives, then deletes the
    /// container before returning.
    pub async fn run(&self) -> Result<()> {
        self.serve(shutdown_signal()).await
    }

    /// Runs the server until a shutdown message is received on the provided
    /// channel. Useful for tests that need programmatic lifecycle control.
    pub async fn run_until_stopped(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.serve(async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    async fn serve(&self, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr: SocketAddr = self
            .addr()
            .parse()
            .map_err(|e| WavecastError::Internal(format!("Failed to parse address: {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| WavecastError::Internal(format!("Failed to bind to {addr}: {e}")))?;

        info!("Stream relay listening on {}", addr);

        let router = self.create_router();

        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| WavecastError::Internal(format!("Server error: {e}")))?;

        // Graceful shutdown contract: stop accepting connections, then
        // remove the ephemeral container.
        self.recorder.reset().await;
        info!("Shut down, container removed");
        Ok(())
    }
}

/// Resolves when the process receives ctrl-c or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("Failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// A server running on a random local port with a temporary container,
/// shut down automatically when dropped. For integration tests.
pub struct TestServer {
    endpoint: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    recorder: Arc<StreamRecorder>,
}

impl TestServer {
    /// Starts a test server with a fresh temporary container file.
    pub async fn start() -> Self {
        let store = Arc::new(FileStore::temporary().expect("Failed to create temporary store"));
        let recorder = Arc::new(StreamRecorder::new(store).await);
        Self::start_with_recorder(recorder).await
    }

    /// Starts a test server around an existing recorder.
    pub async fn start_with_recorder(recorder: Arc<StreamRecorder>) -> Self {
        let port = Self::find_available_port();
        let host = "127.0.0.1".to_string();
        let endpoint = format!("http://{host}:{port}");

        let server = WavecastServer::from_recorder(recorder.clone(), host, port);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let _ = server.run_until_stopped(shutdown_rx).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            endpoint,
            shutdown_tx: Some(shutdown_tx),
            recorder,
        }
    }

    /// The HTTP endpoint URL (e.g. "http://127.0.0.1:12345").
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The recorder behind the server, for direct state assertions.
    pub fn recorder(&self) -> Arc<StreamRecorder> {
        self.recorder.clone()
    }

    fn find_available_port() -> u16 {
        StdTcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
