//! Server startup, binding and graceful shutdown
//!
//! [`Server::run`] binds the configured address, starts the scheduler and
//! serves until Ctrl-C (or SIGTERM on unix). On shutdown every subscriber is
//! dropped so WebSocket connections close, in-flight requests get
//! `shutdown_timeout_secs` to finish, and the scheduler is aborted.

use std::future::{Future, IntoFuture};
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::routes::{self, AppState};
use crate::scheduler::Scheduler;

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Server instance that can be started
pub struct Server {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Store and hub shared by the router and the scheduler
    state: AppState,
    /// The built router
    router: Router,
}

impl Server {
    /// Create a new server instance with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let config = Arc::new(config);
        let state = AppState::new(Arc::clone(&config));
        let router = routes::build_router(state.clone());

        Self {
            config,
            state,
            router,
        }
    }

    /// Address the server will bind to, as `host:port`
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared state, for driving the store or hub from outside the router
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Bind the configured address and serve until a shutdown signal
    pub async fn run(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.socket_addr()).await?;
        self.run_with_listener(listener).await
    }

    /// Serve on an already bound listener until a shutdown signal
    pub async fn run_with_listener(self, listener: TcpListener) -> std::io::Result<()> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves
    ///
    /// The scheduler runs for exactly as long as this future; dropping it
    /// aborts the scheduler too.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!("Server listening on {}", addr);

        // Stops with this future, whether it completes or is dropped.
        let _scheduler = AbortOnDrop(
            Scheduler::from_config(
                &self.config,
                Arc::clone(&self.state.store),
                Arc::clone(&self.state.hub),
            )
            .spawn(),
        );

        let hub = Arc::clone(&self.state.hub);
        let (draining_tx, draining_rx) = oneshot::channel::<()>();
        let graceful = async move {
            shutdown.await;
            info!("Shutdown signal received, closing subscribers");
            hub.close_all();
            let _ = draining_tx.send(());
        };

        let timeout = self.config.shutdown_timeout();
        let drain_deadline = async move {
            match draining_rx.await {
                Ok(()) => tokio::time::sleep(timeout).await,
                Err(_) => std::future::pending::<()>().await,
            }
        };

        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(graceful)
            .into_future();

        let result = tokio::select! {
            result = serve => result,
            _ = drain_deadline => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "Shutdown timeout elapsed, dropping open connections"
                );
                Ok(())
            }
        };

        info!("Server stopped");
        result
    }

    /// Bind port 0, serve in the background and return the bound address
    #[cfg(test)]
    pub async fn spawn_test_server(
        config: ServerConfig,
    ) -> (std::net::SocketAddr, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Self::new(config);
        let handle = tokio::spawn(async move {
            server
                .run_until(listener, std::future::pending())
                .await
                .ok();
        });

        (addr, handle)
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
