//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! The server stops on SIGTERM, Ctrl-C, or a [`Signal`] from the app's
//! [`ShutdownReceiver`] (a handler returned
//! [`Error::Shutdown`](crate::Error::Shutdown)). It then:
//!
//! 1. Stops accepting connections.
//! 2. Tells every open connection to finish its in-flight request and close
//!    (HTTP/1.1 keep-alive ends, HTTP/2 sends GOAWAY).
//! 3. Waits up to `shutdown_timeout` for those connections to drain.
//! 4. Cancels the [`Context`](crate::Context) of every request still running
//!    and aborts what is left.
//!
//! Under Kubernetes, keep `terminationGracePeriodSeconds` above
//! `shutdown_timeout`.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::shutdown::{self, ShutdownReceiver, Signal};

enum Bind {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
    shutdown_timeout: Duration,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    pub fn bind(addr: SocketAddr) -> Self {
        Self { bind: Bind::Addr(addr), shutdown_timeout: ServerConfig::default().shutdown_timeout }
    }

    /// Serves on a listener that is already bound.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self {
            bind: Bind::Listener(listener),
            shutdown_timeout: ServerConfig::default().shutdown_timeout,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::bind(config.addr).shutdown_timeout(config.shutdown_timeout)
    }

    /// How long in-flight requests get to finish once shutdown starts.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Accepts connections and dispatches their requests through `app`.
    ///
    /// Returns the reason for stopping, only after a full graceful shutdown.
    pub async fn serve(self, app: App, mut signals: ShutdownReceiver) -> Result<Signal, ServerError> {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr).await?,
            Bind::Listener(listener) => listener,
        };
        let addr = listener.local_addr()?;

        let app = Arc::new(app);
        // `draining` asks connections to wrap up; `abort` cancels requests.
        let draining = CancellationToken::new();
        let abort = CancellationToken::new();

        info!(%addr, "taproom listening");

        let mut tasks = JoinSet::new();

        let os_signal = shutdown::os_signal();
        tokio::pin!(os_signal);

        let signal = loop {
            tokio::select! {
                // Check shutdown sources first so a signal immediately stops
                // accepting, even if more connections are queued.
                biased;

                signal = &mut os_signal => break signal,

                Some(signal) = signals.recv() => break signal,

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let draining = draining.clone();
                    let abort = abort.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            let abort = abort.clone();
                            async move {
                                Ok::<_, Infallible>(app.dispatch(req, Some(remote_addr), &abort).await)
                            }
                        });

                        let builder = ConnBuilder::new(TokioExecutor::new());
                        let conn = builder.serve_connection(io, svc);
                        tokio::pin!(conn);

                        let result = tokio::select! {
                            res = conn.as_mut() => res,
                            () = draining.cancelled() => {
                                conn.as_mut().graceful_shutdown();
                                conn.as_mut().await
                            }
                        };
                        if let Err(e) = result {
                            debug!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        };

        info!(?signal, in_flight = tasks.len(), "shutdown started, draining connections");
        drop(listener);
        draining.cancel();

        let drain = async { while tasks.join_next().await.is_some() {} };
        if tokio::time::timeout(self.shutdown_timeout, drain).await.is_err() {
            warn!(
                remaining = tasks.len(),
                timeout = ?self.shutdown_timeout,
                "grace period elapsed, cancelling in-flight requests"
            );
            abort.cancel();
            tasks.shutdown().await;
        }

        info!("taproom stopped");
        Ok(signal)
    }
}
