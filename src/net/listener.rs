//! Listener task: accept loop with a start/stop contract.
//!
//! # Responsibilities
//! - Bind the listening socket and report bind failures to the caller
//! - Accept connections and serve each on its own task
//! - Enforce max_connections via semaphore
//! - Stop accepting on request and drain in-flight connections within a deadline

use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower::ServiceExt;

use crate::config::ListenerConfig;
use crate::lifecycle::shutdown::{Shutdown, ShutdownListener};
use crate::net::connection::{ConnectionGuard, ConnectionTracker};

/// Pause after a non-transient accept error before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The accept loop ended without being asked to.
    #[error("accept loop terminated unexpectedly: {0}")]
    AcceptLoop(String),

    /// Connections were still open when the grace period ran out.
    #[error("{remaining} connection(s) still open after {grace:?} grace period")]
    ShutdownTimedOut { grace: Duration, remaining: u64 },

    /// The listener was already stopped.
    #[error("listener already closed")]
    Closed,
}

/// Owns the listening socket and every connection accepted from it.
pub struct ListenerTask {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    accept_loop: Option<JoinHandle<u64>>,
    closed: bool,
}

impl ListenerTask {
    /// Bind `addr` and start accepting in the background.
    ///
    /// Returns once the socket is bound; only binding can fail here.
    pub async fn start(
        addr: SocketAddr,
        config: &ListenerConfig,
        router: Router,
    ) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind { addr, source };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new();
        let accept = AcceptLoop {
            listener,
            router,
            read_timeout: config.read_timeout(),
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            stop: shutdown.subscribe(),
            tracker: tracker.clone(),
        };

        Ok(Self {
            local_addr,
            shutdown,
            tracker,
            accept_loop: Some(tokio::spawn(accept.run())),
            closed: false,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Resolves only if the accept loop dies before [`stop`](Self::stop).
    pub async fn failed(&mut self) -> ListenerError {
        let Some(accept_loop) = self.accept_loop.as_mut() else {
            return std::future::pending().await;
        };

        let error = match accept_loop.await {
            Ok(_) => ListenerError::AcceptLoop("exited before stop was requested".into()),
            Err(e) => ListenerError::AcceptLoop(e.to_string()),
        };
        self.accept_loop = None;
        error
    }

    /// Stop accepting and give open connections `grace` to finish.
    ///
    /// Connections still open at the deadline are abandoned. A second call
    /// returns [`ListenerError::Closed`].
    pub async fn stop(&mut self, grace: Duration) -> Result<(), ListenerError> {
        if self.closed {
            return Err(ListenerError::Closed);
        }
        self.closed = true;

        let deadline = Instant::now() + grace;
        self.shutdown.trigger();

        if let Some(mut accept_loop) = self.accept_loop.take() {
            match tokio::time::timeout_at(deadline, &mut accept_loop).await {
                Ok(Ok(accepted)) => tracing::debug!(accepted, "Accept loop joined"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Accept loop ended abnormally"),
                Err(_) => accept_loop.abort(),
            }
        }

        tracing::info!(
            address = %self.local_addr,
            in_flight = self.tracker.active_count(),
            grace_ms = grace.as_millis() as u64,
            "Listener closed, draining connections"
        );

        match tokio::time::timeout_at(deadline, self.tracker.wait_idle()).await {
            Ok(()) => {
                tracing::debug!("All connections drained");
                Ok(())
            }
            Err(_) => {
                let remaining = self.tracker.active_count();
                tracing::warn!(remaining, "Grace period elapsed with connections still open");
                Err(ListenerError::ShutdownTimedOut { grace, remaining })
            }
        }
    }
}

struct AcceptLoop {
    listener: TcpListener,
    router: Router,
    read_timeout: Duration,
    connection_limit: Arc<Semaphore>,
    stop: ShutdownListener,
    tracker: ConnectionTracker,
}

impl AcceptLoop {
    /// Accept until stopped. Returns how many connections were accepted.
    async fn run(self) -> u64 {
        let AcceptLoop {
            listener,
            router,
            read_timeout,
            connection_limit,
            mut stop,
            tracker,
        } = self;
        let mut accepted_total = 0u64;

        loop {
            // Acquire permit first (backpressure)
            let permit = tokio::select! {
                biased;
                _ = stop.recv() => break,
                permit = Arc::clone(&connection_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, peer_addr) = tokio::select! {
                biased;
                _ = stop.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) if is_connection_error(&e) => continue,
                    Err(e) => {
                        tracing::error!(error = %e, "Accept failed, backing off");
                        tokio::select! {
                            biased;
                            _ = stop.recv() => break,
                            _ = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                        }
                    }
                },
            };

            accepted_total += 1;
            let guard = tracker.track();
            tracing::debug!(
                connection_id = %guard.id(),
                peer_addr = %peer_addr,
                available_permits = connection_limit.available_permits(),
                "Connection accepted"
            );

            tokio::spawn(serve_connection(
                stream,
                router.clone(),
                read_timeout,
                stop.clone(),
                guard,
                permit,
            ));
        }

        tracing::debug!(accepted_total, "Accept loop stopped, listening socket released");
        accepted_total
    }
}

async fn serve_connection(
    stream: TcpStream,
    router: Router,
    read_timeout: Duration,
    mut stop: ShutdownListener,
    guard: ConnectionGuard,
    _permit: OwnedSemaphorePermit,
) {
    let service = service_fn(move |request: Request<Incoming>| router.clone().oneshot(request));

    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new()).header_read_timeout(read_timeout);
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = stop.recv() => {
            tracing::trace!(connection_id = %guard.id(), "Draining connection");
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = result {
        tracing::debug!(connection_id = %guard.id(), error = %e, "Connection ended with error");
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
