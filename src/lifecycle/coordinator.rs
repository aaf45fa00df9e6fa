//! Lifecycle coordinator: startup, serving, and bounded shutdown.
//!
//! # Responsibilities
//! - Construct the route table, registries and template set
//! - Persist the auth token before the listener binds
//! - Run the listener until a termination signal or a listener failure
//! - Drain within the grace period and report the final outcome
//!
//! # Design Decisions
//! - Fail fast: every startup error is fatal and returned, never retried
//! - The coordinator never exits the process; the binary maps errors to exit codes
//! - A listener that reports "already closed" at stop counts as a clean stop

use axum::Router;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::credentials::{CredentialError, CredentialSink, CredentialStore};
use crate::http::{apply_layers, build_routes, AppState, TemplateSet};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{self, TerminationSignals};
use crate::lifecycle::state::{LifecycleState, StateCell};
use crate::net::{ListenerError, ListenerTask};
use crate::registry::{IdRegistry, Mailboxes};

/// Fatal conditions that end a server run.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build template set: {0}")]
    Templates(#[source] minijinja::Error),

    #[error("failed to persist auth token: {0}")]
    CredentialWriteFailed(#[from] CredentialError),

    #[error("failed to start listener: {0}")]
    ListenerBindFailed(#[source] ListenerError),

    #[error("listener failed while serving: {0}")]
    ListenerFailed(#[source] ListenerError),

    #[error("failed to install termination signal handlers: {0}")]
    SignalHandler(#[source] std::io::Error),

    #[error("shutdown timed out after {grace:?} with {remaining} connection(s) still open")]
    ShutdownTimedOut { grace: Duration, remaining: u64 },

    #[error("failed to stop listener: {0}")]
    Shutdown(#[source] ListenerError),
}

/// Owns a server run from construction to the final stop.
pub struct Coordinator {
    config: ServerConfig,
    routes: Router,
    mailboxes: Mailboxes,
    ids: IdRegistry,
    credentials: Arc<dyn CredentialSink>,
    shutdown: Shutdown,
    state: StateCell,
}

impl Coordinator {
    /// Build every collaborator the server needs.
    ///
    /// Fails only if the template set cannot be compiled.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let templates = TemplateSet::new().map_err(ServerError::Templates)?;
        let state = StateCell::new();
        let mailboxes = Mailboxes::new();
        let ids = IdRegistry::new();

        let routes = build_routes(AppState {
            version: config.version,
            mailboxes: mailboxes.clone(),
            ids: ids.clone(),
            templates: Arc::new(templates),
            lifecycle: state.subscribe(),
            started_at: Instant::now(),
        });
        let credentials = Arc::new(CredentialStore::new(&config.credentials.directory));

        Ok(Self {
            config,
            routes,
            mailboxes,
            ids,
            credentials,
            shutdown: Shutdown::new(),
            state,
        })
    }

    /// Replace where the auth token is persisted.
    pub fn with_credential_sink(mut self, sink: impl CredentialSink + 'static) -> Self {
        self.credentials = Arc::new(sink);
        self
    }

    /// Add routes to the table. Only possible before [`run`](Self::run).
    pub fn merge_routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// Handle that requests shutdown exactly like a termination signal.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn mailboxes(&self) -> &Mailboxes {
        &self.mailboxes
    }

    pub fn ids(&self) -> &IdRegistry {
        &self.ids
    }

    /// Serve until shutdown is requested, then drain and stop.
    pub async fn run(self) -> Result<(), ServerError> {
        let result = self.serve().await;

        match &result {
            Ok(()) => tracing::info!("Rendezvous server stopped successfully"),
            Err(e) => {
                self.state.advance(LifecycleState::Aborted);
                tracing::error!(error = %e, "Rendezvous server aborted");
            }
        }
        result
    }

    async fn serve(&self) -> Result<(), ServerError> {
        let token = self.config.auth_token();
        if let Some(token) = token {
            let record = self.credentials.save(token)?;
            tracing::info!(path = %record.path.display(), "Auth token written");
        }

        // Installed before binding: once the port accepts, signals are handled.
        let signals = TerminationSignals::install().map_err(ServerError::SignalHandler)?;

        let router = apply_layers(self.routes.clone(), &self.config.listener);
        let mut listener =
            ListenerTask::start(self.config.socket_addr(), &self.config.listener, router)
                .await
                .map_err(ServerError::ListenerBindFailed)?;
        let watcher = signals::spawn_watcher(signals, self.shutdown.clone());

        self.state.advance(LifecycleState::Serving);
        tracing::info!(
            version = %self.config.version,
            address = %listener.local_addr(),
            auth_token = token.is_some(),
            "Serving rendezvous server"
        );

        let mut stop = self.shutdown.subscribe();
        let outcome = tokio::select! {
            _ = stop.recv() => Ok(()),
            error = listener.failed() => Err(ServerError::ListenerFailed(error)),
        };
        watcher.abort();
        outcome?;

        self.state.advance(LifecycleState::ShuttingDown);
        let grace = self.config.grace_period();
        tracing::info!(grace_ms = grace.as_millis() as u64, "Rendezvous server is shutting down");

        match listener.stop(grace).await {
            Ok(()) | Err(ListenerError::Closed) => {}
            Err(ListenerError::ShutdownTimedOut { grace, remaining }) => {
                return Err(ServerError::ShutdownTimedOut { grace, remaining });
            }
            Err(other) => return Err(ServerError::Shutdown(other)),
        }

        self.state.advance(LifecycleState::Stopped);
        Ok(())
    }
}
