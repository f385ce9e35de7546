//! Service wiring and lifecycle.
//!
//! [`Service`] owns the roster and connects intake, the weekly scheduler and
//! the HTTP gateway. The roster lives only in process memory; shutting down
//! discards it.

use crate::artifacts::ArtifactStore;
use crate::channels::{self, GatewayState, Messenger, run_gateway};
use crate::config::{ConfigSeverity, RollcallConfig};
use crate::export::Exporter;
use crate::intake::Intake;
use crate::notify::Notifier;
use crate::reducer::EventReducer;
use crate::roster::RosterStore;
use crate::scheduler::{Scheduler, WeeklySchedule};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A fully wired roster service.
pub struct Service {
    config: RollcallConfig,
    store: Arc<RosterStore>,
    artifacts: ArtifactStore,
    intake: Arc<Intake>,
    scheduler: Scheduler,
}

impl Service {
    /// Validate `config` and wire the service against the LINE API.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RollcallError::Config`] when validation reports any
    /// error-severity issue. Warnings are logged.
    pub fn from_config(config: RollcallConfig) -> crate::Result<Self> {
        let issues = config.validate();
        for issue in &issues {
            match issue.severity {
                ConfigSeverity::Warning => {
                    warn!(id = %issue.id, "{}: {}", issue.title, issue.summary);
                }
                ConfigSeverity::Error => {
                    error!(id = %issue.id, "{}: {}", issue.title, issue.summary);
                }
            }
        }
        if RollcallConfig::has_blocking_issues(&issues) {
            let ids: Vec<&str> = issues
                .iter()
                .filter(|issue| issue.severity == ConfigSeverity::Error)
                .map(|issue| issue.id.as_str())
                .collect();
            return Err(crate::RollcallError::Config(format!(
                "blocking configuration issues: {}",
                ids.join(", ")
            )));
        }

        let messenger = channels::messenger_from_config(&config)?;
        Self::with_messenger(config, messenger)
    }

    /// Wire the service around an explicit messenger. Does not validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the schedule cannot be built from config.
    pub fn with_messenger(
        config: RollcallConfig,
        messenger: Arc<dyn Messenger>,
    ) -> crate::Result<Self> {
        let schedule = WeeklySchedule::from_config(&config.schedule)?;
        let store = Arc::new(RosterStore::new());
        let artifacts = ArtifactStore::new(&config.export.directory);

        let intake = Intake::new(
            Arc::clone(&store),
            Arc::clone(&messenger),
            EventReducer::new(&config.registration),
            schedule.timezone,
        )
        .with_reply_timeout(Duration::from_secs(config.line.request_timeout_secs.max(1)));

        let scheduler = Scheduler::new(
            Arc::clone(&store),
            Exporter::new(&config.export, Arc::clone(&messenger)),
            Notifier::new(&config, messenger, artifacts.clone()),
            artifacts.clone(),
            schedule,
        )
        .with_prune_on_evict(config.export.prune_on_evict);

        Ok(Self {
            config,
            store,
            artifacts,
            intake: Arc::new(intake),
            scheduler,
        })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<RosterStore> {
        &self.store
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn intake(&self) -> &Arc<Intake> {
        &self.intake
    }

    /// State shared with the HTTP routes.
    #[must_use]
    pub fn gateway_state(&self) -> GatewayState {
        GatewayState {
            intake: Arc::clone(&self.intake),
            store: Arc::clone(&self.store),
            artifacts: self.artifacts.clone(),
            scheduler: self.scheduler.status(),
        }
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or the server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` with the scheduler running until `shutdown`
    /// resolves. The scheduler is cancelled between per-key steps and the
    /// remaining roster is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails or the scheduler task panics.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let state = self.gateway_state();
        let store = Arc::clone(&self.store);
        let cancel = CancellationToken::new();
        let scheduler_task = self.scheduler.run(cancel.clone());

        let stop_scheduler = cancel.clone();
        let shutdown = async move {
            shutdown.await;
            info!("shutdown requested");
            stop_scheduler.cancel();
        };

        let served = run_gateway(listener, state, shutdown).await;
        cancel.cancel();
        let joined = scheduler_task.await;

        let discarded = store.len();
        if discarded > 0 {
            warn!(
                entries = discarded,
                participants = store.participant_count(),
                "discarding in-memory roster"
            );
        } else {
            info!("roster empty at shutdown");
        }

        served?;
        joined.map_err(|e| crate::RollcallError::Scheduler(format!("scheduler task failed: {e}")))?;
        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("cannot listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("cannot listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
