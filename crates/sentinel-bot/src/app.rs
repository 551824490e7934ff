//! Application runner.
//!
//! Startup order: store, registry bootstrap, feed connection, subscription
//! synchronizer, trigger pipeline, HTTP API. A store that cannot be opened is
//! fatal; everything after that runs until shutdown.

use crate::config::{AppConfig, NotifyBackend, StoreBackend};
use crate::error::AppResult;
use sentinel_api::AppState;
use sentinel_notify::{LogNotifier, Notifier, RelayNotifier, SmtpNotifier};
use sentinel_registry::{AlertBook, AlertRegistry};
use sentinel_store::{AlertStore, JournalStore, MemoryStore};
use sentinel_trigger::TriggerPipeline;
use sentinel_ws::{ConnectionConfig, ConnectionManager, SubscriptionSynchronizer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Token that stops the application when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn open_store(&self) -> AppResult<Arc<dyn AlertStore>> {
        let store: Arc<dyn AlertStore> = match self.config.store.backend {
            StoreBackend::Journal => {
                let store = JournalStore::open(&self.config.store.path)?;
                info!(path = %store.path().display(), "Opened alert journal");
                Arc::new(store)
            }
            StoreBackend::Memory => {
                warn!("Using in-memory alert store, alerts will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(store)
    }

    fn build_notifier(&self) -> AppResult<Arc<dyn Notifier>> {
        let notify = &self.config.notify;
        let notifier: Arc<dyn Notifier> = match notify.backend {
            NotifyBackend::Log => Arc::new(LogNotifier::new(notify.sender.clone())),
            NotifyBackend::Relay => {
                let relay = notify.relay_config();
                if relay.api_key.is_none() {
                    warn!("Mail relay API key not set, requests will be unauthenticated");
                }
                Arc::new(RelayNotifier::new(relay)?)
            }
            NotifyBackend::Smtp => {
                let smtp = notify.smtp_config();
                if smtp.username.is_none() || smtp.password.is_none() {
                    warn!("SMTP credentials not set, submitting without authentication");
                }
                Arc::new(SmtpNotifier::new(smtp)?)
            }
        };
        info!(backend = notifier.name(), "Notifier configured");
        Ok(notifier)
    }

    /// Start every component and return handles to the running system.
    pub async fn start(&self) -> AppResult<RunningApp> {
        let store = self.open_store()?;
        let book = AlertBook::new(store, Arc::new(AlertRegistry::new()));
        let restored = book.bootstrap()?;
        info!(alerts = restored, "Alert registry bootstrapped");

        let notifier = self.build_notifier()?;
        let mut handles = Vec::new();

        let (tick_tx, tick_rx) = mpsc::channel(self.config.feed.tick_channel_capacity);
        let ws_config: ConnectionConfig = self.config.feed.clone().into();
        let manager = Arc::new(ConnectionManager::new(ws_config, tick_tx));

        let manager_clone = manager.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = manager_clone.connect().await {
                error!(?e, "Feed connection failed");
            }
        }));

        let synchronizer = SubscriptionSynchronizer::new(
            book.registry().clone(),
            manager.write_handle(),
            manager.sessions(),
            self.config.sync.interval(),
        );
        handles.push(tokio::spawn(synchronizer.run(self.shutdown.clone())));

        let pipeline = TriggerPipeline::new(
            book.clone(),
            notifier,
            self.config.trigger.semantics,
        );
        handles.push(tokio::spawn(pipeline.run(tick_rx, self.shutdown.clone())));

        if self.config.api.enabled {
            let state = AppState::new(book.clone(), manager.state_handle());
            let api_config = self.config.api.clone();
            let shutdown = self.shutdown.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = sentinel_api::run_server(state, api_config, shutdown).await {
                    error!(?e, "Alert API server failed");
                }
            }));
        } else {
            info!("Alert API disabled");
        }

        info!("price-sentinel started");

        Ok(RunningApp {
            book,
            manager,
            shutdown: self.shutdown.clone(),
            handles,
        })
    }

    /// Run until Ctrl+C or the shutdown token is cancelled.
    pub async fn run(self) -> AppResult<()> {
        let running = self.start().await?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received shutdown signal"),
                    Err(e) => error!(?e, "Failed to listen for shutdown signal"),
                }
            }
            () = self.shutdown.cancelled() => {
                info!("Shutdown requested");
            }
        }

        running.stop().await;
        Ok(())
    }
}

/// Handles to a started application.
pub struct RunningApp {
    book: AlertBook,
    manager: Arc<ConnectionManager>,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl RunningApp {
    pub fn book(&self) -> &AlertBook {
        &self.book
    }

    pub fn feed(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Stop all tasks and wait for them to finish.
    pub async fn stop(self) {
        info!("Shutting down");
        self.shutdown.cancel();
        self.manager.shutdown();

        for handle in self.handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(?e, "Task ended abnormally");
                }
            }
        }
        info!("Shutdown complete");
    }
}
