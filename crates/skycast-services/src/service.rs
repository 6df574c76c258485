//! Async session runner.
//!
//! Owns a [`SessionController`] on a single task. Commands arrive over an
//! mpsc channel, fetches run as spawned tasks that report back with
//! [`FetchDone`], and every accepted transition is published on a
//! `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use skycast_weather::{CurrentConditions, FetchError, WeatherSource};

use crate::session::{Applied, CityChange, FetchTicket, SessionController, SessionView};
use crate::store::{KeyValueStore, KeyValueStoreExt, CITY_KEY, DEFAULT_CITY};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Session service has stopped")]
    Closed,
}

#[derive(Debug)]
enum SessionCommand {
    SetCity(String),
    Refresh,
}

/// Sent by a fetch task when its request completes
#[derive(Debug)]
struct FetchDone {
    ticket: FetchTicket,
    result: Result<CurrentConditions, FetchError>,
}

pub struct SessionService<S> {
    controller: SessionController,
    source: Arc<S>,
    store: Option<Arc<dyn KeyValueStore>>,
    writer: Option<CityWriter>,
    refresh_interval: Option<Duration>,
}

impl<S: WeatherSource + 'static> SessionService<S> {
    pub fn new(controller: SessionController, source: Arc<S>) -> Self {
        Self {
            controller,
            source,
            store: None,
            writer: None,
            refresh_interval: None,
        }
    }

    /// Restore the last city on start and persist every new one.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Refresh the current city periodically. A zero duration disables it.
    pub fn with_refresh_interval(mut self, every: Duration) -> Self {
        self.refresh_interval = (!every.is_zero()).then_some(every);
        self
    }

    /// Start the session loop on the current tokio runtime.
    pub fn spawn(self) -> SessionHandle {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (view_tx, views) = watch::channel(self.controller.view());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(self.run(command_rx, view_tx, shutdown.clone()));

        SessionHandle {
            commands,
            views,
            shutdown,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        views: watch::Sender<SessionView>,
        shutdown: CancellationToken,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<FetchDone>();

        if let Some(store) = self.store.clone() {
            self.writer = Some(CityWriter::spawn(Arc::clone(&store)));
            let city = tokio::task::spawn_blocking(move || {
                store.load_or(CITY_KEY, DEFAULT_CITY.to_string())
            })
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to read saved city: {}", e);
                DEFAULT_CITY.to_string()
            });
            tracing::info!("Restoring last city: {}", city);
            self.set_city(&city, &done_tx);
            views.send_replace(self.controller.view());
        }

        let mut ticker = self.refresh_interval.map(|every| {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            // Queued commands go before queued results so a city change
            // supersedes any fetch that finished meanwhile
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                command = commands.recv() => {
                    let changed = match command {
                        Some(SessionCommand::SetCity(city)) => self.set_city(&city, &done_tx),
                        Some(SessionCommand::Refresh) => self.refresh(&done_tx),
                        None => break,
                    };
                    if changed {
                        views.send_replace(self.controller.view());
                    }
                }
                Some(done) = done_rx.recv() => {
                    if self.controller.apply(&done.ticket, done.result) == Applied::Accepted {
                        views.send_replace(self.controller.view());
                    }
                }
                _ = next_tick(&mut ticker) => {
                    if self.refresh(&done_tx) {
                        views.send_replace(self.controller.view());
                    }
                }
            }
        }

        self.controller.shutdown();
        if let Some(writer) = self.writer.take() {
            writer.close().await;
        }
        tracing::info!("Session service stopped");
    }

    /// Returns true if the session changed
    fn set_city(&mut self, city: &str, done: &mpsc::UnboundedSender<FetchDone>) -> bool {
        match self.controller.set_city(city) {
            CityChange::Unchanged => false,
            CityChange::Rejected => true,
            CityChange::Fetch(ticket) => {
                self.persist_city(ticket.city());
                self.dispatch(ticket, done);
                true
            }
        }
    }

    fn refresh(&mut self, done: &mpsc::UnboundedSender<FetchDone>) -> bool {
        match self.controller.refresh() {
            Some(ticket) => {
                self.dispatch(ticket, done);
                true
            }
            None => {
                tracing::debug!("Refresh skipped in state {}", self.controller.state());
                false
            }
        }
    }

    fn persist_city(&self, city: &str) {
        if let Some(writer) = &self.writer {
            writer.save(city);
        }
    }

    fn dispatch(&self, ticket: FetchTicket, done: &mpsc::UnboundedSender<FetchDone>) {
        let source = Arc::clone(&self.source);
        let done = done.clone();
        tokio::spawn(async move {
            let result = source.fetch(ticket.city(), ticket.cancel_token()).await;
            // Receiver is gone once the service stops
            let _ = done.send(FetchDone { ticket, result });
        });
    }
}

/// Saves the newest city off the session task. Writes run one at a time
/// on the blocking pool and intermediate cities are skipped.
struct CityWriter {
    latest: watch::Sender<Option<String>>,
    task: JoinHandle<()>,
}

impl CityWriter {
    fn spawn(store: Arc<dyn KeyValueStore>) -> Self {
        let (latest, mut rx) = watch::channel::<Option<String>>(None);
        let task = tokio::spawn(async move {
            // Still yields the last unseen value after the sender closes
            while rx.changed().await.is_ok() {
                let Some(city) = rx.borrow_and_update().clone() else {
                    continue;
                };
                let store = Arc::clone(&store);
                match tokio::task::spawn_blocking(move || store.save(CITY_KEY, &city)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!("Failed to save city: {}", e),
                    Err(e) => tracing::warn!("City write task failed: {}", e),
                }
            }
        });
        Self { latest, task }
    }

    fn save(&self, city: &str) {
        self.latest.send_replace(Some(city.to_string()));
    }

    /// Flush the pending write and stop.
    async fn close(self) {
        drop(self.latest);
        if let Err(e) = self.task.await {
            tracing::warn!("City writer ended abnormally: {}", e);
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Cloneable handle to a running [`SessionService`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    views: watch::Receiver<SessionView>,
    shutdown: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionHandle {
    /// Request a new session for `city`.
    ///
    /// # Errors
    /// [`ServiceError::Closed`] if the service has stopped.
    pub fn set_city(&self, city: impl Into<String>) -> Result<(), ServiceError> {
        self.commands
            .send(SessionCommand::SetCity(city.into()))
            .map_err(|_| ServiceError::Closed)
    }

    /// Fetch the current city again.
    ///
    /// # Errors
    /// [`ServiceError::Closed`] if the service has stopped.
    pub fn refresh(&self) -> Result<(), ServiceError> {
        self.commands
            .send(SessionCommand::Refresh)
            .map_err(|_| ServiceError::Closed)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.views.clone()
    }

    /// Latest published view
    pub fn view(&self) -> SessionView {
        self.views.borrow().clone()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Session task ended abnormally: {}", e);
            }
        }
    }
}
