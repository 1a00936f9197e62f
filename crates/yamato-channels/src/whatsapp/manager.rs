//! The connection manager actor.
//!
//! Owns the [`Machine`], the live session and every timer, and executes the
//! machine's effects. Lifecycle events, timer firings, probe failures and
//! restart requests all funnel into one task, so the machine only ever sees
//! one input at a time.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use yamato_core::{
    config::ConnectionConfig,
    message::InboundMessage,
    session::{EventSink, SessionEvent, TaggedEvent, UpsertKind},
    traits::{Connector, Session},
};

use super::backoff::ReconnectPolicy;
use super::health;
use super::machine::{ConnectionState, Effect, Input, Machine};
use super::qr;
use crate::credentials::CredentialStore;

/// Snapshot published after every handled input.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub is_connected: bool,
    pub retry_count: u32,
    pub connection_attempts: u32,
    pub own_id: Option<String>,
}

/// Inbound batches buffered ahead of a slow consumer before the manager waits.
pub const BATCH_BUFFER: usize = 64;

/// Messages delivered by a session, together with that session.
#[derive(Clone)]
pub struct InboundBatch {
    pub session: Arc<dyn Session>,
    pub messages: Vec<InboundMessage>,
    pub kind: UpsertKind,
}

/// Manager mailbox.
#[derive(Debug)]
pub(crate) enum Command {
    Input(Input),
    /// A reconnect timer expired; stale tokens are ignored.
    TimerFired(u64),
}

/// Timing knobs for the manager.
#[derive(Debug, Clone, Copy)]
pub struct ManagerSettings {
    pub policy: ReconnectPolicy,
    pub qr_min_interval: Duration,
    pub health_interval: Duration,
    pub probe_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ManagerSettings {
    pub fn from_config(cfg: &ConnectionConfig) -> Self {
        Self {
            policy: ReconnectPolicy::from_config(cfg),
            qr_min_interval: Duration::from_secs(cfg.qr_min_interval_secs),
            health_interval: Duration::from_secs(cfg.health_interval_secs),
            probe_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default())
    }
}

/// Cloneable control surface for the running manager.
#[derive(Clone)]
pub struct ManagerHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ManagerHandle {
    /// Request a reconnection cycle.
    pub async fn reconnect(&self, reason: &str) {
        self.send(Input::Reconnect(reason.to_string())).await;
    }

    /// Clean up and stop the manager.
    pub async fn shutdown(&self) {
        self.send(Input::Shutdown).await;
    }

    /// Latest published status.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    async fn send(&self, input: Input) {
        if self.commands.send(Command::Input(input)).await.is_err() {
            debug!("connection manager already stopped");
        }
    }
}

/// Connection manager actor. Drive it with [`ConnectionManager::run`].
pub struct ConnectionManager {
    machine: Machine,
    settings: ManagerSettings,
    connector: Arc<dyn Connector>,
    credentials: CredentialStore,
    session: Option<Arc<dyn Session>>,
    generation: u64,
    own_id: Option<String>,
    timer: Option<JoinHandle<()>>,
    timer_token: u64,
    health: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
    events_tx: mpsc::Sender<TaggedEvent>,
    events_rx: mpsc::Receiver<TaggedEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
    batches_tx: mpsc::Sender<InboundBatch>,
}

impl ConnectionManager {
    /// Build the manager, its handle, and the stream of inbound message batches.
    pub fn new(
        connector: Arc<dyn Connector>,
        credentials: CredentialStore,
        settings: ManagerSettings,
    ) -> (Self, ManagerHandle, mpsc::Receiver<InboundBatch>) {
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (events_tx, events_rx) = mpsc::channel(256);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let (batches_tx, batches_rx) = mpsc::channel(BATCH_BUFFER);

        let handle = ManagerHandle {
            commands: commands_tx.clone(),
            status: status_rx,
        };
        let manager = Self {
            machine: Machine::new(settings.policy, settings.qr_min_interval),
            settings,
            connector,
            credentials,
            session: None,
            generation: 0,
            own_id: None,
            timer: None,
            timer_token: 0,
            health: None,
            watchdog: None,
            commands_tx,
            commands_rx,
            events_tx,
            events_rx,
            status_tx,
            batches_tx,
        };
        (manager, handle, batches_rx)
    }

    /// Connect, then serve inputs until shutdown.
    pub async fn run(mut self) {
        self.dispatch(Input::Connect).await;

        while !self.machine.is_shut_down() {
            tokio::select! {
                Some(cmd) = self.commands_rx.recv() => match cmd {
                    Command::Input(input) => self.dispatch(input).await,
                    Command::TimerFired(token) if token == self.timer_token => {
                        self.timer = None;
                        self.dispatch(Input::Connect).await;
                    }
                    Command::TimerFired(token) => debug!("ignoring stale reconnect timer {token}"),
                },
                Some(tagged) = self.events_rx.recv() => self.on_session_event(tagged).await,
                else => break,
            }
        }
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
        info!("connection manager stopped");
    }

    async fn on_session_event(&mut self, tagged: TaggedEvent) {
        if tagged.generation != self.generation || self.session.is_none() {
            debug!(
                "dropping event from stale session generation {}",
                tagged.generation
            );
            return;
        }
        match tagged.event {
            SessionEvent::Qr(payload) => self.dispatch(Input::Qr(payload)).await,
            SessionEvent::Paired => self.dispatch(Input::Paired).await,
            SessionEvent::Open => {
                if let Some(session) = &self.session {
                    self.own_id = session.own_id().await;
                }
                self.dispatch(Input::Open).await;
                info!(
                    "bot connected successfully, number: {}",
                    self.own_id.as_deref().unwrap_or("unknown")
                );
            }
            SessionEvent::Close(reason) => self.dispatch(Input::Close(reason)).await,
            SessionEvent::CredsUpdate => debug!("credentials updated"),
            SessionEvent::Messages { messages, kind } => {
                if let Some(session) = &self.session {
                    let batch = InboundBatch {
                        session: session.clone(),
                        messages,
                        kind,
                    };
                    if self.batches_tx.send(batch).await.is_err() {
                        debug!("message consumer gone, dropping batch");
                    }
                }
            }
        }
    }

    /// Feed one input through the machine and execute the resulting effects.
    async fn dispatch(&mut self, input: Input) {
        let mut queue = VecDeque::from([input]);
        while let Some(input) = queue.pop_front() {
            for effect in self.machine.handle(input, Instant::now()) {
                if let Some(follow_up) = self.execute(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
        self.publish_status();
    }

    async fn execute(&mut self, effect: Effect) -> Option<Input> {
        match effect {
            Effect::OpenSession => return self.open_session().await,
            Effect::ArmConnectTimeout(epoch) => {
                if let Some(old) = self.watchdog.take() {
                    old.abort();
                }
                let tx = self.commands_tx.clone();
                let after = self.settings.connect_timeout;
                self.watchdog = Some(tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(Command::Input(Input::ConnectTimeout(epoch))).await;
                }));
            }
            Effect::DisplayQr(payload) => {
                if let Err(e) = qr::print_qr(&payload) {
                    error!("qr code display error: {e}");
                }
            }
            Effect::StartHealth => {
                if let Some(session) = &self.session {
                    if let Some(old) = self.health.take() {
                        old.abort();
                    }
                    self.health = Some(health::spawn(
                        session.clone(),
                        self.settings.health_interval,
                        self.settings.probe_timeout,
                        self.commands_tx.clone(),
                    ));
                }
            }
            Effect::SetPresenceAvailable => {
                if let Some(session) = &self.session {
                    if let Err(e) = session.set_available().await {
                        warn!("failed to set presence: {e}");
                    }
                }
            }
            Effect::CancelTimer => {
                if let Some(timer) = self.timer.take() {
                    timer.abort();
                }
                self.timer_token += 1;
            }
            Effect::StopHealth => {
                if let Some(health) = self.health.take() {
                    health.abort();
                }
            }
            Effect::CloseSession => {
                if let Some(session) = self.session.take() {
                    session.end().await;
                }
            }
            Effect::WipeCredentials => {
                if let Err(e) = self.credentials.wipe() {
                    error!("failed to wipe credentials: {e}");
                }
            }
            Effect::ScheduleConnect(delay) => {
                if let Some(old) = self.timer.take() {
                    old.abort();
                }
                self.timer_token += 1;
                let token = self.timer_token;
                let tx = self.commands_tx.clone();
                self.timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Command::TimerFired(token)).await;
                }));
            }
        }
        None
    }

    async fn open_session(&mut self) -> Option<Input> {
        if let Err(e) = self.credentials.ensure() {
            return Some(Input::OpenFailed(format!(
                "cannot create credential directory: {e}"
            )));
        }
        self.generation += 1;
        let sink = EventSink::new(self.generation, self.events_tx.clone());
        let opening = self.connector.open(self.credentials.dir(), sink);

        match tokio::time::timeout(self.settings.connect_timeout, opening).await {
            Ok(Ok(session)) => {
                self.session = Some(session);
                None
            }
            Ok(Err(e)) => Some(Input::OpenFailed(e.to_string())),
            Err(_) => Some(Input::OpenFailed("timed out creating session".into())),
        }
    }

    fn publish_status(&self) {
        let counters = self.machine.counters();
        self.status_tx.send_replace(ConnectionStatus {
            state: self.machine.state(),
            is_connected: self.machine.is_connected(),
            retry_count: counters.retry_count,
            connection_attempts: counters.connection_attempts,
            own_id: self.own_id.clone(),
        });
    }
}
