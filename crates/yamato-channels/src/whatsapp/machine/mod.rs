//! Connection lifecycle state machine.
//!
//! [`Machine::handle`] is a pure function of (state, input, now): it mutates
//! the machine and returns the side effects the connection manager must carry
//! out. No I/O happens here, so every lifecycle path is testable without a
//! live session.


use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use yamato_core::session::DisconnectReason;

use super::backoff::ReconnectPolicy;

/// Where the connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    QrPending,
    Authenticated,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::QrPending => "qr_pending",
            Self::Authenticated => "authenticated",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconnection bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconnectCounters {
    /// Consecutive retries since the last successful open.
    pub retry_count: u32,
    /// Scheduled attempts since the last credential reset.
    pub connection_attempts: u32,
}

/// Outcome of a failed liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// The underlying socket is no longer open.
    SocketClosed,
    /// Anything else (slow response, transient error).
    Other(String),
}

/// Everything that can drive the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Start a connection attempt (initial start or a reconnect timer firing).
    Connect,
    /// The session object could not be created.
    OpenFailed(String),
    /// The transport produced a pairing QR code.
    Qr(String),
    /// Pairing succeeded; the connection is about to open.
    Paired,
    Open,
    Close(DisconnectReason),
    ProbeFailed(ProbeFailure),
    /// The connect watchdog for attempt `epoch` expired.
    ConnectTimeout(u64),
    /// Explicit reconnection request (e.g. an admin restart).
    Reconnect(String),
    Shutdown,
}

/// Side effects requested by the machine, executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenSession,
    /// Start the connect watchdog for attempt `epoch`.
    ArmConnectTimeout(u64),
    DisplayQr(String),
    StartHealth,
    SetPresenceAvailable,
    CancelTimer,
    StopHealth,
    CloseSession,
    WipeCredentials,
    /// Feed [`Input::Connect`] back after the delay.
    ScheduleConnect(Duration),
}

/// The connection state machine.
#[derive(Debug)]
pub struct Machine {
    policy: ReconnectPolicy,
    qr_min_interval: Duration,
    state: ConnectionState,
    is_connected: bool,
    is_connecting: bool,
    counters: ReconnectCounters,
    last_qr: Option<Instant>,
    timer_pending: bool,
    health_running: bool,
    session_present: bool,
    epoch: u64,
    shut_down: bool,
}

impl Machine {
    pub fn new(policy: ReconnectPolicy, qr_min_interval: Duration) -> Self {
        Self {
            policy,
            qr_min_interval,
            state: ConnectionState::Disconnected,
            is_connected: false,
            is_connecting: false,
            counters: ReconnectCounters::default(),
            last_qr: None,
            timer_pending: false,
            health_running: false,
            session_present: false,
            epoch: 0,
            shut_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn is_connecting(&self) -> bool {
        self.is_connecting
    }

    pub fn counters(&self) -> ReconnectCounters {
        self.counters
    }

    /// Whether a reconnect timer is outstanding.
    pub fn timer_pending(&self) -> bool {
        self.timer_pending
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Apply one input and return the effects to execute.
    pub fn handle(&mut self, input: Input, now: Instant) -> Vec<Effect> {
        if self.shut_down {
            debug!("ignoring {input:?} after shutdown");
            return Vec::new();
        }
        match input {
            Input::Connect => self.on_connect(),
            Input::OpenFailed(reason) => self.on_open_failed(&reason),
            Input::Qr(payload) => self.on_qr(payload, now),
            Input::Paired => {
                info!("pairing successful, waiting for connection to open");
                self.state = ConnectionState::Authenticated;
                Vec::new()
            }
            Input::Open => self.on_open(),
            Input::Close(reason) => self.on_close(reason),
            Input::ProbeFailed(failure) => self.on_probe_failed(failure),
            Input::ConnectTimeout(epoch) => self.on_connect_timeout(epoch),
            Input::Reconnect(reason) => self.schedule_reconnect(&reason, false),
            Input::Shutdown => {
                info!("shutting down connection");
                let effects = self.cleanup();
                self.shut_down = true;
                effects
            }
        }
    }

    fn on_connect(&mut self) -> Vec<Effect> {
        // The timer that delivered this input (if any) has fired.
        self.timer_pending = false;

        if self.is_connecting {
            info!("connection already in progress, skipping");
            return Vec::new();
        }
        if self.is_connected {
            info!("already connected, skipping connect");
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.session_present {
            effects.push(Effect::CloseSession);
        }

        self.is_connecting = true;
        self.state = ConnectionState::Connecting;
        self.session_present = true;
        self.epoch += 1;
        info!("starting whatsapp connection (attempt epoch {})", self.epoch);

        effects.push(Effect::ArmConnectTimeout(self.epoch));
        effects.push(Effect::OpenSession);
        effects
    }

    fn on_open_failed(&mut self, reason: &str) -> Vec<Effect> {
        warn!("connection initialization error: {reason}");
        self.session_present = false;
        self.is_connecting = false;
        let effects = self.schedule_reconnect("initialization error", false);
        self.state = ConnectionState::Error;
        effects
    }

    fn on_qr(&mut self, payload: String, now: Instant) -> Vec<Effect> {
        self.state = ConnectionState::QrPending;
        let due = self
            .last_qr
            .map_or(true, |last| now.saturating_duration_since(last) >= self.qr_min_interval);
        if due {
            self.last_qr = Some(now);
            info!("new qr code received, displaying");
            vec![Effect::DisplayQr(payload)]
        } else {
            debug!("qr code received but rate limited");
            Vec::new()
        }
    }

    fn on_open(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Connected;
        self.is_connected = true;
        self.is_connecting = false;
        self.session_present = true;
        self.counters.retry_count = 0;
        info!(
            "connected (total attempts so far: {})",
            self.counters.connection_attempts
        );

        let mut effects = Vec::new();
        if !self.health_running {
            self.health_running = true;
            effects.push(Effect::StartHealth);
        }
        effects.push(Effect::SetPresenceAvailable);
        effects
    }

    fn on_close(&mut self, reason: DisconnectReason) -> Vec<Effect> {
        self.is_connected = false;
        self.is_connecting = false;
        self.state = ConnectionState::Disconnected;

        let wipe = reason.wipes_credentials();
        if wipe {
            warn!("connection closed ({}), credentials are no longer usable", reason.describe());
        } else {
            info!("connection closed ({})", reason.describe());
        }
        self.schedule_reconnect(&reason.describe(), wipe)
    }

    fn on_probe_failed(&mut self, failure: ProbeFailure) -> Vec<Effect> {
        match failure {
            ProbeFailure::SocketClosed if self.is_connected => {
                warn!("health check found the socket closed, reconnecting");
                self.is_connected = false;
                self.schedule_reconnect("socket health check failed", false)
            }
            ProbeFailure::SocketClosed => {
                debug!("ignoring stale socket probe failure");
                Vec::new()
            }
            ProbeFailure::Other(e) => {
                warn!("health check failed: {e}");
                Vec::new()
            }
        }
    }

    fn on_connect_timeout(&mut self, epoch: u64) -> Vec<Effect> {
        if epoch != self.epoch || !self.is_connecting || self.is_connected {
            debug!("ignoring stale connect timeout (epoch {epoch})");
            return Vec::new();
        }
        warn!("connection timeout reached, forcing reconnection");
        self.is_connecting = false;
        self.schedule_reconnect("connection timeout", false)
    }

    /// Decide when the next connect happens.
    ///
    /// No-op while an attempt is in flight. Otherwise cleans up first, which
    /// cancels any pending timer, so at most one timer is ever outstanding.
    fn schedule_reconnect(&mut self, reason: &str, wipe_first: bool) -> Vec<Effect> {
        if self.is_connecting {
            info!("already attempting to reconnect, skipping ({reason})");
            return Vec::new();
        }

        info!("handling reconnection, reason: {reason}");
        let mut effects = self.cleanup();
        if wipe_first {
            effects.push(Effect::WipeCredentials);
        }

        if self.counters.connection_attempts >= self.policy.max_connection_attempts {
            warn!("maximum connection attempts reached, clearing credentials");
            push_unique(&mut effects, Effect::WipeCredentials);
            self.counters = ReconnectCounters::default();
        }

        let delay = self.policy.delay_for(self.counters.retry_count);
        if self.counters.retry_count < self.policy.max_retries {
            self.counters.retry_count += 1;
            self.counters.connection_attempts += 1;
            info!(
                "reconnecting in {:.1}s (attempt {}/{}, total: {})",
                delay.as_secs_f64(),
                self.counters.retry_count,
                self.policy.max_retries,
                self.counters.connection_attempts
            );
            effects.push(Effect::ScheduleConnect(delay));
        } else {
            warn!("max retries reached, starting a fresh session");
            push_unique(&mut effects, Effect::WipeCredentials);
            self.counters = ReconnectCounters::default();
            effects.push(Effect::ScheduleConnect(self.policy.fresh_session_delay));
        }
        self.timer_pending = true;
        effects
    }

    /// Release every resource and reset the connection flags.
    ///
    /// Safe from any state and when called repeatedly: only resources that
    /// are actually held produce effects.
    fn cleanup(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.timer_pending {
            self.timer_pending = false;
            effects.push(Effect::CancelTimer);
        }
        if self.health_running {
            self.health_running = false;
            effects.push(Effect::StopHealth);
        }
        if self.session_present {
            self.session_present = false;
            effects.push(Effect::CloseSession);
        }
        self.is_connected = false;
        self.is_connecting = false;
        self.state = ConnectionState::Disconnected;
        effects
    }
}

fn push_unique(effects: &mut Vec<Effect>, effect: Effect) {
    if !effects.contains(&effect) {
        effects.push(effect);
    }
}
