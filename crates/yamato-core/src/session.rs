//! Session lifecycle vocabulary shared by the transport adapter and the connection manager.

use crate::message::InboundMessage;
use tokio::sync::mpsc;

/// Why the transport closed a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    BadSession,
    ConnectionClosed,
    ConnectionLost,
    ConnectionReplaced,
    LoggedOut,
    RestartRequired,
    TimedOut,
    Forbidden,
    /// Anything the transport reported that we do not recognize (raw code if known).
    Unknown(Option<u16>),
}

impl DisconnectReason {
    /// Classify a numeric close status code.
    pub fn from_status_code(code: u16) -> Self {
        match code {
            500 => Self::BadSession,
            428 => Self::ConnectionClosed,
            408 => Self::ConnectionLost,
            440 => Self::ConnectionReplaced,
            401 => Self::LoggedOut,
            515 => Self::RestartRequired,
            403 => Self::Forbidden,
            other => Self::Unknown(Some(other)),
        }
    }

    /// Whether the stored credentials are unusable after this close.
    pub fn wipes_credentials(&self) -> bool {
        matches!(
            self,
            Self::BadSession | Self::ConnectionReplaced | Self::LoggedOut
        )
    }

    /// Human-readable reason handed to the reconnection scheduler.
    pub fn describe(&self) -> String {
        match self {
            Self::BadSession => "bad session".into(),
            Self::ConnectionClosed => "connection closed".into(),
            Self::ConnectionLost => "connection lost".into(),
            Self::ConnectionReplaced => "connection replaced".into(),
            Self::LoggedOut => "logged out".into(),
            Self::RestartRequired => "restart required".into(),
            Self::TimedOut => "timed out".into(),
            Self::Forbidden => "forbidden".into(),
            Self::Unknown(Some(code)) => format!("unknown ({code})"),
            Self::Unknown(None) => "unknown".into(),
        }
    }
}

/// How a message batch was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    /// Live delivery. The only kind the router acts on.
    Notify,
    /// History or offline sync replay.
    Append,
}

/// Events a session emits over its lifetime.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A pairing QR code is waiting to be scanned.
    Qr(String),
    /// Pairing succeeded; the connection is about to open.
    Paired,
    /// The connection is open and authenticated.
    Open,
    /// The connection closed.
    Close(DisconnectReason),
    /// Credentials changed and were persisted by the transport.
    CredsUpdate,
    /// Inbound messages.
    Messages {
        messages: Vec<InboundMessage>,
        kind: UpsertKind,
    },
}

/// A session event tagged with the generation of the session that emitted it.
#[derive(Debug, Clone)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: SessionEvent,
}

/// Where a session publishes its events.
///
/// Each opened session gets its own generation so late events from a
/// replaced session can be told apart and dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::Sender<TaggedEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::Sender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Publish an event. Returns `false` once the receiving side is gone.
    pub async fn emit(&self, event: SessionEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_classification() {
        assert_eq!(
            DisconnectReason::from_status_code(500),
            DisconnectReason::BadSession
        );
        assert_eq!(
            DisconnectReason::from_status_code(428),
            DisconnectReason::ConnectionClosed
        );
        assert_eq!(
            DisconnectReason::from_status_code(408),
            DisconnectReason::ConnectionLost
        );
        assert_eq!(
            DisconnectReason::from_status_code(440),
            DisconnectReason::ConnectionReplaced
        );
        assert_eq!(
            DisconnectReason::from_status_code(401),
            DisconnectReason::LoggedOut
        );
        assert_eq!(
            DisconnectReason::from_status_code(515),
            DisconnectReason::RestartRequired
        );
        assert_eq!(
            DisconnectReason::from_status_code(403),
            DisconnectReason::Forbidden
        );
        assert_eq!(
            DisconnectReason::from_status_code(999),
            DisconnectReason::Unknown(Some(999))
        );
    }

    #[test]
    fn test_only_unusable_sessions_wipe_credentials() {
        let wiping = [
            DisconnectReason::BadSession,
            DisconnectReason::ConnectionReplaced,
            DisconnectReason::LoggedOut,
        ];
        let keeping = [
            DisconnectReason::ConnectionLost,
            DisconnectReason::TimedOut,
            DisconnectReason::ConnectionClosed,
            DisconnectReason::RestartRequired,
            DisconnectReason::Forbidden,
            DisconnectReason::Unknown(None),
        ];
        assert!(wiping.iter().all(|r| r.wipes_credentials()));
        assert!(keeping.iter().all(|r| !r.wipes_credentials()));
    }

    #[test]
    fn test_describe_unknown_includes_code() {
        assert_eq!(DisconnectReason::Unknown(Some(499)).describe(), "unknown (499)");
    }

    #[tokio::test]
    async fn test_event_sink_tags_generation() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EventSink::new(7, tx);
        assert!(sink.emit(SessionEvent::Open).await);
        let tagged = rx.recv().await.unwrap();
        assert_eq!(tagged.generation, 7);
        assert!(matches!(tagged.event, SessionEvent::Open));
    }
}
