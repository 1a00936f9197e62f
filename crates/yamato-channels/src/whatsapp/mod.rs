//! WhatsApp connectivity via `whatsapp-rust`.
//!
//! Uses the WhatsApp Web protocol (Noise handshake + Signal encryption).
//! Pairing is done by scanning a QR code printed to the terminal. The
//! session is persisted to `{auth_dir}/session.db`.
//!
//! The lifecycle logic lives in [`machine`] as a pure state machine; the
//! [`ConnectionManager`] actor executes its effects against a [`Connector`]
//! implementation ([`WhatsAppConnector`] in production).
//!
//! [`Connector`]: yamato_core::traits::Connector

pub mod backoff;
mod events;
mod health;
pub mod machine;
mod manager;
pub mod qr;
mod send;
mod session;


pub use backoff::ReconnectPolicy;
pub use machine::{ConnectionState, ReconnectCounters};
pub use manager::{ConnectionManager, ConnectionStatus, InboundBatch, ManagerHandle, ManagerSettings};
pub use session::{WhatsAppConnector, WhatsAppSession};
