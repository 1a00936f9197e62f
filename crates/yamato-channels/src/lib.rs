//! # yamato-channels
//!
//! WhatsApp connectivity for Yamato: the connection state machine, the
//! reconnection and health machinery around it, and the `whatsapp-rust`
//! session adapter.

pub mod credentials;
pub mod whatsapp;
