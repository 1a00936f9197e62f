//! # yamato-core
//!
//! Core types, traits, configuration, and error handling for the Yamato bot.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod retry;
pub mod session;
pub mod traits;

pub use config::shellexpand;
