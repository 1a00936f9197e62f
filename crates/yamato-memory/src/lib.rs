//! # yamato-memory
//!
//! Persistent bot data kept in a single JSON document.

pub mod store;

pub use store::{Registration, Store, UserRecord};
