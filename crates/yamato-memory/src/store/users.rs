//! Registered users.

use super::Store;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use yamato_core::error::YamatoError;

/// One registered sender. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub jid: String,
    pub number: String,
    pub date: i64,
    #[serde(rename = "lastSeen", alias = "last_seen", default)]
    pub last_seen: i64,
}

/// Outcome of a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    New(UserRecord),
    /// Already present; `last_seen` was refreshed.
    Existing(UserRecord),
}

impl Registration {
    pub fn is_new(&self) -> bool {
        matches!(self, Registration::New(_))
    }

    pub fn record(&self) -> &UserRecord {
        match self {
            Registration::New(r) | Registration::Existing(r) => r,
        }
    }
}

impl Store {
    /// Register `jid` once. A repeat only refreshes `last_seen`.
    pub async fn register(&self, jid: &str, number: &str) -> Result<Registration, YamatoError> {
        let now = Utc::now().timestamp_millis();
        self.update(|db| match db.users.iter_mut().find(|u| u.jid == jid) {
            Some(existing) => {
                existing.last_seen = now;
                Registration::Existing(existing.clone())
            }
            None => {
                let record = UserRecord {
                    jid: jid.to_string(),
                    number: number.to_string(),
                    date: now,
                    last_seen: now,
                };
                db.users.push(record.clone());
                Registration::New(record)
            }
        })
        .await
    }

    pub async fn user_count(&self) -> usize {
        self.view(|db| db.users.len()).await
    }
}
