//! Transient user-facing messages that dismiss themselves after a fixed delay.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind { Error, Info }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Notice {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool { now < self.expires_at }
}

/// Holds at most one notice; a new one replaces the previous.
#[derive(Clone, Debug)]
pub struct NoticeBoard {
    ttl: Duration,
    current: Option<Notice>,
}

impl NoticeBoard {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self { ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(4)), current: None }
    }

    pub fn post(&mut self, kind: NoticeKind, message: impl Into<String>) -> &Notice {
        self.post_at(kind, message, Utc::now())
    }

    pub fn post_at(&mut self, kind: NoticeKind, message: impl Into<String>, now: DateTime<Utc>) -> &Notice {
        self.current.insert(Notice { kind, message: message.into(), raised_at: now, expires_at: now + self.ttl })
    }

    pub fn active(&self) -> Option<&Notice> { self.active_at(Utc::now()) }

    pub fn active_at(&self, now: DateTime<Utc>) -> Option<&Notice> {
        self.current.as_ref().filter(|n| n.is_active_at(now))
    }

    pub fn dismiss(&mut self) { self.current = None; }
}
