//! Advisory locking for the registry file.
//!
//! A lock is a small JSON document next to the registry. It expires on its
//! own so a crashed process cannot wedge later runs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StateError};

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 300;

/// A held (or stale) registry lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a lock held by `holder` for [`LOCK_EXPIRY_SECS`].
    #[must_use]
    pub fn new(holder: &str) -> Self {
        Self::with_ttl(holder, Duration::seconds(LOCK_EXPIRY_SECS))
    }

    /// Creates a lock held by `holder` for `ttl`.
    #[must_use]
    pub fn with_ttl(holder: &str, ttl: Duration) -> Self {
        let acquired_at = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            acquired_at,
            expires_at: acquired_at + ttl,
        }
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Time left before the lock expires, never negative.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).max(Duration::zero())
    }

    /// Fails unless the lock has expired and may be taken over.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockedByOther`] while the lock is live.
    pub fn ensure_expired(&self) -> Result<()> {
        if self.is_expired() {
            return Ok(());
        }
        Err(StateError::LockedByOther {
            holder: self.holder.clone(),
            since: self.acquired_at.to_rfc3339(),
        }
        .into())
    }
}

/// Builds a holder id of the form `host:pid:nonce` for this process.
#[must_use]
pub fn generate_holder_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| String::from("localhost"));
    let nonce = Uuid::new_v4().simple().to_string();

    format!("{host}:{}:{}", std::process::id(), &nonce[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackfabError;

    #[test]
    fn test_fresh_lock_blocks_takeover() {
        let lock = LockInfo::new("stackfab-test");
        assert!(!lock.is_expired());
        assert!(lock.remaining() > Duration::seconds(LOCK_EXPIRY_SECS - 5));

        let err = lock.ensure_expired().unwrap_err();
        assert!(matches!(
            err,
            StackfabError::State(StateError::LockedByOther { ref holder, .. }) if holder == "stackfab-test"
        ));
    }

    #[test]
    fn test_stale_lock_can_be_taken_over() {
        let lock = LockInfo::with_ttl("crashed", Duration::seconds(-1));
        assert!(lock.is_expired());
        assert_eq!(lock.remaining(), Duration::zero());
        assert!(lock.ensure_expired().is_ok());
    }

    #[test]
    fn test_holder_ids_are_unique_per_call() {
        let first = generate_holder_id();
        let second = generate_holder_id();
        assert_ne!(first, second);

        let pid = std::process::id().to_string();
        assert_eq!(first.split(':').nth(1), Some(pid.as_str()));
    }
}
