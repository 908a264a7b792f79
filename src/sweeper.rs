// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expired-Pending Sweeper
//!
//! Background task that periodically purges pending transfers whose expiry
//! has passed without the recipient verifying. The durable suspended state
//! is bounded: a transfer either resumes before its deadline or gets swept.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown, the
//! same pattern as the message intake task.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::storage::PaymentDb;

/// Background sweeper for expired pending transfers.
pub struct ExpirySweeper {
    db: Arc<PaymentDb>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(db: Arc<PaymentDb>, interval: Duration) -> Self {
        Self { db, interval }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Expiry sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Expiry sweeper shutting down");
                return;
            }

            self.sweep_step();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Expiry sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep and report the purge count.
    fn sweep_step(&self) {
        match self.db.sweep_expired(Utc::now()) {
            Ok(0) => {}
            Ok(purged) => info!(purged, "Swept expired pending transfers"),
            Err(e) => warn!(error = %e, "Expiry sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Asset, EmailAddress, IntentStatus, TransferIntent};

    fn parked_intent(id: &str) -> TransferIntent {
        let now = Utc::now();
        TransferIntent {
            intent_id: id.to_string(),
            sender: EmailAddress::parse("a@b.co").unwrap(),
            recipient: EmailAddress::parse("r@x.co").unwrap(),
            amount: 10.0,
            asset: Asset::Pyusd,
            chain_id: 11_155_111,
            created_at: now,
            expires_at: now,
            status: IntentStatus::Pending,
            receipt: None,
            failure_reason: None,
        }
    }

    #[tokio::test]
    async fn sweep_step_purges_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(PaymentDb::open(&dir.path().join("test.redb")).unwrap());

        db.put_pending(&parked_intent("stale"), chrono::Duration::minutes(-1))
            .unwrap();
        db.put_pending(&parked_intent("fresh"), chrono::Duration::minutes(30))
            .unwrap();

        let sweeper = ExpirySweeper::new(db.clone(), Duration::from_secs(1));
        sweeper.sweep_step();

        assert!(db.get_pending("stale").unwrap().is_none());
        assert!(db.get_pending("fresh").unwrap().is_some());
    }

    #[tokio::test]
    async fn run_honors_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(PaymentDb::open(&dir.path().join("test.redb")).unwrap());

        let sweeper = ExpirySweeper::new(db, Duration::from_secs(3600));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(sweeper.run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
