// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Message Intake
//!
//! Inbound command messages arrive on an mpsc channel: the external message
//! source (a mail poller, a webhook adapter, the dev injection endpoint)
//! owns transport and pushes parsed [`InboundMessage`]s into the feed.
//!
//! The intake task collapses at-least-once delivery to at-most-once
//! handling via the durable processed-message set (a message id is marked
//! before handling, so a crash mid-command re-delivers nothing on restart)
//! and drives the settlement pipeline sequentially, one message at a time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::EmailAddress;
use crate::pipeline::SettlementPipeline;
use crate::storage::PaymentDb;

/// One already-fetched inbound message.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Transport-level message id, the dedup key.
    pub id: String,
    /// Raw `From` header value (`Name <addr>` or bare address).
    pub from: String,
    /// Message body; only the first line carries the command.
    pub body: String,
    /// Conversation id replies should land in.
    pub thread_id: Option<String>,
}

/// Producer handle external message sources push into.
pub type MessageFeed = mpsc::UnboundedSender<InboundMessage>;

/// Background task consuming the inbound feed.
pub struct MessageIntake {
    rx: mpsc::UnboundedReceiver<InboundMessage>,
    db: Arc<PaymentDb>,
    pipeline: Arc<SettlementPipeline>,
}

impl MessageIntake {
    /// Create the intake task and the feed handle for producers.
    pub fn new(db: Arc<PaymentDb>, pipeline: Arc<SettlementPipeline>) -> (MessageFeed, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx, db, pipeline })
    }

    /// Run until the feed closes or the cancellation token fires.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(intake.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Message intake starting");

        loop {
            tokio::select! {
                message = self.rx.recv() => {
                    match message {
                        Some(message) => self.handle(message).await,
                        None => {
                            tracing::info!("Inbound feed closed, message intake stopping");
                            return;
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Message intake shutting down");
                    return;
                }
            }
        }
    }

    async fn handle(&self, message: InboundMessage) {
        match self.db.is_message_processed(&message.id) {
            Ok(true) => {
                tracing::debug!(message_id = %message.id, "Skipping already-processed message");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(message_id = %message.id, error = %e, "Dedup lookup failed, skipping message");
                return;
            }
        }

        // Mark before handling: re-delivery after a crash must not double-run
        // a command that may already have moved funds.
        if let Err(e) = self.db.mark_message_processed(&message.id) {
            tracing::error!(message_id = %message.id, error = %e, "Failed to record message id, skipping");
            return;
        }

        self.pipeline.handle_inbound(&message).await;
    }
}

/// Extract the sender address from a `From` header value.
///
/// Handles `Display Name <user@host>` and bare-address forms.
pub fn sender_address(from: &str) -> Option<EmailAddress> {
    if let (Some(start), Some(end)) = (from.find('<'), from.rfind('>')) {
        if start < end {
            return EmailAddress::parse(&from[start + 1..end]);
        }
    }
    // Bare address, possibly surrounded by other words.
    from.split_whitespace()
        .find(|word| word.contains('@'))
        .and_then(EmailAddress::parse)
}
