// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Settlement Pipeline
//!
//! The orchestrator that drives every transfer intent to a terminal state.
//! Per intent, the lifecycle is:
//!
//! ```text
//! received → policy-checked → signing → broadcast-pending → completed | failed
//!                 └→ awaiting-recipient (durable, resumed on verification)
//! ```
//!
//! Invariants this module owns:
//!
//! - **At-most-once settlement**: an intent reaches exactly one terminal
//!   state; `execute_transaction` never returns with the intent ambiguous.
//! - **Per-sender serialization**: the revalidate → sign → submit → record
//!   sequence runs under a per-sender lock, so concurrent triggers (email
//!   command racing the dev endpoint, a recipient verifying mid-flight)
//!   cannot double-spend against the daily cap. Distinct senders proceed
//!   fully concurrently.
//! - **Durable spend accounting**: the daily-spend increment and the
//!   completed record are committed in one storage transaction.
//! - **No silent loss**: a resumed transfer that finds its recipient still
//!   unready is re-parked with a fresh onboarding invite, not marked
//!   resolved.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;

use crate::directory::WalletDirectory;
use crate::inbox::{sender_address, InboundMessage};
use crate::ledger::{LedgerBackend, LedgerReceipt, SubmitOutcome};
use crate::models::{EmailAddress, IntentStatus, SettlementReceipt, TransferIntent};
use crate::notify::Notifier;
use crate::parser;
use crate::policy::PolicyEngine;
use crate::signer::{Signer, SignerError, TransferPayload};
use crate::storage::{PaymentDb, StoreError};
use crate::token;

/// Why an intent failed. `Display` text is user-facing: it is what the
/// sender reads in the failure notice.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{}", .0.join(", "))]
    Policy(Vec<String>),

    #[error("Sender wallet not found. Please create a wallet first.")]
    SenderNotFound,

    #[error("Sender wallet not verified. Please verify your wallet first.")]
    SenderNotVerified,

    #[error("Transaction intent has expired.")]
    Expired,

    #[error("{0}")]
    Signer(#[from] SignerError),

    #[error("{0}")]
    Submission(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// Terminal result of one `execute_transaction` call.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Settled on chain; the carried intent holds the receipt.
    Completed(TransferIntent),
    /// Parked durably until the recipient verifies.
    AwaitingRecipient(TransferIntent),
    /// Terminally failed; the carried intent holds the reason.
    Failed(TransferIntent),
}

/// Execution-internal failure routing: "recipient not ready" re-enters the
/// onboarding path instead of failing the intent.
enum ExecError {
    RecipientNotReady,
    Terminal(PipelineError),
}

impl From<PipelineError> for ExecError {
    fn from(e: PipelineError) -> Self {
        ExecError::Terminal(e)
    }
}

impl From<StoreError> for ExecError {
    fn from(e: StoreError) -> Self {
        ExecError::Terminal(PipelineError::Storage(e))
    }
}

/// The transaction orchestration pipeline.
pub struct SettlementPipeline {
    db: Arc<PaymentDb>,
    directory: WalletDirectory,
    policy: PolicyEngine,
    signer: Arc<dyn Signer>,
    /// Ordered settlement strategies, tried in sequence.
    ledgers: Vec<LedgerBackend>,
    notifier: Notifier,
    frontend_url: String,
    /// Per-sender execution locks protecting the spend counter sequence.
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SettlementPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<PaymentDb>,
        directory: WalletDirectory,
        policy: PolicyEngine,
        signer: Arc<dyn Signer>,
        ledgers: Vec<LedgerBackend>,
        notifier: Notifier,
        frontend_url: String,
    ) -> Self {
        Self {
            db,
            directory,
            policy,
            signer,
            ledgers,
            notifier,
            frontend_url,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn sender_lock(&self, sender: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.locks.lock().expect("sender lock map poisoned");
        map.entry(sender.to_string()).or_default().clone()
    }

    // =========================================================================
    // Inbound command handling
    // =========================================================================

    /// Handle one deduplicated inbound message end to end.
    ///
    /// Every rejection is answered in the triggering thread; an unexpected
    /// internal error becomes a generic failure reply rather than silence.
    pub async fn handle_inbound(&self, message: &InboundMessage) {
        let Some(sender) = sender_address(&message.from) else {
            tracing::warn!(from = %message.from, "Could not extract sender address, dropping message");
            return;
        };
        let thread_id = message.thread_id.as_deref();

        tracing::info!(
            message_id = %message.id,
            sender = %sender,
            "Processing inbound command"
        );

        if let Err(e) = self.process_command(&sender, &message.body, thread_id).await {
            tracing::error!(sender = %sender, error = %e, "Command processing failed");
            self.notifier.invalid_command(
                &sender,
                "An unexpected error occurred. Please try again later.",
                thread_id,
            );
        }
    }

    async fn process_command(
        &self,
        sender: &EmailAddress,
        body: &str,
        thread_id: Option<&str>,
    ) -> Result<(), PipelineError> {
        // 1. Parse
        let parsed = match parser::parse_command(body) {
            Ok(parsed) => parsed,
            Err(rejection) => {
                self.notifier
                    .invalid_command(sender, &rejection.to_string(), thread_id);
                return Ok(());
            }
        };

        // 2. Sender must hold a verified wallet
        if !self.directory.is_verified(sender) {
            self.notifier.invalid_command(
                sender,
                &format!(
                    "Your wallet is not verified. Please verify your wallet at {}",
                    self.frontend_url
                ),
                thread_id,
            );
            return Ok(());
        }

        // 3. Policy against today's spend
        let spend = self
            .db
            .daily_spend(sender, parsed.asset, Utc::now().date_naive())?;
        let check = self.policy.validate(parsed.amount, spend, parsed.asset);
        if !check.is_valid() {
            self.notifier
                .invalid_command(sender, &check.violations.join(", "), thread_id);
            return Ok(());
        }

        // 4. Build the intent
        let intent = self.policy.build_intent(
            sender.clone(),
            parsed.recipient.clone(),
            parsed.amount,
            parsed.asset,
        );

        // 5. Unverified recipient suspends into onboarding; otherwise settle now
        if !self.directory.is_verified(&parsed.recipient) {
            self.begin_onboarding(intent, thread_id)?;
            return Ok(());
        }

        self.execute_transaction(intent, thread_id).await;
        Ok(())
    }

    // =========================================================================
    // Onboarding suspension
    // =========================================================================

    /// Park an intent durably, invite the recipient, and notify the sender.
    fn begin_onboarding(
        &self,
        intent: TransferIntent,
        _thread_id: Option<&str>,
    ) -> Result<(), PipelineError> {
        let parked = self.db.put_pending(&intent, self.policy.ttl())?;

        let onboarding_token = token::encode(&intent.recipient, &intent.intent_id);
        let onboarding_url = format!("{}/onboard?token={}", self.frontend_url, onboarding_token);

        self.notifier.onboarding_invite(
            &intent.recipient,
            &onboarding_url,
            &intent.sender,
            intent.amount,
            intent.asset,
        );
        self.notifier
            .pending_notice(&intent.sender, &intent.recipient, intent.amount, intent.asset);

        tracing::info!(
            intent_id = %intent.intent_id,
            recipient = %intent.recipient,
            expires_at = %parked.intent.expires_at,
            "Transfer parked awaiting recipient onboarding"
        );
        Ok(())
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Drive an intent to a terminal state.
    ///
    /// Always returns with the intent either completed, failed (persisted
    /// and the sender notified), or re-parked on the recipient, never
    /// ambiguous. Holds the sender's execution lock across the
    /// revalidate → sign → submit → record sequence.
    pub async fn execute_transaction(
        &self,
        intent: TransferIntent,
        thread_id: Option<&str>,
    ) -> ExecutionOutcome {
        let result = {
            let lock = self.sender_lock(intent.sender.as_str());
            let _guard = lock.lock().await;
            self.try_execute(&intent).await
        };

        match result {
            Ok(completed) => {
                self.notifier
                    .transfer_success(&completed.sender, &completed, thread_id);
                self.notifier
                    .transfer_success(&completed.recipient, &completed, None);
                tracing::info!(
                    intent_id = %completed.intent_id,
                    amount = completed.amount,
                    asset = %completed.asset,
                    "Transfer completed"
                );
                ExecutionOutcome::Completed(completed)
            }
            Err(ExecError::RecipientNotReady) => match self.begin_onboarding(intent.clone(), thread_id) {
                Ok(()) => ExecutionOutcome::AwaitingRecipient(intent),
                Err(e) => ExecutionOutcome::Failed(self.fail_intent(intent, &e.to_string(), thread_id)),
            },
            Err(ExecError::Terminal(e)) => {
                ExecutionOutcome::Failed(self.fail_intent(intent, &e.to_string(), thread_id))
            }
        }
    }

    /// The guarded execution sequence. Every check here runs against live
    /// state at execution time; parse-time validation may be arbitrarily
    /// stale by now (resumed transfers, delayed pollers).
    async fn try_execute(&self, intent: &TransferIntent) -> Result<TransferIntent, ExecError> {
        // 1. Revalidate
        let sender_record = self
            .db
            .get_identity(&intent.sender)?
            .ok_or(ExecError::Terminal(PipelineError::SenderNotFound))?;
        if !sender_record.verified {
            return Err(PipelineError::SenderNotVerified.into());
        }

        let now = Utc::now();
        if intent.is_expired(now) {
            return Err(PipelineError::Expired.into());
        }

        let today = now.date_naive();
        let spend = self.db.daily_spend(&intent.sender, intent.asset, today)?;
        let check = self.policy.validate(intent.amount, spend, intent.asset);
        if !check.is_valid() {
            return Err(PipelineError::Policy(check.violations).into());
        }

        let recipient_record = match self.db.get_identity(&intent.recipient)? {
            Some(record) if record.verified => record,
            // Absent or unverified: back to the onboarding path, not a failure.
            _ => return Err(ExecError::RecipientNotReady),
        };

        // 2. Sign
        let payload = TransferPayload {
            intent_id: intent.intent_id.clone(),
            sender: intent.sender.clone(),
            recipient: intent.recipient.clone(),
            from_address: sender_record.address,
            to_address: recipient_record.address,
            amount: intent.amount,
            asset: intent.asset,
            chain_id: intent.chain_id,
            expires_at: intent.expires_at,
        };
        let signed = self
            .signer
            .sign(&payload)
            .map_err(|e| ExecError::Terminal(PipelineError::Signer(e)))?;

        // 3. Submit through the strategy list
        let receipt = self.submit(&signed).await?;

        // 4. Record settlement: spend increment + completed record, one
        //    durable transaction. Only after this commits is success reported.
        let mut completed = intent.clone();
        completed.status = IntentStatus::Completed;
        completed.receipt = Some(SettlementReceipt {
            settlement_id: receipt.settlement_id,
            confirmation_ref: receipt.confirmation_ref,
            explorer_url: receipt.explorer_url,
            simulated: receipt.simulated,
            settled_at: Utc::now(),
        });
        self.db.record_settlement(&completed, today)?;

        Ok(completed)
    }

    /// Walk the ordered backend list: soft failures continue, hard failures
    /// abort, exhaustion fails with the last soft reason.
    async fn submit(
        &self,
        signed: &crate::signer::SignedTransfer,
    ) -> Result<LedgerReceipt, ExecError> {
        let mut last_failure = "No ledger backend configured".to_string();

        for backend in &self.ledgers {
            match backend.submit(signed).await {
                SubmitOutcome::Success(receipt) => {
                    tracing::info!(
                        intent_id = %signed.payload.intent_id,
                        backend = backend.name(),
                        settlement_id = %receipt.settlement_id,
                        "Submission accepted"
                    );
                    return Ok(receipt);
                }
                SubmitOutcome::SoftFail(reason) => {
                    tracing::warn!(
                        intent_id = %signed.payload.intent_id,
                        backend = backend.name(),
                        reason = %reason,
                        "Ledger backend unavailable, trying next"
                    );
                    last_failure = reason;
                }
                SubmitOutcome::HardFail(reason) => {
                    return Err(PipelineError::Submission(reason).into());
                }
            }
        }

        Err(PipelineError::Submission(last_failure).into())
    }

    /// Persist the failed terminal record and notify the sender. Only the
    /// sender: recipients never hear about failed transfers.
    fn fail_intent(
        &self,
        mut intent: TransferIntent,
        reason: &str,
        thread_id: Option<&str>,
    ) -> TransferIntent {
        intent.status = IntentStatus::Failed;
        intent.failure_reason = Some(reason.to_string());

        if let Err(e) = self.db.put_transaction(&intent) {
            tracing::error!(
                intent_id = %intent.intent_id,
                error = %e,
                "Failed to persist failed intent record"
            );
        }

        self.notifier
            .transfer_failure(&intent.sender, reason, &intent, thread_id);
        tracing::warn!(intent_id = %intent.intent_id, reason = %reason, "Transfer failed");
        intent
    }

    // =========================================================================
    // Resume
    // =========================================================================

    /// Re-drive every uncompleted parked transfer targeting a freshly
    /// verified recipient. Runs sequentially: the transfers share a sender's
    /// daily cap often enough that concurrent re-spends must not race.
    pub async fn resume_for_recipient(&self, recipient: &EmailAddress) {
        let pending = match self.db.list_pending_for_recipient(recipient) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(recipient = %recipient, error = %e, "Pending lookup failed");
                return;
            }
        };

        if pending.is_empty() {
            return;
        }
        tracing::info!(
            recipient = %recipient,
            count = pending.len(),
            "Resuming pending transfers"
        );

        for parked in pending {
            let intent_id = parked.intent.intent_id.clone();

            // An expired park is abandoned outright, never executed.
            if parked.intent.is_expired(Utc::now()) {
                if let Err(e) = self.db.delete_pending(&intent_id) {
                    tracing::error!(intent_id = %intent_id, error = %e, "Failed to delete expired pending transfer");
                }
                self.fail_intent(
                    parked.intent,
                    "Transaction expired before recipient verification",
                    None,
                );
                continue;
            }

            let outcome = self.execute_transaction(parked.intent, None).await;

            // Completed or failed: resolved either way. Still-unready stays
            // parked for the next verification event.
            if !matches!(outcome, ExecutionOutcome::AwaitingRecipient(_)) {
                if let Err(e) = self.db.complete_pending(&intent_id) {
                    tracing::error!(intent_id = %intent_id, error = %e, "Failed to mark pending transfer resolved");
                }
            }
        }
    }

    /// Run an intent as a detached task. The terminal outcome is persisted
    /// and observable via the transaction record; the handle lets callers
    /// await it when they care.
    pub fn spawn_execute(
        self: &Arc<Self>,
        intent: TransferIntent,
    ) -> tokio::task::JoinHandle<ExecutionOutcome> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.execute_transaction(intent, None).await })
    }
}
