// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Backends
//!
//! Submission of a signed transfer to the settlement layer. Backends are
//! arranged in an ordered strategy list the pipeline walks in sequence; each
//! attempt yields a typed outcome:
//!
//! - `Success`: receipt in hand, stop.
//! - `SoftFail`: this backend can't settle right now (network down, node
//!   refused the send); try the next one.
//! - `HardFail`: the transfer itself is bad (reverted on chain, malformed
//!   parameters); abort the intent, no fallback.
//!
//! The production list is the real chain backend followed, when enabled, by
//! a simulated backend that fabricates a marked receipt for demo
//! deployments without a funded hot wallet.

use chrono::Utc;
use uuid::Uuid;

use crate::blockchain::{parse_amount, ChainError, NetworkConfig, TxSender};
use crate::models::Asset;
use crate::signer::SignedTransfer;

/// Receipt returned by a backend on success.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReceipt {
    /// Transaction hash on the settlement chain.
    pub settlement_id: String,
    /// Block number the transaction landed in.
    pub confirmation_ref: u64,
    /// Explorer link for the transaction.
    pub explorer_url: String,
    /// True when no real chain submission happened.
    pub simulated: bool,
}

/// Typed result of one submission attempt.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Success(LedgerReceipt),
    /// Backend unavailable; the next strategy may still settle the transfer.
    SoftFail(String),
    /// The transfer is unsettleable; stop trying.
    HardFail(String),
}

/// One settlement strategy.
pub enum LedgerBackend {
    Chain(ChainLedger),
    Simulated(SimulatedLedger),
    #[cfg(test)]
    Fixed(FixedLedger),
}

impl LedgerBackend {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerBackend::Chain(_) => "chain",
            LedgerBackend::Simulated(_) => "simulated",
            #[cfg(test)]
            LedgerBackend::Fixed(_) => "fixed",
        }
    }

    pub async fn submit(&self, signed: &SignedTransfer) -> SubmitOutcome {
        match self {
            LedgerBackend::Chain(ledger) => ledger.submit(signed).await,
            LedgerBackend::Simulated(ledger) => ledger.submit(signed),
            #[cfg(test)]
            LedgerBackend::Fixed(ledger) => ledger.submit(),
        }
    }
}

// =============================================================================
// Chain backend
// =============================================================================

/// Real submission over JSON-RPC: build the transfer, broadcast from the
/// signed wallet, wait for inclusion.
pub struct ChainLedger {
    network: NetworkConfig,
    pyusd_address: String,
}

impl ChainLedger {
    pub fn new(network: NetworkConfig, pyusd_address: String) -> Self {
        Self {
            network,
            pyusd_address,
        }
    }

    async fn submit(&self, signed: &SignedTransfer) -> SubmitOutcome {
        let payload = &signed.payload;

        let sender = match TxSender::new(self.network.clone(), signed.wallet.clone()) {
            Ok(sender) => sender,
            Err(e) => return SubmitOutcome::SoftFail(format!("sender setup failed: {e}")),
        };

        let units = match parse_amount(&payload.amount.to_string(), payload.asset.decimals()) {
            Ok(units) => units,
            // A malformed amount will not get better on another backend.
            Err(e) => return SubmitOutcome::HardFail(e.to_string()),
        };

        let sent = match payload.asset {
            Asset::Eth => sender.send_native(&payload.to_address, units).await,
            Asset::Pyusd => {
                sender
                    .send_token(&self.pyusd_address, &payload.to_address, units)
                    .await
            }
        };

        let sent = match sent {
            Ok(sent) => sent,
            Err(ChainError::InvalidAddress(e)) => return SubmitOutcome::HardFail(e),
            Err(e) => return SubmitOutcome::SoftFail(e.to_string()),
        };

        tracing::info!(
            intent_id = %payload.intent_id,
            tx_hash = %sent.tx_hash,
            "Transaction broadcast, awaiting confirmation"
        );

        match sender.wait_for_confirmation(&sent.tx_hash).await {
            Ok(receipt) if receipt.success => SubmitOutcome::Success(LedgerReceipt {
                settlement_id: receipt.tx_hash,
                confirmation_ref: receipt.block_number,
                explorer_url: sent.explorer_url,
                simulated: false,
            }),
            Ok(receipt) => SubmitOutcome::HardFail(format!(
                "Transaction {} reverted in block {}",
                receipt.tx_hash, receipt.block_number
            )),
            Err(e) => SubmitOutcome::SoftFail(format!("confirmation failed: {e}")),
        }
    }
}

// =============================================================================
// Simulated backend
// =============================================================================

/// Fabricates a receipt without touching the chain. Last-resort strategy for
/// deployments without a funded hot wallet; receipts are marked `simulated`.
pub struct SimulatedLedger {
    network: NetworkConfig,
}

impl SimulatedLedger {
    pub fn new(network: NetworkConfig) -> Self {
        Self { network }
    }

    fn submit(&self, signed: &SignedTransfer) -> SubmitOutcome {
        // Two v4 uuids give 64 hex chars, shaped like a real tx hash.
        let a = Uuid::new_v4().simple().to_string();
        let b = Uuid::new_v4().simple().to_string();
        let tx_hash = format!("0x{a}{b}");

        // Plausible-looking recent block number.
        let block_number = 5_000_000 + (Utc::now().timestamp() as u64 % 1_000_000);

        tracing::info!(
            intent_id = %signed.payload.intent_id,
            tx_hash = %tx_hash,
            "Settled in simulated mode (no chain submission)"
        );

        SubmitOutcome::Success(LedgerReceipt {
            settlement_id: tx_hash.clone(),
            confirmation_ref: block_number,
            explorer_url: self.network.tx_url(&tx_hash),
            simulated: true,
        })
    }
}

// =============================================================================
// Test backend
// =============================================================================

/// Deterministic backend for pipeline tests.
#[cfg(test)]
pub struct FixedLedger {
    pub kind: FixedKind,
}

#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub enum FixedKind {
    Success,
    SoftFail,
    HardFail,
}

#[cfg(test)]
impl FixedLedger {
    fn submit(&self) -> SubmitOutcome {
        match self.kind {
            FixedKind::Success => SubmitOutcome::Success(LedgerReceipt {
                settlement_id: "0xfixed".to_string(),
                confirmation_ref: 42,
                explorer_url: "https://sepolia.etherscan.io/tx/0xfixed".to_string(),
                simulated: true,
            }),
            FixedKind::SoftFail => SubmitOutcome::SoftFail("backend offline".to_string()),
            FixedKind::HardFail => SubmitOutcome::HardFail("execution reverted".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmailAddress;
    use crate::signer::{LocalKeySigner, Signer, SigningPolicy, TransferPayload};

    fn signed(amount: f64) -> SignedTransfer {
        let signer = LocalKeySigner::random(SigningPolicy {
            chain_id: 11_155_111,
            eth_max_tx_amount: 0.1,
            pyusd_max_tx_amount: 100.0,
        });
        signer
            .sign(&TransferPayload {
                intent_id: "i-1".to_string(),
                sender: EmailAddress::parse("a@b.co").unwrap(),
                recipient: EmailAddress::parse("c@d.co").unwrap(),
                from_address: "0x1111111111111111111111111111111111111111".to_string(),
                to_address: "0x2222222222222222222222222222222222222222".to_string(),
                amount,
                asset: Asset::Pyusd,
                chain_id: 11_155_111,
                expires_at: Utc::now() + chrono::Duration::minutes(30),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn simulated_backend_always_succeeds_with_marked_receipt() {
        let backend = LedgerBackend::Simulated(SimulatedLedger::new(NetworkConfig::sepolia()));
        match backend.submit(&signed(10.0)).await {
            SubmitOutcome::Success(receipt) => {
                assert!(receipt.simulated);
                assert!(receipt.settlement_id.starts_with("0x"));
                assert_eq!(receipt.settlement_id.len(), 66);
                assert!(receipt.explorer_url.contains(&receipt.settlement_id));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn simulated_hashes_are_unique() {
        let backend = LedgerBackend::Simulated(SimulatedLedger::new(NetworkConfig::sepolia()));
        let first = backend.submit(&signed(10.0)).await;
        let second = backend.submit(&signed(10.0)).await;
        match (first, second) {
            (SubmitOutcome::Success(a), SubmitOutcome::Success(b)) => {
                assert_ne!(a.settlement_id, b.settlement_id);
            }
            other => panic!("expected two successes, got {other:?}"),
        }
    }
}
