// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Core Data Models
//!
//! Domain types shared across the parser, policy engine, wallet directory,
//! settlement pipeline, and the REST API. All persisted and API-facing types
//! derive `Serialize`/`Deserialize` (camelCase on the wire) and `ToSchema`
//! for OpenAPI documentation.
//!
//! ## Email Identity Type
//!
//! The [`EmailAddress`] newtype wraps a normalized (NFKC, lowercase) email
//! identity. It is the primary key of the wallet directory and the
//! addressing scheme of every transfer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;

// =============================================================================
// Email Identity Type
// =============================================================================

/// Normalized email identity.
///
/// Construction via [`EmailAddress::parse`] enforces a `local@domain.tld`
/// shape and folds the input to NFKC lowercase, so two spellings of the same
/// mailbox always map to the same wallet record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmailAddress(pub String);

impl EmailAddress {
    /// Parse and normalize an email address.
    ///
    /// Returns `None` unless the input has exactly one `@`, a non-empty
    /// local part, and a dotted domain with non-empty labels. Whitespace
    /// anywhere in the address is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw.trim().nfkc().collect::<String>().to_lowercase();

        if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
            return None;
        }

        let mut parts = normalized.splitn(2, '@');
        let local = parts.next()?;
        let domain = parts.next()?;

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return None;
        }

        // Domain must carry at least one dot with non-empty labels on each side.
        if !domain.contains('.') || domain.split('.').any(str::is_empty) {
            return None;
        }

        Some(EmailAddress(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

// =============================================================================
// Assets
// =============================================================================

/// Transferable asset. The allow-list is fixed per deployment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub enum Asset {
    /// Native Sepolia ether.
    #[serde(rename = "ETH")]
    Eth,
    /// PYUSD ERC-20 stablecoin (6 decimals).
    #[serde(rename = "PYUSD")]
    Pyusd,
}

impl Asset {
    /// Token decimals used when converting to on-chain units.
    pub fn decimals(self) -> u8 {
        match self {
            Asset::Eth => 18,
            Asset::Pyusd => 6,
        }
    }

    /// Ticker symbol as it appears in commands and notifications.
    pub fn symbol(self) -> &'static str {
        match self {
            Asset::Eth => "ETH",
            Asset::Pyusd => "PYUSD",
        }
    }
}

impl std::str::FromStr for Asset {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "ETH" => Ok(Asset::Eth),
            "PYUSD" => Ok(Asset::Pyusd),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// =============================================================================
// Identity Records
// =============================================================================

/// One wallet directory entry per email identity.
///
/// The record holds only public key material; spendable keys live with the
/// signing backend. The verified flag is monotonic: once set it is never
/// reverted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub email: EmailAddress,
    /// Uncompressed SEC1 public key, 0x-prefixed hex.
    pub public_key: String,
    /// EVM address derived from the public key.
    pub address: String,
    /// One-time verification code, replaced on resend.
    pub otp_code: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Transfer Intents
// =============================================================================

/// Lifecycle state of a transfer intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    /// Created, not yet settled.
    Pending,
    /// Settled on chain; receipt data attached.
    Completed,
    /// Terminally failed; failure reason attached.
    Failed,
}

/// Receipt data appended to an intent at settlement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    /// Transaction hash on the settlement chain.
    pub settlement_id: String,
    /// Block number the transaction was included in.
    pub confirmation_ref: u64,
    /// External explorer link for the transaction.
    pub explorer_url: String,
    /// True when the receipt came from the simulated backend.
    pub simulated: bool,
    pub settled_at: DateTime<Utc>,
}

/// A requested transfer awaiting or having completed settlement.
///
/// Owned exclusively by the settlement pipeline during execution. Once
/// `completed` or `failed` the record is immutable apart from the receipt or
/// failure metadata written at the transition.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferIntent {
    pub intent_id: String,
    pub sender: EmailAddress,
    pub recipient: EmailAddress,
    pub amount: f64,
    pub asset: Asset,
    pub chain_id: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: IntentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<SettlementReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl TransferIntent {
    /// Whether the intent may no longer be executed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A transfer intent parked until its recipient finishes onboarding.
///
/// `completed` means "no longer needs resuming"; the underlying intent may
/// have settled or terminally failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransfer {
    pub intent: TransferIntent,
    pub completed: bool,
}
