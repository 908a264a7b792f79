// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transfer Signing
//!
//! The [`Signer`] collaborator exclusively owns spendable key material. The
//! pipeline hands it a [`TransferPayload`]; it either releases a
//! [`SignedTransfer`] or refuses.
//!
//! [`LocalKeySigner`] is the hot-wallet implementation: a single funding key
//! loaded at startup from a PEM file or hex string. Before releasing a
//! signature it re-checks its own policy envelope (chain id, positive
//! amount, per-transaction maximum, expiry) independently of the pipeline's
//! checks, mirroring the off-process signing policy of the original
//! deployment.

use alloy::network::EthereumWallet;
use alloy::signers::local::PrivateKeySigner;
use chrono::{DateTime, Utc};
use k256::SecretKey;

use crate::config::Config;
use crate::models::{Asset, EmailAddress};

/// Everything the signer needs to know about a transfer before releasing a
/// signature.
#[derive(Debug, Clone)]
pub struct TransferPayload {
    pub intent_id: String,
    pub sender: EmailAddress,
    pub recipient: EmailAddress,
    /// Resolved sender wallet address.
    pub from_address: String,
    /// Resolved recipient wallet address.
    pub to_address: String,
    pub amount: f64,
    pub asset: Asset,
    pub chain_id: u64,
    pub expires_at: DateTime<Utc>,
}

/// A payload the signer has agreed to fund, carrying the wallet that will
/// sign the on-chain transaction.
#[derive(Clone)]
pub struct SignedTransfer {
    pub payload: TransferPayload,
    pub wallet: EthereumWallet,
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// The signer's own policy refused the transfer.
    #[error("{0}")]
    PolicyRejected(String),

    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),
}

/// Signing backend contract. Implementations must not release a signature
/// for a payload their own policy refuses.
pub trait Signer: Send + Sync {
    fn sign(&self, payload: &TransferPayload) -> Result<SignedTransfer, SignerError>;

    /// Funding address signatures will spend from.
    fn address(&self) -> String;
}

/// Per-asset envelope the signer enforces independently of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct SigningPolicy {
    pub chain_id: u64,
    pub eth_max_tx_amount: f64,
    pub pyusd_max_tx_amount: f64,
}

impl SigningPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chain_id: config.chain_id,
            eth_max_tx_amount: config.policies.eth_max_tx_amount,
            pyusd_max_tx_amount: config.policies.pyusd_max_tx_amount,
        }
    }

    fn max_for(&self, asset: Asset) -> f64 {
        match asset {
            Asset::Eth => self.eth_max_tx_amount,
            Asset::Pyusd => self.pyusd_max_tx_amount,
        }
    }
}

/// Hot-wallet signer holding a single funding key in memory.
pub struct LocalKeySigner {
    signer: PrivateKeySigner,
    policy: SigningPolicy,
}

impl LocalKeySigner {
    /// Build from runtime configuration: PEM key file first, hex env second,
    /// otherwise an ephemeral throwaway key (demo mode; transfers funded by
    /// it can only settle via the simulated backend).
    pub fn from_config(config: &Config) -> Result<Self, SignerError> {
        let policy = SigningPolicy::from_config(config);

        if let Some(path) = &config.hot_wallet_key_file {
            let pem_bytes = std::fs::read(path)
                .map_err(|e| SignerError::KeyUnavailable(format!("{}: {e}", path.display())))?;
            return Self::from_pem(&pem_bytes, policy);
        }

        if let Some(hex_key) = &config.hot_wallet_private_key {
            return Self::from_hex(hex_key, policy);
        }

        tracing::warn!("No hot wallet key configured, using an ephemeral key (demo mode)");
        Ok(Self::random(policy))
    }

    /// Build from a PEM-encoded (PKCS#8 or SEC1) secp256k1 private key.
    pub fn from_pem(pem_bytes: &[u8], policy: SigningPolicy) -> Result<Self, SignerError> {
        let pem_str = std::str::from_utf8(pem_bytes)
            .map_err(|e| SignerError::KeyUnavailable(format!("Invalid UTF-8: {e}")))?;

        let pem = pem::parse(pem_str)
            .map_err(|e| SignerError::KeyUnavailable(format!("Invalid PEM: {e}")))?;

        let secret_key = SecretKey::from_sec1_der(pem.contents())
            .map_err(|e| e.to_string())
            .or_else(|_| {
                use k256::pkcs8::DecodePrivateKey;
                SecretKey::from_pkcs8_der(pem.contents()).map_err(|e| e.to_string())
            })
            .map_err(|e| SignerError::KeyUnavailable(format!("Invalid key format: {e}")))?;

        let signer = PrivateKeySigner::from_slice(secret_key.to_bytes().as_slice())
            .map_err(|e| SignerError::KeyUnavailable(e.to_string()))?;

        Ok(Self { signer, policy })
    }

    /// Build from a hex-encoded private key (64 chars, optional 0x prefix).
    pub fn from_hex(hex_key: &str, policy: SigningPolicy) -> Result<Self, SignerError> {
        let stripped = hex_key.trim_start_matches("0x");
        let key_bytes = alloy::hex::decode(stripped)
            .map_err(|e| SignerError::KeyUnavailable(e.to_string()))?;

        let signer = PrivateKeySigner::from_slice(&key_bytes)
            .map_err(|e| SignerError::KeyUnavailable(e.to_string()))?;

        Ok(Self { signer, policy })
    }

    /// Ephemeral random key.
    pub fn random(policy: SigningPolicy) -> Self {
        Self {
            signer: PrivateKeySigner::random(),
            policy,
        }
    }
}

impl Signer for LocalKeySigner {
    fn sign(&self, payload: &TransferPayload) -> Result<SignedTransfer, SignerError> {
        if payload.chain_id != self.policy.chain_id {
            return Err(SignerError::PolicyRejected(format!(
                "Invalid chain ID. Only {} is supported.",
                self.policy.chain_id
            )));
        }

        if !payload.amount.is_finite() || payload.amount <= 0.0 {
            return Err(SignerError::PolicyRejected(
                "Transaction amount must be greater than zero.".to_string(),
            ));
        }

        let max = self.policy.max_for(payload.asset);
        if payload.amount > max {
            return Err(SignerError::PolicyRejected(format!(
                "Transaction amount {} exceeds maximum allowed {} {}.",
                payload.amount, max, payload.asset
            )));
        }

        if Utc::now() > payload.expires_at {
            return Err(SignerError::PolicyRejected(
                "Transaction intent has expired.".to_string(),
            ));
        }

        Ok(SignedTransfer {
            payload: payload.clone(),
            wallet: EthereumWallet::from(self.signer.clone()),
        })
    }

    fn address(&self) -> String {
        format!("{:?}", self.signer.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const TEST_KEY_HEX: &str =
        "0000000000000000000000000000000000000000000000000000000000000001";

    fn policy() -> SigningPolicy {
        SigningPolicy {
            chain_id: 11_155_111,
            eth_max_tx_amount: 0.1,
            pyusd_max_tx_amount: 100.0,
        }
    }

    fn payload(amount: f64, asset: Asset) -> TransferPayload {
        TransferPayload {
            intent_id: "i-1".to_string(),
            sender: EmailAddress::parse("a@b.co").unwrap(),
            recipient: EmailAddress::parse("c@d.co").unwrap(),
            from_address: "0x1111111111111111111111111111111111111111".to_string(),
            to_address: "0x2222222222222222222222222222222222222222".to_string(),
            amount,
            asset,
            chain_id: 11_155_111,
            expires_at: Utc::now() + Duration::minutes(30),
        }
    }

    #[test]
    fn from_hex_derives_known_address() {
        let signer = LocalKeySigner::from_hex(TEST_KEY_HEX, policy()).unwrap();
        // Private key 1 → the generator point's address.
        assert_eq!(
            signer.address().to_lowercase(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn from_hex_accepts_0x_prefix_and_rejects_garbage() {
        assert!(LocalKeySigner::from_hex(&format!("0x{TEST_KEY_HEX}"), policy()).is_ok());
        assert!(LocalKeySigner::from_hex("zz", policy()).is_err());
        assert!(LocalKeySigner::from_hex("1234", policy()).is_err());
    }

    #[test]
    fn signs_a_payload_within_policy() {
        let signer = LocalKeySigner::from_hex(TEST_KEY_HEX, policy()).unwrap();
        let signed = signer.sign(&payload(10.0, Asset::Pyusd)).unwrap();
        assert_eq!(signed.payload.intent_id, "i-1");
    }

    #[test]
    fn refuses_wrong_chain() {
        let signer = LocalKeySigner::from_hex(TEST_KEY_HEX, policy()).unwrap();
        let mut p = payload(10.0, Asset::Pyusd);
        p.chain_id = 1;
        assert!(matches!(
            signer.sign(&p),
            Err(SignerError::PolicyRejected(_))
        ));
    }

    #[test]
    fn refuses_over_limit_amounts_per_asset() {
        let signer = LocalKeySigner::from_hex(TEST_KEY_HEX, policy()).unwrap();
        assert!(signer.sign(&payload(150.0, Asset::Pyusd)).is_err());
        assert!(signer.sign(&payload(0.2, Asset::Eth)).is_err());
        // At the boundary is allowed.
        assert!(signer.sign(&payload(100.0, Asset::Pyusd)).is_ok());
    }

    #[test]
    fn refuses_expired_payloads() {
        let signer = LocalKeySigner::from_hex(TEST_KEY_HEX, policy()).unwrap();
        let mut p = payload(10.0, Asset::Pyusd);
        p.expires_at = Utc::now() - Duration::seconds(1);
        assert!(matches!(
            signer.sign(&p),
            Err(SignerError::PolicyRejected(_))
        ));
    }

    #[test]
    fn refuses_non_positive_amounts() {
        let signer = LocalKeySigner::from_hex(TEST_KEY_HEX, policy()).unwrap();
        assert!(signer.sign(&payload(0.0, Asset::Pyusd)).is_err());
        assert!(signer.sign(&payload(-1.0, Asset::Pyusd)).is_err());
    }
}
