// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity / Wallet Directory
//!
//! Maps email identities to custodial wallet records: public key, derived
//! EVM address, and verification state. Creation generates a fresh
//! secp256k1 keypair and records only the public half; spendable key
//! material is owned exclusively by the signing backend.
//!
//! Address derivation is the standard Ethereum scheme:
//!
//! 1. Take the uncompressed public key (65 bytes: `0x04 || x || y`)
//! 2. keccak256 the 64-byte body (without the `0x04` prefix)
//! 3. The address is the last 20 bytes of the hash, hex with `0x` prefix
//!
//! Derivation is pure (no network access) so it is independently testable.

use alloy::primitives::keccak256;
use chrono::Utc;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::rand_core::{OsRng, RngCore};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use std::sync::Arc;

use crate::models::{EmailAddress, IdentityRecord};
use crate::storage::{PaymentDb, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Wallet already exists for this email")]
    AlreadyExists,

    #[error("Wallet not found")]
    NotFound,

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A freshly created wallet, including the one-time verification code the
/// caller must deliver to the owner. Never persisted in this shape.
#[derive(Debug, Clone)]
pub struct NewWallet {
    pub email: EmailAddress,
    pub address: String,
    pub public_key: String,
    pub otp_code: String,
}

/// Wallet directory backed by the payment database.
#[derive(Clone)]
pub struct WalletDirectory {
    db: Arc<PaymentDb>,
}

impl WalletDirectory {
    pub fn new(db: Arc<PaymentDb>) -> Self {
        Self { db }
    }

    /// Create an unverified wallet record for an email identity.
    ///
    /// Fails with [`DirectoryError::AlreadyExists`] if the identity already
    /// has a record. Records are never deleted, so creation is one-shot.
    pub fn create(&self, email: &EmailAddress) -> Result<NewWallet, DirectoryError> {
        let (public_key, address) = generate_keypair();
        let otp_code = generate_code();

        let record = IdentityRecord {
            email: email.clone(),
            public_key: public_key.clone(),
            address: address.clone(),
            otp_code: otp_code.clone(),
            verified: false,
            created_at: Utc::now(),
            verified_at: None,
        };

        self.db.create_identity(&record).map_err(|e| match e {
            StoreError::AlreadyExists(_) => DirectoryError::AlreadyExists,
            other => DirectoryError::Store(other),
        })?;

        tracing::info!(email = %email, address = %address, "Wallet created");

        Ok(NewWallet {
            email: email.clone(),
            address,
            public_key,
            otp_code,
        })
    }

    /// Look up a wallet record.
    pub fn get(&self, email: &EmailAddress) -> Result<Option<IdentityRecord>, StoreError> {
        self.db.get_identity(email)
    }

    /// Whether a record exists for this identity.
    pub fn exists(&self, email: &EmailAddress) -> Result<bool, StoreError> {
        Ok(self.db.get_identity(email)?.is_some())
    }

    /// Attempt to verify a wallet with a one-time code.
    ///
    /// Returns the same `false` for an unknown email and for a wrong code;
    /// the caller cannot distinguish the two, which keeps this path from
    /// confirming which identities hold wallets. The verified flag only ever
    /// moves false→true.
    pub fn verify(&self, email: &EmailAddress, otp_code: &str) -> Result<bool, StoreError> {
        let Some(mut record) = self.db.get_identity(email)? else {
            return Ok(false);
        };

        if record.otp_code != otp_code {
            return Ok(false);
        }

        if !record.verified {
            record.verified = true;
            record.verified_at = Some(Utc::now());
            self.db.update_identity(&record)?;
            tracing::info!(email = %email, "Wallet verified");
        }
        Ok(true)
    }

    /// Whether the identity exists and has completed verification.
    ///
    /// Unknown identities read as unverified; this path never errors on a
    /// missing record.
    pub fn is_verified(&self, email: &EmailAddress) -> bool {
        match self.db.get_identity(email) {
            Ok(Some(record)) => record.verified,
            Ok(None) => false,
            Err(e) => {
                tracing::error!(email = %email, error = %e, "Verification lookup failed");
                false
            }
        }
    }

    /// Replace the one-time verification code for an unverified wallet.
    pub fn regenerate_code(&self, email: &EmailAddress) -> Result<String, DirectoryError> {
        let Some(mut record) = self.db.get_identity(email)? else {
            return Err(DirectoryError::NotFound);
        };

        let otp_code = generate_code();
        record.otp_code = otp_code.clone();
        self.db.update_identity(&record)?;
        Ok(otp_code)
    }

    /// Import an externally held public key, re-deriving the address.
    ///
    /// Accepts compressed or uncompressed SEC1 hex, with or without a `0x`
    /// prefix; the stored form is always uncompressed.
    pub fn import_external_key(
        &self,
        email: &EmailAddress,
        public_key_hex: &str,
    ) -> Result<IdentityRecord, DirectoryError> {
        let Some(mut record) = self.db.get_identity(email)? else {
            return Err(DirectoryError::NotFound);
        };

        let normalized = normalize_public_key(public_key_hex)?;
        let address = derive_address(&normalized)?;

        record.public_key = normalized;
        record.address = address.clone();
        self.db.update_identity(&record)?;

        tracing::info!(email = %email, address = %address, "Imported external key");
        Ok(record)
    }
}

/// Derive the EVM address from an uncompressed SEC1 public key (hex).
pub fn derive_address(public_key_hex: &str) -> Result<String, DirectoryError> {
    let stripped = public_key_hex.trim_start_matches("0x");
    let bytes = alloy::hex::decode(stripped)
        .map_err(|e| DirectoryError::InvalidKey(e.to_string()))?;

    if bytes.len() != 65 || bytes[0] != 0x04 {
        return Err(DirectoryError::InvalidKey(
            "expected 65-byte uncompressed SEC1 key".to_string(),
        ));
    }

    let hash = keccak256(&bytes[1..]);
    Ok(format!("0x{}", alloy::hex::encode(&hash[12..])))
}

/// Canonicalize a SEC1 public key to uncompressed 0x-hex, decompressing if
/// needed.
fn normalize_public_key(public_key_hex: &str) -> Result<String, DirectoryError> {
    let stripped = public_key_hex.trim_start_matches("0x");
    let bytes = alloy::hex::decode(stripped)
        .map_err(|e| DirectoryError::InvalidKey(e.to_string()))?;

    let key = PublicKey::from_sec1_bytes(&bytes)
        .map_err(|e| DirectoryError::InvalidKey(e.to_string()))?;
    let uncompressed = key.to_encoded_point(false);
    Ok(format!("0x{}", alloy::hex::encode(uncompressed.as_bytes())))
}

/// Generate a secp256k1 keypair and return (uncompressed public key hex,
/// derived address). The private scalar is dropped here; custody belongs
/// to the signing backend.
fn generate_keypair() -> (String, String) {
    let signing_key = SigningKey::random(&mut OsRng);
    let verifying_key = signing_key.verifying_key();

    let uncompressed = verifying_key.to_encoded_point(false);
    let public_key = format!("0x{}", alloy::hex::encode(uncompressed.as_bytes()));

    let hash = keccak256(&uncompressed.as_bytes()[1..]);
    let address = format!("0x{}", alloy::hex::encode(&hash[12..]));

    (public_key, address)
}

/// Six-digit verification code without leading zeros.
fn generate_code() -> String {
    (100_000 + OsRng.next_u32() % 900_000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The secp256k1 generator point is the public key of private key 1;
    /// its well-known Ethereum address pins the derivation scheme.
    const GENERATOR_PUBKEY: &str = "0x0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";
    const GENERATOR_ADDRESS: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

    fn test_directory() -> (WalletDirectory, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = PaymentDb::open(&dir.path().join("test.redb")).unwrap();
        (WalletDirectory::new(Arc::new(db)), dir)
    }

    fn email(raw: &str) -> EmailAddress {
        EmailAddress::parse(raw).unwrap()
    }

    #[test]
    fn derive_address_matches_known_vector() {
        assert_eq!(derive_address(GENERATOR_PUBKEY).unwrap(), GENERATOR_ADDRESS);
        // Prefix-less input works too.
        assert_eq!(
            derive_address(&GENERATOR_PUBKEY[2..]).unwrap(),
            GENERATOR_ADDRESS
        );
    }

    #[test]
    fn derive_address_rejects_bad_keys() {
        assert!(derive_address("0x1234").is_err());
        assert!(derive_address("not hex").is_err());
        // Wrong SEC1 tag byte.
        let mut bad = GENERATOR_PUBKEY.to_string();
        bad.replace_range(2..4, "05");
        assert!(derive_address(&bad).is_err());
    }

    #[test]
    fn create_produces_consistent_record() {
        let (directory, _dir) = test_directory();
        let wallet = directory.create(&email("a@b.co")).unwrap();

        assert!(wallet.address.starts_with("0x"));
        assert_eq!(wallet.address.len(), 42);
        assert_eq!(wallet.otp_code.len(), 6);
        // The stored address must be re-derivable from the stored key.
        assert_eq!(derive_address(&wallet.public_key).unwrap(), wallet.address);

        let record = directory.get(&email("a@b.co")).unwrap().unwrap();
        assert_eq!(record.address, wallet.address);
        assert!(!record.verified);
    }

    #[test]
    fn create_twice_fails() {
        let (directory, _dir) = test_directory();
        directory.create(&email("a@b.co")).unwrap();
        assert!(matches!(
            directory.create(&email("a@b.co")),
            Err(DirectoryError::AlreadyExists)
        ));
    }

    #[test]
    fn verify_is_uniform_for_unknown_and_wrong_code() {
        let (directory, _dir) = test_directory();
        let wallet = directory.create(&email("a@b.co")).unwrap();

        // Unknown email and wrong code are indistinguishable.
        assert!(!directory.verify(&email("ghost@x.co"), "123456").unwrap());
        assert!(!directory.verify(&email("a@b.co"), "000000").unwrap());
        assert!(!directory.is_verified(&email("a@b.co")));

        assert!(directory.verify(&email("a@b.co"), &wallet.otp_code).unwrap());
        assert!(directory.is_verified(&email("a@b.co")));

        let record = directory.get(&email("a@b.co")).unwrap().unwrap();
        assert!(record.verified_at.is_some());
    }

    #[test]
    fn verified_flag_is_monotonic() {
        let (directory, _dir) = test_directory();
        let wallet = directory.create(&email("a@b.co")).unwrap();
        directory.verify(&email("a@b.co"), &wallet.otp_code).unwrap();

        // A wrong code afterwards does not unverify.
        assert!(!directory.verify(&email("a@b.co"), "000000").unwrap());
        assert!(directory.is_verified(&email("a@b.co")));

        // Re-verifying with the right code stays true.
        assert!(directory.verify(&email("a@b.co"), &wallet.otp_code).unwrap());
        assert!(directory.is_verified(&email("a@b.co")));
    }

    #[test]
    fn is_verified_defaults_false_for_unknown() {
        let (directory, _dir) = test_directory();
        assert!(!directory.is_verified(&email("nobody@x.co")));
    }

    #[test]
    fn regenerate_code_replaces_the_code() {
        let (directory, _dir) = test_directory();
        assert!(matches!(
            directory.regenerate_code(&email("ghost@x.co")),
            Err(DirectoryError::NotFound)
        ));

        let wallet = directory.create(&email("a@b.co")).unwrap();
        let new_code = directory.regenerate_code(&email("a@b.co")).unwrap();
        assert_eq!(new_code.len(), 6);

        // Old code no longer verifies (unless the 1-in-900000 collision hit).
        if new_code != wallet.otp_code {
            assert!(!directory.verify(&email("a@b.co"), &wallet.otp_code).unwrap());
        }
        assert!(directory.verify(&email("a@b.co"), &new_code).unwrap());
    }

    #[test]
    fn import_external_key_rederives_address() {
        let (directory, _dir) = test_directory();
        assert!(matches!(
            directory.import_external_key(&email("ghost@x.co"), GENERATOR_PUBKEY),
            Err(DirectoryError::NotFound)
        ));

        directory.create(&email("a@b.co")).unwrap();
        let record = directory
            .import_external_key(&email("a@b.co"), GENERATOR_PUBKEY)
            .unwrap();
        assert_eq!(record.address, GENERATOR_ADDRESS);

        // Compressed form of the same key yields the same address.
        let compressed = "0x0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        let record = directory
            .import_external_key(&email("a@b.co"), compressed)
            .unwrap();
        assert_eq!(record.address, GENERATOR_ADDRESS);
        assert_eq!(record.public_key.to_lowercase(), GENERATOR_PUBKEY);
    }

    #[test]
    fn import_rejects_garbage_keys() {
        let (directory, _dir) = test_directory();
        directory.create(&email("a@b.co")).unwrap();
        assert!(matches!(
            directory.import_external_key(&email("a@b.co"), "0xdeadbeef"),
            Err(DirectoryError::InvalidKey(_))
        ));
    }
}
