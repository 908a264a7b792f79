// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Onboarding Token Codec
//!
//! Reversible encoding of `{email, intentId, issuedAt}` used to correlate an
//! onboarding link with the transfer that triggered it. The token is plain
//! unpadded base64 over JSON: a convenience correlation key, NOT a security
//! boundary. It carries no signature or MAC; anyone can mint one. Hardening
//! it would change the wire contract, so the weakness stays documented here
//! instead.

use base64ct::{Base64Unpadded, Encoding};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::EmailAddress;

/// Payload carried by an onboarding token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingToken {
    pub email: EmailAddress,
    pub intent_id: String,
    /// Millisecond unix timestamp the token was minted at.
    pub issued_at: i64,
}

/// Encode an onboarding token for the given identity and intent.
pub fn encode(email: &EmailAddress, intent_id: &str) -> String {
    let payload = OnboardingToken {
        email: email.clone(),
        intent_id: intent_id.to_string(),
        issued_at: Utc::now().timestamp_millis(),
    };
    // Serializing a concrete struct cannot fail.
    let json = serde_json::to_vec(&payload).expect("token payload serializes");
    Base64Unpadded::encode_string(&json)
}

/// Decode a token back into its payload.
///
/// Returns `None` on any malformed input (bad base64, bad JSON, missing
/// fields) and never panics.
pub fn decode(token: &str) -> Option<OnboardingToken> {
    let bytes = Base64Unpadded::decode_vec(token).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(raw: &str) -> EmailAddress {
        EmailAddress::parse(raw).unwrap()
    }

    #[test]
    fn round_trips_email_and_intent_id() {
        let token = encode(&email("new.user@example.com"), "intent-42");
        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.email.as_str(), "new.user@example.com");
        assert_eq!(decoded.intent_id, "intent-42");
        assert!(decoded.issued_at > 0);
    }

    #[test]
    fn token_has_no_padding() {
        let token = encode(&email("a@b.co"), "x");
        assert!(!token.contains('='));
    }

    #[test]
    fn corrupted_tokens_decode_to_none() {
        let token = encode(&email("a@b.co"), "intent-1");

        // Truncation.
        assert!(decode(&token[..token.len() / 2]).is_none());
        // Corruption.
        let mut corrupted = token.clone();
        corrupted.replace_range(0..2, "!!");
        assert!(decode(&corrupted).is_none());
        // Valid base64, invalid JSON.
        assert!(decode(&Base64Unpadded::encode_string(b"not json")).is_none());
        // Valid JSON, wrong shape.
        assert!(decode(&Base64Unpadded::encode_string(b"{\"email\":1}")).is_none());
        // Empty.
        assert!(decode("").is_none());
    }

    #[test]
    fn decodes_externally_minted_unpadded_tokens() {
        // base64(JSON) with '=' stripped, standard alphabet.
        use base64::Engine;
        let json = r#"{"email":"a@b.co","intentId":"t-1","issuedAt":1700000000000}"#;
        let legacy = base64::engine::general_purpose::STANDARD
            .encode(json)
            .trim_end_matches('=')
            .to_string();

        let decoded = decode(&legacy).unwrap();
        assert_eq!(decoded.email.as_str(), "a@b.co");
        assert_eq!(decoded.intent_id, "t-1");
    }
}
