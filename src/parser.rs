// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Command Parser
//!
//! Turns the first line of an inbound email body into a structured transfer
//! request. The grammar is deliberately strict:
//!
//! ```text
//! SEND <amount> <ASSET> TO <email>
//! ```
//!
//! Keywords and the asset ticker are case-insensitive; the recipient address
//! is folded to lowercase. Tokens are separated by exactly one space; any
//! other spacing is a parse failure. Trailing lines (signatures, quoted
//! history) are ignored.
//!
//! Parsing is a pure function with no side effects.

use std::str::FromStr;

use crate::models::{Asset, EmailAddress};

/// Reason a command was rejected. The `Display` text is sent back to the
/// sender verbatim, so the wording stays user-facing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseRejection {
    #[error("Invalid command format. Use: SEND <amount> ETH|PYUSD TO <recipient_email>")]
    Malformed,
    #[error("Invalid amount. Must be a positive number.")]
    InvalidAmount,
    #[error("Invalid recipient email address.")]
    InvalidRecipient,
}

/// A successfully parsed transfer command.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub amount: f64,
    pub asset: Asset,
    pub recipient: EmailAddress,
    /// The cleaned first line the command was parsed from.
    pub normalized: String,
}

/// Parse an email body into a transfer command.
///
/// Only the first non-empty trimmed line is considered.
pub fn parse_command(body: &str) -> Result<ParsedCommand, ParseRejection> {
    let line = body.trim().lines().next().unwrap_or("").trim();

    let tokens: Vec<&str> = line.split(' ').collect();
    // Exactly five tokens; an empty token means doubled spacing.
    if tokens.len() != 5 || tokens.iter().any(|token| token.is_empty()) {
        return Err(ParseRejection::Malformed);
    }

    if !tokens[0].eq_ignore_ascii_case("SEND") || !tokens[3].eq_ignore_ascii_case("TO") {
        return Err(ParseRejection::Malformed);
    }

    let amount = parse_amount_token(tokens[1])?;
    let asset = Asset::from_str(tokens[2]).map_err(|_| ParseRejection::Malformed)?;

    // The grammar only requires an @-containing token; the recipient must
    // additionally pass the stricter structural check.
    if !tokens[4].contains('@') {
        return Err(ParseRejection::Malformed);
    }
    let recipient = EmailAddress::parse(tokens[4]).ok_or(ParseRejection::InvalidRecipient)?;

    Ok(ParsedCommand {
        amount,
        asset,
        recipient,
        normalized: line.to_string(),
    })
}

/// Amounts are plain decimals: `digits[.digits]`, no sign, no exponent.
/// Anything else, and any value that is not strictly positive, is an
/// amount rejection, distinct from a grammar failure.
fn parse_amount_token(token: &str) -> Result<f64, ParseRejection> {
    let mut parts = token.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let frac = parts.next();

    let digits_only = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let shape_ok = digits_only(whole) && frac.map_or(true, digits_only);
    if !shape_ok {
        return Err(ParseRejection::InvalidAmount);
    }

    let amount: f64 = token.parse().map_err(|_| ParseRejection::InvalidAmount)?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ParseRejection::InvalidAmount);
    }

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_command() {
        let parsed = parse_command("SEND 10 PYUSD TO alice@example.com").unwrap();
        assert_eq!(parsed.amount, 10.0);
        assert_eq!(parsed.asset, Asset::Pyusd);
        assert_eq!(parsed.recipient.as_str(), "alice@example.com");
        assert_eq!(parsed.normalized, "SEND 10 PYUSD TO alice@example.com");
    }

    #[test]
    fn parses_fractional_amounts_and_eth() {
        let parsed = parse_command("SEND 0.05 ETH TO bob@test.io").unwrap();
        assert_eq!(parsed.amount, 0.05);
        assert_eq!(parsed.asset, Asset::Eth);
    }

    #[test]
    fn keywords_and_asset_are_case_insensitive() {
        let parsed = parse_command("send 25.5 pyusd to Bob@Gmail.COM").unwrap();
        assert_eq!(parsed.asset, Asset::Pyusd);
        // Recipient identity is case-folded.
        assert_eq!(parsed.recipient.as_str(), "bob@gmail.com");
    }

    #[test]
    fn only_the_first_line_is_considered() {
        let body = "SEND 5 PYUSD TO carol@example.com\n\nSent from my phone\n> quoted reply";
        let parsed = parse_command(body).unwrap();
        assert_eq!(parsed.amount, 5.0);
        assert_eq!(parsed.recipient.as_str(), "carol@example.com");
    }

    #[test]
    fn extra_whitespace_between_tokens_is_malformed() {
        for bad in [
            "SEND  10 PYUSD TO a@b.co",
            "SEND 10  PYUSD TO a@b.co",
            "SEND 10 PYUSD  TO a@b.co",
            "SEND 10 PYUSD TO  a@b.co",
            "SEND\t10 PYUSD TO a@b.co",
        ] {
            assert_eq!(parse_command(bad), Err(ParseRejection::Malformed), "{bad:?}");
        }
    }

    #[test]
    fn wrong_shape_is_malformed() {
        for bad in [
            "",
            "hello",
            "SEND 10 PYUSD a@b.co",
            "SEND 10 PYUSD TO a@b.co extra",
            "PAY 10 PYUSD TO a@b.co",
            "SEND 10 DOGE TO a@b.co",
            "SEND 10 PYUSD TO nobody",
        ] {
            assert_eq!(parse_command(bad), Err(ParseRejection::Malformed), "{bad:?}");
        }
    }

    #[test]
    fn bad_amounts_get_the_amount_specific_rejection() {
        for bad in [
            "SEND 0 PYUSD TO a@b.co",
            "SEND 0.0 PYUSD TO a@b.co",
            "SEND -5 PYUSD TO a@b.co",
            "SEND abc PYUSD TO a@b.co",
            "SEND 1e5 PYUSD TO a@b.co",
            "SEND 1. PYUSD TO a@b.co",
            "SEND .5 PYUSD TO a@b.co",
            "SEND +3 PYUSD TO a@b.co",
        ] {
            assert_eq!(
                parse_command(bad),
                Err(ParseRejection::InvalidAmount),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn recipient_failing_strict_check_is_a_recipient_rejection() {
        // Loose grammar (contains @) but fails the structural email check.
        for bad in [
            "SEND 10 PYUSD TO user@domain",
            "SEND 10 PYUSD TO @example.com",
            "SEND 10 PYUSD TO user@.com",
            "SEND 10 PYUSD TO a@b@c.com",
        ] {
            assert_eq!(
                parse_command(bad),
                Err(ParseRejection::InvalidRecipient),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn amount_round_trips_exactly() {
        let parsed = parse_command("SEND 25.5 PYUSD TO a@b.co").unwrap();
        assert_eq!(parsed.amount, 25.5);

        let parsed = parse_command("SEND 100 PYUSD TO a@b.co").unwrap();
        assert_eq!(parsed.amount, 100.0);
    }
}
