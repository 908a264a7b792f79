// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet management API endpoints.
//!
//! Creation, verification-code handling, verification (which triggers the
//! resume of parked transfers), and wallet info with live chain balances.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    blockchain::Balances, directory::DirectoryError, error::ApiError, models::EmailAddress,
    state::AppState,
};

/// Request carrying just an email identity.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

/// Response after creating a wallet.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletResponse {
    pub success: bool,
    pub email: EmailAddress,
    pub address: String,
    pub message: String,
    /// Development builds only: verification code for test-domain addresses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_code: Option<String>,
}

/// Response after resending a verification code.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResendOtpResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_code: Option<String>,
}

/// Request to verify a wallet with a one-time code.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyWalletRequest {
    pub email: String,
    pub otp_code: String,
}

/// Response after a successful verification.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VerifyWalletResponse {
    pub success: bool,
    pub message: String,
}

/// Wallet info with live balances.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletInfoResponse {
    pub email: EmailAddress,
    pub address: String,
    pub verified: bool,
    pub balances: Balances,
}

fn parse_email(raw: &str) -> Result<EmailAddress, ApiError> {
    EmailAddress::parse(raw).ok_or_else(|| ApiError::bad_request("A valid email is required"))
}

/// Development builds leak the verification code back for test-domain
/// addresses so integration tests don't need a mailbox.
#[cfg(feature = "dev")]
fn dev_otp(email: &EmailAddress, otp_code: &str) -> Option<String> {
    let is_test_domain =
        email.as_str().ends_with("example.com") || email.as_str().ends_with("test.com");
    is_test_domain.then(|| otp_code.to_string())
}

#[cfg(not(feature = "dev"))]
fn dev_otp(_email: &EmailAddress, _otp_code: &str) -> Option<String> {
    None
}

/// Create a custodial wallet for an email identity.
///
/// Generates a keypair, stores the public half, and emails a verification
/// code to the owner.
#[utoipa::path(
    post,
    path = "/api/wallet/create",
    tag = "Wallet",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Wallet created", body = CreateWalletResponse),
        (status = 400, description = "Invalid email or wallet already exists")
    )
)]
pub async fn create_wallet(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<CreateWalletResponse>, ApiError> {
    let email = parse_email(&request.email)?;

    let wallet = state.directory.create(&email).map_err(|e| match e {
        DirectoryError::AlreadyExists => {
            ApiError::bad_request("Wallet already exists for this email")
        }
        other => ApiError::internal(format!("Failed to create wallet: {other}")),
    })?;

    state.notifier.wallet_created(&email, &wallet.otp_code);

    Ok(Json(CreateWalletResponse {
        success: true,
        email: wallet.email,
        address: wallet.address,
        message: "Wallet created. Please check your email for verification code.".to_string(),
        otp_code: dev_otp(&email, &wallet.otp_code),
    }))
}

/// Issue a fresh verification code for an unverified wallet.
#[utoipa::path(
    post,
    path = "/api/wallet/resend-otp",
    tag = "Wallet",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Code resent", body = ResendOtpResponse),
        (status = 400, description = "Wallet already verified"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<Json<ResendOtpResponse>, ApiError> {
    let email = parse_email(&request.email)?;

    let record = state
        .directory
        .get(&email)
        .map_err(|e| ApiError::internal(format!("Failed to access storage: {e}")))?
        .ok_or_else(|| ApiError::not_found("Wallet not found. Please create a wallet first."))?;

    if record.verified {
        return Err(ApiError::bad_request_with(
            "Wallet already verified",
            serde_json::json!({ "alreadyVerified": true }),
        ));
    }

    let otp_code = state.directory.regenerate_code(&email).map_err(|e| match e {
        DirectoryError::NotFound => ApiError::not_found("Wallet not found"),
        other => ApiError::internal(format!("Failed to regenerate code: {other}")),
    })?;

    state.notifier.wallet_created(&email, &otp_code);

    Ok(Json(ResendOtpResponse {
        success: true,
        message: "Verification code sent. Please check your email.".to_string(),
        otp_code: dev_otp(&email, &otp_code),
    }))
}

/// Verify a wallet with its one-time code.
///
/// On success, parked transfers targeting this identity are resumed before
/// the response returns, so the caller observes settled state.
#[utoipa::path(
    post,
    path = "/api/wallet/verify",
    tag = "Wallet",
    request_body = VerifyWalletRequest,
    responses(
        (status = 200, description = "Wallet verified", body = VerifyWalletResponse),
        (status = 400, description = "Invalid code")
    )
)]
pub async fn verify_wallet(
    State(state): State<AppState>,
    Json(request): Json<VerifyWalletRequest>,
) -> Result<Json<VerifyWalletResponse>, ApiError> {
    let email = parse_email(&request.email)?;

    let verified = state
        .directory
        .verify(&email, &request.otp_code)
        .map_err(|e| ApiError::internal(format!("Failed to verify wallet: {e}")))?;

    if !verified {
        return Err(ApiError::bad_request("Invalid OTP code"));
    }

    state.pipeline.resume_for_recipient(&email).await;

    Ok(Json(VerifyWalletResponse {
        success: true,
        message: "Wallet verified successfully".to_string(),
    }))
}

/// Wallet info with live ETH and PYUSD balances.
#[utoipa::path(
    get,
    path = "/api/wallet/{email}",
    tag = "Wallet",
    params(
        ("email" = String, Path, description = "Email identity")
    ),
    responses(
        (status = 200, description = "Wallet info", body = WalletInfoResponse),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(raw_email): Path<String>,
) -> Result<Json<WalletInfoResponse>, ApiError> {
    let email =
        EmailAddress::parse(&raw_email).ok_or_else(|| ApiError::not_found("Wallet not found"))?;

    let record = state
        .directory
        .get(&email)
        .map_err(|e| ApiError::internal(format!("Failed to access storage: {e}")))?
        .ok_or_else(|| ApiError::not_found("Wallet not found"))?;

    let balances = match state.balances.get(&record.address) {
        Some(cached) => cached,
        None => {
            let fresh = state.chain.get_balances(&record.address).await;
            state.balances.put(&record.address, fresh.clone());
            fresh
        }
    };

    Ok(Json(WalletInfoResponse {
        email: record.email,
        address: record.address,
        verified: record.verified,
        balances,
    }))
}

// =============================================================================
// Development-only: external key import
// =============================================================================

/// Request to import an externally held public key.
#[cfg(feature = "dev")]
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportKeyRequest {
    pub email: String,
    pub public_key: String,
}

/// Response after importing a public key.
#[cfg(feature = "dev")]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportKeyResponse {
    pub success: bool,
    pub email: EmailAddress,
    pub address: String,
    pub public_key: String,
}

/// Replace a wallet's key material with an externally held public key,
/// re-deriving the address. Development builds only.
#[cfg(feature = "dev")]
#[utoipa::path(
    post,
    path = "/api/wallet/import-key",
    tag = "Wallet",
    request_body = ImportKeyRequest,
    responses(
        (status = 200, description = "Key imported", body = ImportKeyResponse),
        (status = 400, description = "Invalid key"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn import_key(
    State(state): State<AppState>,
    Json(request): Json<ImportKeyRequest>,
) -> Result<Json<ImportKeyResponse>, ApiError> {
    let email = parse_email(&request.email)?;

    let record = state
        .directory
        .import_external_key(&email, &request.public_key)
        .map_err(|e| match e {
            DirectoryError::NotFound => ApiError::not_found("Wallet not found. Create it first."),
            DirectoryError::InvalidKey(reason) => {
                ApiError::bad_request(format!("Invalid public key: {reason}"))
            }
            other => ApiError::internal(format!("Failed to import key: {other}")),
        })?;

    Ok(Json(ImportKeyResponse {
        success: true,
        email: record.email,
        address: record.address,
        public_key: record.public_key,
    }))
}
