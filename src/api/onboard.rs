// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recipient onboarding endpoint.
//!
//! Recipients of parked transfers follow a tokenized link; this endpoint
//! decodes the token and creates their wallet. Verification, and with it
//! the resume of the waiting transfer, happens afterwards through
//! `POST /api/wallet/verify`.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    directory::DirectoryError, error::ApiError, models::EmailAddress, state::AppState, token,
};

/// Request carrying an onboarding token.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OnboardRequest {
    pub token: String,
}

/// Onboarding outcome.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnboardResponse {
    pub success: bool,
    pub email: EmailAddress,
    /// Set when the identity already had a wallet; nothing was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// The transfer intent that triggered this onboarding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Redeem an onboarding token: create the invited identity's wallet.
///
/// Short-circuits when the wallet already exists (a re-clicked link is not
/// an error).
#[utoipa::path(
    post,
    path = "/api/onboard",
    tag = "Onboarding",
    request_body = OnboardRequest,
    responses(
        (status = 200, description = "Wallet created or already present", body = OnboardResponse),
        (status = 400, description = "Invalid token")
    )
)]
pub async fn onboard(
    State(state): State<AppState>,
    Json(request): Json<OnboardRequest>,
) -> Result<Json<OnboardResponse>, ApiError> {
    let decoded = token::decode(&request.token).ok_or_else(|| ApiError::bad_request("Invalid token"))?;

    // The token embeds a normalized address, but it travels through mail
    // clients and query strings, so re-validate rather than trust it.
    let email = EmailAddress::parse(decoded.email.as_str())
        .ok_or_else(|| ApiError::bad_request("Invalid token"))?;

    let exists = state
        .directory
        .exists(&email)
        .map_err(|e| ApiError::internal(format!("Failed to access storage: {e}")))?;
    if exists {
        return Ok(Json(OnboardResponse {
            success: true,
            email,
            already_exists: Some(true),
            address: None,
            intent_id: None,
            message: None,
        }));
    }

    let wallet = state.directory.create(&email).map_err(|e| match e {
        DirectoryError::AlreadyExists => ApiError::bad_request("Wallet already exists for this email"),
        other => ApiError::internal(format!("Failed to create wallet: {other}")),
    })?;

    state.notifier.wallet_created(&email, &wallet.otp_code);

    Ok(Json(OnboardResponse {
        success: true,
        email: wallet.email,
        already_exists: None,
        address: Some(wallet.address),
        intent_id: Some(decoded.intent_id),
        message: Some("Wallet created. Please check your email for verification code.".to_string()),
    }))
}
