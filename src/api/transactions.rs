// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfer record lookup and (development builds) direct triggers that
//! bypass the email transport while still going through policy and the
//! settlement pipeline.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::ApiError, models::TransferIntent, state::AppState};

/// Fetch a stored transfer record by intent id.
#[utoipa::path(
    get,
    path = "/api/transaction/{intent_id}",
    tag = "Transactions",
    params(
        ("intent_id" = String, Path, description = "Transfer intent id")
    ),
    responses(
        (status = 200, description = "Stored transfer record", body = TransferIntent),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> Result<Json<TransferIntent>, ApiError> {
    let intent = state
        .db
        .get_transaction(&intent_id)
        .map_err(|e| ApiError::internal(format!("Failed to access storage: {e}")))?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;

    Ok(Json(intent))
}

// =============================================================================
// Development-only surfaces
// =============================================================================

#[cfg(feature = "dev")]
pub use dev::{inject_message, send_direct};

#[cfg(feature = "dev")]
mod dev {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::str::FromStr;
    use utoipa::ToSchema;

    use crate::inbox::InboundMessage;
    use crate::models::{Asset, EmailAddress};

    /// Direct transfer trigger, skipping the email transport.
    #[derive(Debug, Clone, Deserialize, ToSchema)]
    #[serde(rename_all = "camelCase")]
    pub struct SendDirectRequest {
        pub sender_email: String,
        pub recipient_email: String,
        pub amount: f64,
        /// Defaults to ETH like the original dev trigger.
        pub asset: Option<String>,
    }

    /// Acceptance response; settlement continues in the background and is
    /// observable via `GET /api/transaction/{intentId}`.
    #[derive(Debug, Clone, Serialize, ToSchema)]
    #[serde(rename_all = "camelCase")]
    pub struct SendDirectResponse {
        pub accepted: bool,
        pub intent_id: String,
        pub asset: Asset,
        pub amount: f64,
    }

    /// Trigger a transfer directly. Policy and verification checks still
    /// apply; only the command parser is bypassed. Development builds only.
    #[utoipa::path(
        post,
        path = "/api/tx/send",
        tag = "Transactions",
        request_body = SendDirectRequest,
        responses(
            (status = 200, description = "Transfer accepted for execution", body = SendDirectResponse),
            (status = 400, description = "Policy violation or unverified party")
        )
    )]
    pub async fn send_direct(
        State(state): State<AppState>,
        Json(request): Json<SendDirectRequest>,
    ) -> Result<Json<SendDirectResponse>, ApiError> {
        let sender = EmailAddress::parse(&request.sender_email)
            .ok_or_else(|| ApiError::bad_request("A valid senderEmail is required"))?;
        let recipient = EmailAddress::parse(&request.recipient_email)
            .ok_or_else(|| ApiError::bad_request("A valid recipientEmail is required"))?;

        if !request.amount.is_finite() || request.amount <= 0.0 {
            return Err(ApiError::bad_request("amount must be a positive number"));
        }

        let asset_raw = request.asset.as_deref().unwrap_or("ETH");
        let asset = Asset::from_str(asset_raw)
            .map_err(|_| ApiError::bad_request(format!("Unsupported asset: {asset_raw}")))?;

        let spend = state
            .db
            .daily_spend(&sender, asset, Utc::now().date_naive())
            .map_err(|e| ApiError::internal(format!("Failed to access storage: {e}")))?;
        let check = state.policy.validate(request.amount, spend, asset);
        if !check.is_valid() {
            return Err(ApiError::bad_request(check.violations.join(", ")));
        }

        if !state.directory.is_verified(&sender) {
            return Err(ApiError::bad_request("Sender wallet not verified"));
        }
        if !state.directory.is_verified(&recipient) {
            return Err(ApiError::bad_request(
                "Recipient wallet not verified. Please onboard/verify first.",
            ));
        }

        let intent = state
            .policy
            .build_intent(sender, recipient, request.amount, asset);
        let intent_id = intent.intent_id.clone();

        // Detached execution with a persisted terminal outcome.
        let _handle = state.pipeline.spawn_execute(intent);

        Ok(Json(SendDirectResponse {
            accepted: true,
            intent_id,
            asset,
            amount: request.amount,
        }))
    }

    /// Injected inbound message, shaped like what a mail poller would push.
    #[derive(Debug, Clone, Deserialize, ToSchema)]
    #[serde(rename_all = "camelCase")]
    pub struct InjectMessageRequest {
        pub id: String,
        pub from: String,
        pub body: String,
        pub thread_id: Option<String>,
    }

    #[derive(Debug, Clone, Serialize, ToSchema)]
    pub struct InjectMessageResponse {
        pub accepted: bool,
    }

    /// Push a message into the inbound feed, exercising the full intake →
    /// parse → settle path. Development builds only.
    #[utoipa::path(
        post,
        path = "/api/inbox",
        tag = "Transactions",
        request_body = InjectMessageRequest,
        responses(
            (status = 200, description = "Message queued", body = InjectMessageResponse),
            (status = 503, description = "Intake not running")
        )
    )]
    pub async fn inject_message(
        State(state): State<AppState>,
        Json(request): Json<InjectMessageRequest>,
    ) -> Result<Json<InjectMessageResponse>, ApiError> {
        state
            .feed
            .send(InboundMessage {
                id: request.id,
                from: request.from,
                body: request.body,
                thread_id: request.thread_id,
            })
            .map_err(|_| ApiError::unavailable("Message intake is not running"))?;

        Ok(Json(InjectMessageResponse { accepted: true }))
    }
}
