// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    blockchain::Balances,
    models::{Asset, EmailAddress, IntentStatus, SettlementReceipt, TransferIntent},
    state::AppState,
};

pub mod health;
pub mod onboard;
pub mod transactions;
pub mod wallet;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/wallet/create", post(wallet::create_wallet))
        .route("/wallet/resend-otp", post(wallet::resend_otp))
        .route("/wallet/verify", post(wallet::verify_wallet))
        .route("/wallet/{email}", get(wallet::get_wallet))
        .route("/onboard", post(onboard::onboard))
        .route("/transaction/{intent_id}", get(transactions::get_transaction));

    #[cfg(feature = "dev")]
    let api_routes = api_routes
        .route("/wallet/import-key", post(wallet::import_key))
        .route("/tx/send", post(transactions::send_direct))
        .route("/inbox", post(transactions::inject_message));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        wallet::create_wallet,
        wallet::resend_otp,
        wallet::verify_wallet,
        wallet::get_wallet,
        onboard::onboard,
        transactions::get_transaction
    ),
    components(
        schemas(
            EmailAddress,
            Asset,
            IntentStatus,
            SettlementReceipt,
            TransferIntent,
            Balances,
            health::HealthResponse,
            wallet::EmailRequest,
            wallet::CreateWalletResponse,
            wallet::ResendOtpResponse,
            wallet::VerifyWalletRequest,
            wallet::VerifyWalletResponse,
            wallet::WalletInfoResponse,
            onboard::OnboardRequest,
            onboard::OnboardResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Wallet", description = "Wallet creation and verification"),
        (name = "Onboarding", description = "Tokenized recipient onboarding"),
        (name = "Transactions", description = "Transfer records")
    )
)]
struct ApiDoc;
