// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trade intent and trade endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::repository::{IntentSide, Trade, TradeIntent, TradingRepository},
    workflows::trading::MatchOutcome,
};

/// Request to place a limit order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitIntentRequest {
    pub side: IntentSide,
    pub quantity: Decimal,
    pub limit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IntentListResponse {
    pub intents: Vec<TradeIntent>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TradeListResponse {
    pub trades: Vec<Trade>,
    pub total: usize,
}

/// Result of a match attempt.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchResponse {
    /// Whether a counter-intent was found and settled.
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade: Option<Trade>,
}

/// Submit a trade intent.
#[utoipa::path(
    post,
    path = "/v1/trading/intents",
    tag = "Trading",
    security(("bearer_auth" = [])),
    request_body = SubmitIntentRequest,
    responses(
        (status = 201, description = "Intent accepted", body = TradeIntent),
        (status = 400, description = "Invalid quantity or price"),
        (status = 403, description = "Compliance check failed"),
        (status = 422, description = "Insufficient token balance"),
        (status = 502, description = "Ledger unavailable")
    )
)]
pub async fn submit_intent(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<SubmitIntentRequest>,
) -> Result<(StatusCode, Json<TradeIntent>), ApiError> {
    let intent = state
        .workflows()
        .trading()
        .submit_intent(
            &user.user_id,
            request.side,
            request.quantity,
            request.limit_price,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

/// List the caller's trade intents, newest first.
#[utoipa::path(
    get,
    path = "/v1/trading/intents",
    tag = "Trading",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Trade intents", body = IntentListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_intents(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<IntentListResponse>, ApiError> {
    let intents = TradingRepository::new(state.db()).list_intents(&user.user_id)?;
    let total = intents.len();
    Ok(Json(IntentListResponse { intents, total }))
}

/// Cancel a pending intent.
#[utoipa::path(
    delete,
    path = "/v1/trading/intents/{intent_id}",
    tag = "Trading",
    security(("bearer_auth" = [])),
    params(
        ("intent_id" = String, Path, description = "Trade intent ID")
    ),
    responses(
        (status = 200, description = "Intent cancelled", body = TradeIntent),
        (status = 403, description = "Not your intent"),
        (status = 404, description = "Intent not found"),
        (status = 409, description = "Intent is no longer pending")
    )
)]
pub async fn cancel_intent(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> Result<Json<TradeIntent>, ApiError> {
    let intent = state
        .workflows()
        .trading()
        .cancel_intent(&user.user_id, &intent_id)?;
    Ok(Json(intent))
}

/// Match a pending intent against the book and settle it.
#[utoipa::path(
    post,
    path = "/v1/trading/intents/{intent_id}/match",
    tag = "Trading",
    security(("bearer_auth" = [])),
    params(
        ("intent_id" = String, Path, description = "Trade intent ID")
    ),
    responses(
        (status = 200, description = "Match attempted", body = MatchResponse),
        (status = 403, description = "Not your intent or compliance check failed"),
        (status = 409, description = "Intent already settling, settled or expired"),
        (status = 502, description = "Ledger transfer failed")
    )
)]
pub async fn match_intent(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> Result<Json<MatchResponse>, ApiError> {
    let outcome = state
        .workflows()
        .trading()
        .match_and_execute(&user.user_id, &intent_id)
        .await?;
    let response = match outcome {
        MatchOutcome::Executed(trade) => MatchResponse {
            matched: true,
            trade: Some(trade),
        },
        MatchOutcome::NoMatch => MatchResponse {
            matched: false,
            trade: None,
        },
    };
    Ok(Json(response))
}

/// List trades the caller took part in, newest first.
#[utoipa::path(
    get,
    path = "/v1/trading/trades",
    tag = "Trading",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Trades", body = TradeListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_trades(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<TradeListResponse>, ApiError> {
    let trades = TradingRepository::new(state.db()).list_trades(&user.user_id)?;
    let total = trades.len();
    Ok(Json(TradeListResponse { trades, total }))
}
