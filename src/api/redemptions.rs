// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::repository::{RedemptionRepository, RedemptionRequest},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitRedemptionRequest {
    /// Token quantity (grams) to redeem.
    pub quantity: Decimal,
    /// Where the physical silver is delivered.
    pub delivery_address: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RedemptionListResponse {
    pub redemptions: Vec<RedemptionRequest>,
    pub total: usize,
}

/// Request physical redemption of tokens.
#[utoipa::path(
    post,
    path = "/v1/redemptions",
    tag = "Redemptions",
    security(("bearer_auth" = [])),
    request_body = SubmitRedemptionRequest,
    responses(
        (status = 201, description = "Redemption requested", body = RedemptionRequest),
        (status = 400, description = "Invalid quantity or address"),
        (status = 403, description = "Compliance check failed"),
        (status = 422, description = "Insufficient token balance"),
        (status = 502, description = "Ledger unavailable")
    )
)]
pub async fn submit_redemption(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<SubmitRedemptionRequest>,
) -> Result<(StatusCode, Json<RedemptionRequest>), ApiError> {
    let redemption = state
        .workflows()
        .redemptions()
        .submit(&user.user_id, request.quantity, &request.delivery_address)
        .await?;
    Ok((StatusCode::CREATED, Json(redemption)))
}

/// List the caller's redemptions, newest first.
#[utoipa::path(
    get,
    path = "/v1/redemptions",
    tag = "Redemptions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Redemptions", body = RedemptionListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_redemptions(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<RedemptionListResponse>, ApiError> {
    let redemptions = RedemptionRepository::new(state.db()).list_for_owner(&user.user_id)?;
    let total = redemptions.len();
    Ok(Json(RedemptionListResponse { redemptions, total }))
}
