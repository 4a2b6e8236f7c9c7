// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mint request endpoints for account holders.

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
    storage::repository::{CustodyRepository, MintRequest},
    workflows::minting::MintQuote,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InitiateMintRequest {
    /// Grams of custody silver to tokenize.
    pub grams: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MintListResponse {
    pub mints: Vec<MintRequest>,
    pub total: usize,
}

/// Reserve custody silver and lock the current price.
#[utoipa::path(
    post,
    path = "/v1/mint",
    tag = "Mint",
    security(("bearer_auth" = [])),
    request_body = InitiateMintRequest,
    responses(
        (status = 201, description = "Mint requested", body = MintQuote),
        (status = 400, description = "Invalid amount or no custody address"),
        (status = 403, description = "Compliance check failed"),
        (status = 409, description = "Minting is paused"),
        (status = 422, description = "No custody asset large enough")
    )
)]
pub async fn initiate_mint(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<InitiateMintRequest>,
) -> Result<(StatusCode, Json<MintQuote>), ApiError> {
    let quote = state
        .workflows()
        .minting()
        .initiate(&user.user_id, request.grams)?;
    Ok((StatusCode::CREATED, Json(quote)))
}

/// List the caller's mint requests, newest first.
#[utoipa::path(
    get,
    path = "/v1/mint",
    tag = "Mint",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Mint requests", body = MintListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_mints(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<MintListResponse>, ApiError> {
    let mints = CustodyRepository::new(state.db()).list_mints(&user.user_id)?;
    let total = mints.len();
    Ok(Json(MintListResponse { mints, total }))
}

/// Replace an expired price lock with one at the current price.
#[utoipa::path(
    post,
    path = "/v1/mint/{mint_id}/price-lock",
    tag = "Mint",
    security(("bearer_auth" = [])),
    params(
        ("mint_id" = String, Path, description = "Mint request ID")
    ),
    responses(
        (status = 200, description = "Price lock renewed", body = MintQuote),
        (status = 403, description = "Not your mint request"),
        (status = 404, description = "Mint request not found"),
        (status = 409, description = "Mint request is no longer REQUESTED")
    )
)]
pub async fn renew_price_lock(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(mint_id): Path<String>,
) -> Result<Json<MintQuote>, ApiError> {
    let quote = state
        .workflows()
        .minting()
        .renew_price_lock(&user.user_id, &mint_id)?;
    Ok(Json(quote))
}
