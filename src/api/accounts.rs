// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account self-service endpoints.
//!
//! The account id is always the authenticated token subject.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{Auth, Role},
    error::ApiError,
    state::AppState,
    storage::repository::Account,
};

/// Request to register the caller's account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterAccountRequest {
    /// Customer role; defaults to `USER`. `ADMIN` is refused.
    #[serde(default)]
    pub role: Option<Role>,
}

/// Request to link a ledger custody address.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkCustodyAddressRequest {
    pub address: String,
}

/// Register the caller's account.
#[utoipa::path(
    post,
    path = "/v1/accounts",
    tag = "Accounts",
    security(("bearer_auth" = [])),
    request_body = RegisterAccountRequest,
    responses(
        (status = 201, description = "Account registered", body = Account),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Role cannot be self-assigned"),
        (status = 409, description = "Account already registered")
    )
)]
pub async fn register_account(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<RegisterAccountRequest>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let role = request.role.unwrap_or_default();
    let account = state.workflows().accounts().register(&user.user_id, role)?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Get the caller's account with its compliance status.
#[utoipa::path(
    get,
    path = "/v1/accounts/me",
    tag = "Accounts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Account details", body = Account),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account not registered")
    )
)]
pub async fn get_my_account(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Account>, ApiError> {
    let account = state.workflows().accounts().get(&user.user_id)?;
    Ok(Json(account))
}

/// Submit the caller's KYC for review.
#[utoipa::path(
    post,
    path = "/v1/accounts/me/kyc",
    tag = "Accounts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "KYC submitted", body = Account),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "KYC already in review or verified")
    )
)]
pub async fn submit_kyc(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Account>, ApiError> {
    let account = state.workflows().accounts().start_kyc(&user.user_id)?;
    Ok(Json(account))
}

/// Link the ledger address that holds the caller's tokens.
#[utoipa::path(
    put,
    path = "/v1/accounts/me/custody-address",
    tag = "Accounts",
    security(("bearer_auth" = [])),
    request_body = LinkCustodyAddressRequest,
    responses(
        (status = 200, description = "Address linked", body = Account),
        (status = 400, description = "Empty address or already linked elsewhere"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn link_custody_address(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<LinkCustodyAddressRequest>,
) -> Result<Json<Account>, ApiError> {
    let account = state
        .workflows()
        .accounts()
        .link_custody_address(&user.user_id, &request.address)?;
    Ok(Json(account))
}
