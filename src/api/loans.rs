// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Loan application endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::repository::{LoanRepository, LoanRequest},
    workflows::LoanTerms,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApplyLoanRequest {
    pub collateral_grams: Decimal,
    pub requested_amount: Decimal,
}

/// Query parameters for a loan quote.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LoanTermsParams {
    pub collateral_grams: Decimal,
    /// Defaults to zero (quote the maximum only).
    pub requested_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanListResponse {
    pub loans: Vec<LoanRequest>,
    pub total: usize,
}

/// Apply for a silver-collateralised loan.
#[utoipa::path(
    post,
    path = "/v1/loans",
    tag = "Loans",
    security(("bearer_auth" = [])),
    request_body = ApplyLoanRequest,
    responses(
        (status = 201, description = "Application filed", body = LoanRequest),
        (status = 400, description = "Invalid amounts or LTV cap exceeded"),
        (status = 403, description = "Compliance check failed")
    )
)]
pub async fn apply_loan(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<ApplyLoanRequest>,
) -> Result<(StatusCode, Json<LoanRequest>), ApiError> {
    let loan = state.workflows().loans().apply(
        &user.user_id,
        request.collateral_grams,
        request.requested_amount,
    )?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// List the caller's loans, newest first.
#[utoipa::path(
    get,
    path = "/v1/loans",
    tag = "Loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Loans", body = LoanListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_loans(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<LoanListResponse>, ApiError> {
    let loans = LoanRepository::new(state.db()).list_for_owner(&user.user_id)?;
    let total = loans.len();
    Ok(Json(LoanListResponse { loans, total }))
}

/// Quote loan terms at the current reference price.
#[utoipa::path(
    get,
    path = "/v1/loans/terms",
    tag = "Loans",
    security(("bearer_auth" = [])),
    params(LoanTermsParams),
    responses(
        (status = 200, description = "Loan terms", body = LoanTerms),
        (status = 400, description = "Invalid amounts")
    )
)]
pub async fn loan_terms(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Query(params): Query<LoanTermsParams>,
) -> Result<Json<LoanTerms>, ApiError> {
    let terms = state.workflows().loans().terms(
        params.collateral_grams,
        params.requested_amount.unwrap_or(Decimal::ZERO),
    )?;
    Ok(Json(terms))
}
