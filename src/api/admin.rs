// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require an admin token and provide:
//! - KYC review and AML screening outcomes
//! - Vault inventory, reference price and the mint pause switch
//! - Mint, redemption and loan approvals
//! - Supply reconciliation and audit trail queries
//!
//! The workflows re-check the acting account's stored role, so a token
//! minted for a demoted admin is refused there too.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::AdminOnly,
    error::ApiError,
    state::AppState,
    storage::{
        repository::{
            Account, AmlStatus, CustodyAsset, CustodyRepository, LoanRepository, LoanRequest,
            MintRequest, RedemptionRepository, RedemptionRequest,
        },
        AuditAction, AuditQuery, AuditRecord, AuditRepository,
    },
    workflows::ReconciliationReport,
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// KYC review decision.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KycDecisionRequest {
    /// `true` verifies the account, `false` rejects it.
    pub approve: bool,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AmlStatusRequest {
    pub status: AmlStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterAssetRequest {
    pub vault_id: String,
    pub weight_grams: Decimal,
    /// Fineness in (0, 1], e.g. `0.999`.
    pub purity: Decimal,
}

/// Every registered asset plus what is still free to back a mint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VaultAssetsResponse {
    pub assets: Vec<CustodyAsset>,
    pub total: usize,
    pub available_count: usize,
    pub available_grams: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReferencePriceRequest {
    pub price_per_gram: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReferencePriceResponse {
    pub price_per_gram: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MintPauseRequest {
    pub paused: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MintPauseResponse {
    pub paused: bool,
}

/// Free-text reason attached to a rejection or liquidation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoanApprovalRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DispatchRequest {
    pub tracking_number: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RedemptionQueueResponse {
    pub redemptions: Vec<RedemptionRequest>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PendingLoansResponse {
    pub loans: Vec<LoanRequest>,
    pub total: usize,
}

/// Query parameters for audit trail queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Filter by acting account.
    pub actor_id: Option<String>,
    /// Filter by the affected record id.
    pub reference_id: Option<String>,
    /// Filter by action name, e.g. `TRADE_EXECUTED`.
    pub action: Option<String>,
    /// Maximum number of results (default 100).
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Records matching the query, newest first.
    pub records: Vec<AuditRecord>,
    /// Total count (before limit/offset).
    pub total: usize,
    pub has_more: bool,
}

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

impl AuditQueryParams {
    fn into_query(self) -> Result<AuditQuery, ApiError> {
        let action = self
            .action
            .as_deref()
            .map(|raw| {
                raw.parse::<AuditAction>()
                    .map_err(|_| ApiError::bad_request(format!("Unknown audit action: {raw}")))
            })
            .transpose()?;
        Ok(AuditQuery {
            actor_id: self.actor_id,
            reference_id: self.reference_id,
            action,
            limit: self
                .limit
                .unwrap_or(DEFAULT_AUDIT_LIMIT)
                .min(MAX_AUDIT_LIMIT),
            offset: self.offset.unwrap_or(0),
        })
    }
}

// ============================================================================
// Compliance
// ============================================================================

/// Decide a pending KYC review.
#[utoipa::path(
    put,
    path = "/v1/admin/accounts/{account_id}/kyc",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("account_id" = String, Path, description = "Account ID")),
    request_body = KycDecisionRequest,
    responses(
        (status = 200, description = "KYC decided", body = Account),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "KYC is not in review")
    )
)]
pub async fn review_kyc(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Json(request): Json<KycDecisionRequest>,
) -> Result<Json<Account>, ApiError> {
    let account = state.workflows().accounts().review_kyc(
        &admin.user_id,
        &account_id,
        request.approve,
        request.note,
    )?;
    Ok(Json(account))
}

/// Record an AML screening outcome.
#[utoipa::path(
    put,
    path = "/v1/admin/accounts/{account_id}/aml",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("account_id" = String, Path, description = "Account ID")),
    request_body = AmlStatusRequest,
    responses(
        (status = 200, description = "AML status recorded", body = Account),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Account not found")
    )
)]
pub async fn set_aml_status(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Json(request): Json<AmlStatusRequest>,
) -> Result<Json<Account>, ApiError> {
    let account = state.workflows().accounts().set_aml_status(
        &admin.user_id,
        &account_id,
        request.status,
        request.reason,
    )?;
    Ok(Json(account))
}

// ============================================================================
// Vault and minting
// ============================================================================

/// Register a custody asset held in the vault.
#[utoipa::path(
    post,
    path = "/v1/admin/vault/assets",
    tag = "Admin",
    security(("bearer_auth" = [])),
    request_body = RegisterAssetRequest,
    responses(
        (status = 201, description = "Asset registered", body = CustodyAsset),
        (status = 400, description = "Invalid weight or purity"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn register_asset(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<RegisterAssetRequest>,
) -> Result<(StatusCode, Json<CustodyAsset>), ApiError> {
    let asset = state.workflows().minting().register_custody_asset(
        &admin.user_id,
        &request.vault_id,
        request.weight_grams,
        request.purity,
    )?;
    Ok((StatusCode::CREATED, Json(asset)))
}

/// List vault assets.
#[utoipa::path(
    get,
    path = "/v1/admin/vault/assets",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Vault assets", body = VaultAssetsResponse),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_assets(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<VaultAssetsResponse>, ApiError> {
    let repo = CustodyRepository::new(state.db());
    let assets = repo.list_assets()?;
    let available = repo.inventory()?;
    Ok(Json(VaultAssetsResponse {
        total: assets.len(),
        assets,
        available_count: available.count,
        available_grams: available.total_grams,
    }))
}

/// Set the reference silver price used for new price locks and loan quotes.
#[utoipa::path(
    put,
    path = "/v1/admin/price",
    tag = "Admin",
    security(("bearer_auth" = [])),
    request_body = ReferencePriceRequest,
    responses(
        (status = 200, description = "Price updated", body = ReferencePriceResponse),
        (status = 400, description = "Price must be positive"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn set_reference_price(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<ReferencePriceRequest>,
) -> Result<Json<ReferencePriceResponse>, ApiError> {
    let price_per_gram = state
        .workflows()
        .minting()
        .set_reference_price(&admin.user_id, request.price_per_gram)?;
    Ok(Json(ReferencePriceResponse { price_per_gram }))
}

/// Pause or resume minting.
#[utoipa::path(
    put,
    path = "/v1/admin/mint/paused",
    tag = "Admin",
    security(("bearer_auth" = [])),
    request_body = MintPauseRequest,
    responses(
        (status = 200, description = "Pause switch updated", body = MintPauseResponse),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn set_minting_paused(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<MintPauseRequest>,
) -> Result<Json<MintPauseResponse>, ApiError> {
    let paused = state
        .workflows()
        .minting()
        .set_minting_paused(&admin.user_id, request.paused)?;
    Ok(Json(MintPauseResponse { paused }))
}

/// Approve a mint request and mint the tokens on the ledger.
#[utoipa::path(
    post,
    path = "/v1/admin/mint/{mint_id}/execute",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("mint_id" = String, Path, description = "Mint request ID")),
    responses(
        (status = 200, description = "Tokens minted", body = MintRequest),
        (status = 403, description = "Not authorized or owner no longer eligible"),
        (status = 409, description = "Not REQUESTED, paused, or price lock expired"),
        (status = 502, description = "Ledger mint failed")
    )
)]
pub async fn execute_mint(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(mint_id): Path<String>,
) -> Result<Json<MintRequest>, ApiError> {
    let mint = state
        .workflows()
        .minting()
        .execute(&admin.user_id, &mint_id)
        .await?;
    Ok(Json(mint))
}

/// Reject a mint request and release its asset.
#[utoipa::path(
    post,
    path = "/v1/admin/mint/{mint_id}/reject",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("mint_id" = String, Path, description = "Mint request ID")),
    request_body = ReasonRequest,
    responses(
        (status = 200, description = "Mint rejected", body = MintRequest),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 409, description = "Mint request is not REQUESTED")
    )
)]
pub async fn reject_mint(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(mint_id): Path<String>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<MintRequest>, ApiError> {
    let reason = request.reason.unwrap_or_else(|| "rejected by admin".to_string());
    let mint = state
        .workflows()
        .minting()
        .reject(&admin.user_id, &mint_id, &reason)?;
    Ok(Json(mint))
}

// ============================================================================
// Redemptions
// ============================================================================

/// PENDING and APPROVED redemptions, oldest first.
#[utoipa::path(
    get,
    path = "/v1/admin/redemptions/queue",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Redemption queue", body = RedemptionQueueResponse),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn redemption_queue(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<RedemptionQueueResponse>, ApiError> {
    let redemptions = RedemptionRepository::new(state.db()).admin_queue()?;
    let total = redemptions.len();
    Ok(Json(RedemptionQueueResponse { redemptions, total }))
}

#[utoipa::path(
    post,
    path = "/v1/admin/redemptions/{redemption_id}/approve",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("redemption_id" = String, Path, description = "Redemption ID")),
    responses(
        (status = 200, description = "Redemption approved", body = RedemptionRequest),
        (status = 409, description = "Redemption is not PENDING"),
        (status = 422, description = "Holder no longer has the balance")
    )
)]
pub async fn approve_redemption(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(redemption_id): Path<String>,
) -> Result<Json<RedemptionRequest>, ApiError> {
    let redemption = state
        .workflows()
        .redemptions()
        .approve(&admin.user_id, &redemption_id)
        .await?;
    Ok(Json(redemption))
}

/// Burn the redeemed tokens on the ledger.
#[utoipa::path(
    post,
    path = "/v1/admin/redemptions/{redemption_id}/fulfill",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("redemption_id" = String, Path, description = "Redemption ID")),
    responses(
        (status = 200, description = "Tokens burned", body = RedemptionRequest),
        (status = 409, description = "Redemption is not APPROVED or is being fulfilled"),
        (status = 502, description = "Ledger burn failed")
    )
)]
pub async fn fulfill_redemption(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(redemption_id): Path<String>,
) -> Result<Json<RedemptionRequest>, ApiError> {
    let redemption = state
        .workflows()
        .redemptions()
        .fulfill(&admin.user_id, &redemption_id)
        .await?;
    Ok(Json(redemption))
}

#[utoipa::path(
    post,
    path = "/v1/admin/redemptions/{redemption_id}/dispatch",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("redemption_id" = String, Path, description = "Redemption ID")),
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Silver dispatched", body = RedemptionRequest),
        (status = 400, description = "Tracking number missing"),
        (status = 409, description = "Redemption is not FULFILLED")
    )
)]
pub async fn dispatch_redemption(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(redemption_id): Path<String>,
    Json(request): Json<DispatchRequest>,
) -> Result<Json<RedemptionRequest>, ApiError> {
    let redemption = state.workflows().redemptions().dispatch(
        &admin.user_id,
        &redemption_id,
        &request.tracking_number,
    )?;
    Ok(Json(redemption))
}

#[utoipa::path(
    post,
    path = "/v1/admin/redemptions/{redemption_id}/reject",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("redemption_id" = String, Path, description = "Redemption ID")),
    request_body = ReasonRequest,
    responses(
        (status = 200, description = "Redemption rejected", body = RedemptionRequest),
        (status = 409, description = "Redemption already burned or being fulfilled")
    )
)]
pub async fn reject_redemption(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(redemption_id): Path<String>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<RedemptionRequest>, ApiError> {
    let reason = request.reason.unwrap_or_else(|| "rejected by admin".to_string());
    let redemption = state
        .workflows()
        .redemptions()
        .reject(&admin.user_id, &redemption_id, &reason)?;
    Ok(Json(redemption))
}

// ============================================================================
// Loans
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/admin/loans/pending",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Loans awaiting a decision", body = PendingLoansResponse),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn pending_loans(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<PendingLoansResponse>, ApiError> {
    let loans = LoanRepository::new(state.db()).pending()?;
    let total = loans.len();
    Ok(Json(PendingLoansResponse { loans, total }))
}

#[utoipa::path(
    post,
    path = "/v1/admin/loans/{loan_id}/approve",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("loan_id" = String, Path, description = "Loan ID")),
    request_body = LoanApprovalRequest,
    responses(
        (status = 200, description = "Loan approved", body = LoanRequest),
        (status = 403, description = "Owner no longer eligible"),
        (status = 409, description = "Loan is not PENDING")
    )
)]
pub async fn approve_loan(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(loan_id): Path<String>,
    Json(request): Json<LoanApprovalRequest>,
) -> Result<Json<LoanRequest>, ApiError> {
    let loan = state
        .workflows()
        .loans()
        .approve(&admin.user_id, &loan_id, request.note)?;
    Ok(Json(loan))
}

#[utoipa::path(
    post,
    path = "/v1/admin/loans/{loan_id}/reject",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("loan_id" = String, Path, description = "Loan ID")),
    request_body = ReasonRequest,
    responses(
        (status = 200, description = "Loan rejected", body = LoanRequest),
        (status = 409, description = "Loan is not PENDING")
    )
)]
pub async fn reject_loan(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(loan_id): Path<String>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<LoanRequest>, ApiError> {
    let loan = state
        .workflows()
        .loans()
        .reject(&admin.user_id, &loan_id, request.reason)?;
    Ok(Json(loan))
}

#[utoipa::path(
    post,
    path = "/v1/admin/loans/{loan_id}/activate",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("loan_id" = String, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan disbursed", body = LoanRequest),
        (status = 409, description = "Loan is not APPROVED")
    )
)]
pub async fn activate_loan(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(loan_id): Path<String>,
) -> Result<Json<LoanRequest>, ApiError> {
    let loan = state
        .workflows()
        .loans()
        .activate(&admin.user_id, &loan_id)?;
    Ok(Json(loan))
}

#[utoipa::path(
    post,
    path = "/v1/admin/loans/{loan_id}/repaid",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("loan_id" = String, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan closed as repaid", body = LoanRequest),
        (status = 409, description = "Loan is not ACTIVE")
    )
)]
pub async fn mark_loan_repaid(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(loan_id): Path<String>,
) -> Result<Json<LoanRequest>, ApiError> {
    let loan = state
        .workflows()
        .loans()
        .mark_repaid(&admin.user_id, &loan_id)?;
    Ok(Json(loan))
}

#[utoipa::path(
    post,
    path = "/v1/admin/loans/{loan_id}/liquidate",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("loan_id" = String, Path, description = "Loan ID")),
    request_body = ReasonRequest,
    responses(
        (status = 200, description = "Collateral liquidated", body = LoanRequest),
        (status = 409, description = "Loan is not ACTIVE")
    )
)]
pub async fn liquidate_loan(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(loan_id): Path<String>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<LoanRequest>, ApiError> {
    let loan = state
        .workflows()
        .loans()
        .liquidate(&admin.user_id, &loan_id, request.reason)?;
    Ok(Json(loan))
}

// ============================================================================
// Oversight
// ============================================================================

/// Compare the ledger's token supply with minted minus redeemed grams.
#[utoipa::path(
    get,
    path = "/v1/admin/reconciliation",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reconciliation report", body = ReconciliationReport),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 501, description = "Ledger cannot report total supply"),
        (status = 502, description = "Ledger unavailable")
    )
)]
pub async fn reconciliation(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<ReconciliationReport>, ApiError> {
    let report = state.workflows().reconciler().reconcile().await?;
    Ok(Json(report))
}

/// Query the audit trail.
#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit records", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn query_audit_log(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let query = params.into_query()?;
    let (records, total) = AuditRepository::new(state.db()).query(&query)?;
    let has_more = query.offset.saturating_add(records.len()) < total;
    Ok(Json(AuditLogResponse {
        records,
        total,
        has_more,
    }))
}

// ============================================================================
// Tests
// ============================================================================
