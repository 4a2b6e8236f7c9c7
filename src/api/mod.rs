// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::Role,
    state::AppState,
    storage::{
        repository::{
            Account, AmlStatus, CustodyAsset, IntentSide, IntentStatus, KycStatus, LoanRequest,
            LoanStatus, MintRequest, MintStatus, PriceLock, PriceLockStatus, RedemptionRequest,
            RedemptionStatus, Trade, TradeIntent, TradeStatus,
        },
        AuditAction, AuditRecord,
    },
    workflows::{minting::MintQuote, LoanTerms, ReconciliationReport},
};

pub mod accounts;
pub mod admin;
pub mod health;
pub mod loans;
pub mod mint;
pub mod redemptions;
pub mod trading;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/accounts/{account_id}/kyc", put(admin::review_kyc))
        .route("/accounts/{account_id}/aml", put(admin::set_aml_status))
        .route(
            "/vault/assets",
            get(admin::list_assets).post(admin::register_asset),
        )
        .route("/price", put(admin::set_reference_price))
        .route("/mint/paused", put(admin::set_minting_paused))
        .route("/mint/{mint_id}/execute", post(admin::execute_mint))
        .route("/mint/{mint_id}/reject", post(admin::reject_mint))
        .route("/redemptions/queue", get(admin::redemption_queue))
        .route(
            "/redemptions/{redemption_id}/approve",
            post(admin::approve_redemption),
        )
        .route(
            "/redemptions/{redemption_id}/fulfill",
            post(admin::fulfill_redemption),
        )
        .route(
            "/redemptions/{redemption_id}/dispatch",
            post(admin::dispatch_redemption),
        )
        .route(
            "/redemptions/{redemption_id}/reject",
            post(admin::reject_redemption),
        )
        .route("/loans/pending", get(admin::pending_loans))
        .route("/loans/{loan_id}/approve", post(admin::approve_loan))
        .route("/loans/{loan_id}/reject", post(admin::reject_loan))
        .route("/loans/{loan_id}/activate", post(admin::activate_loan))
        .route("/loans/{loan_id}/repaid", post(admin::mark_loan_repaid))
        .route("/loans/{loan_id}/liquidate", post(admin::liquidate_loan))
        .route("/reconciliation", get(admin::reconciliation))
        .route("/audit", get(admin::query_audit_log));

    let v1_routes = Router::new()
        .route("/accounts", post(accounts::register_account))
        .route("/accounts/me", get(accounts::get_my_account))
        .route("/accounts/me/kyc", post(accounts::submit_kyc))
        .route(
            "/accounts/me/custody-address",
            put(accounts::link_custody_address),
        )
        .route(
            "/trading/intents",
            get(trading::list_intents).post(trading::submit_intent),
        )
        .route(
            "/trading/intents/{intent_id}",
            delete(trading::cancel_intent),
        )
        .route(
            "/trading/intents/{intent_id}/match",
            post(trading::match_intent),
        )
        .route("/trading/trades", get(trading::list_trades))
        .route("/mint", get(mint::list_mints).post(mint::initiate_mint))
        .route("/mint/{mint_id}/price-lock", post(mint::renew_price_lock))
        .route(
            "/redemptions",
            get(redemptions::list_redemptions).post(redemptions::submit_redemption),
        )
        .route("/loans", get(loans::list_loans).post(loans::apply_loan))
        .route("/loans/terms", get(loans::loan_terms))
        .nest("/admin", admin_routes);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Registers the `bearer_auth` scheme referenced by every protected path.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Silver Settlement API",
        description = "Compliance-gated trading, minting, redemption and lending for custodial tokenized silver."
    ),
    paths(
        health::health,
        health::liveness,
        accounts::register_account,
        accounts::get_my_account,
        accounts::submit_kyc,
        accounts::link_custody_address,
        trading::submit_intent,
        trading::list_intents,
        trading::cancel_intent,
        trading::match_intent,
        trading::list_trades,
        mint::initiate_mint,
        mint::list_mints,
        mint::renew_price_lock,
        redemptions::submit_redemption,
        redemptions::list_redemptions,
        loans::apply_loan,
        loans::list_loans,
        loans::loan_terms,
        admin::review_kyc,
        admin::set_aml_status,
        admin::register_asset,
        admin::list_assets,
        admin::set_reference_price,
        admin::set_minting_paused,
        admin::execute_mint,
        admin::reject_mint,
        admin::redemption_queue,
        admin::approve_redemption,
        admin::fulfill_redemption,
        admin::dispatch_redemption,
        admin::reject_redemption,
        admin::pending_loans,
        admin::approve_loan,
        admin::reject_loan,
        admin::activate_loan,
        admin::mark_loan_repaid,
        admin::liquidate_loan,
        admin::reconciliation,
        admin::query_audit_log
    ),
    components(
        schemas(
            Role,
            Account,
            KycStatus,
            AmlStatus,
            IntentSide,
            IntentStatus,
            TradeIntent,
            TradeStatus,
            Trade,
            CustodyAsset,
            PriceLock,
            PriceLockStatus,
            MintRequest,
            MintStatus,
            MintQuote,
            RedemptionRequest,
            RedemptionStatus,
            LoanRequest,
            LoanStatus,
            LoanTerms,
            ReconciliationReport,
            AuditAction,
            AuditRecord,
            health::ReadyResponse,
            health::HealthResponse,
            accounts::RegisterAccountRequest,
            accounts::LinkCustodyAddressRequest,
            trading::SubmitIntentRequest,
            trading::IntentListResponse,
            trading::TradeListResponse,
            trading::MatchResponse,
            mint::InitiateMintRequest,
            mint::MintListResponse,
            redemptions::SubmitRedemptionRequest,
            redemptions::RedemptionListResponse,
            loans::ApplyLoanRequest,
            loans::LoanListResponse,
            admin::KycDecisionRequest,
            admin::AmlStatusRequest,
            admin::RegisterAssetRequest,
            admin::VaultAssetsResponse,
            admin::ReferencePriceRequest,
            admin::ReferencePriceResponse,
            admin::MintPauseRequest,
            admin::MintPauseResponse,
            admin::ReasonRequest,
            admin::LoanApprovalRequest,
            admin::DispatchRequest,
            admin::RedemptionQueueResponse,
            admin::PendingLoansResponse,
            admin::AuditLogResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and dependency checks"),
        (name = "Accounts", description = "Registration, KYC submission and custody addresses"),
        (name = "Trading", description = "Limit-order trade intents and settlement"),
        (name = "Mint", description = "Tokenizing custody silver"),
        (name = "Redemptions", description = "Burning tokens for physical delivery"),
        (name = "Loans", description = "Silver-collateralised lending"),
        (name = "Admin", description = "Compliance review, approvals and oversight")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, test_state_with_ledger, test_token};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn openapi_declares_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/v1/trading/intents/{intent_id}/match"));
    }

    #[tokio::test]
    async fn health_reports_ok_and_echoes_request_id() {
        let (state, _dir) = test_state();
        let app = router(state);

        let response = send(&app, "GET", "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let body = json_body(response).await;
        assert_eq!(body["checks"]["storage"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let (state, _dir) = test_state();
        let app = router(state);

        let response = send(&app, "GET", "/v1/accounts/me", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_refuse_customer_tokens() {
        let (state, _dir) = test_state();
        let app = router(state);
        let token = test_token("alice", Role::User);

        let response = send(&app, "GET", "/v1/admin/audit", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_token_without_stored_admin_is_refused_by_workflow() {
        let (state, _dir) = test_state();
        state.workflows().accounts().register("mallory", Role::User).unwrap();
        let app = router(state);
        let token = test_token("mallory", Role::Admin);

        let response = send(
            &app,
            "PUT",
            "/v1/admin/price",
            Some(&token),
            Some(json!({ "price_per_gram": "80" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn register_then_read_own_account() {
        let (state, _dir) = test_state();
        let app = router(state);
        let token = test_token("alice", Role::User);

        let response = send(&app, "POST", "/v1/accounts", Some(&token), Some(json!({}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(&app, "GET", "/v1/accounts/me", Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["account_id"], "alice");
        assert_eq!(body["kyc_status"], "NOT_STARTED");

        let response = send(&app, "POST", "/v1/accounts", Some(&token), Some(json!({}))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unverified_account_cannot_submit_intents() {
        let (state, _dir) = test_state();
        let app = router(state);
        let token = test_token("alice", Role::User);
        send(&app, "POST", "/v1/accounts", Some(&token), Some(json!({}))).await;

        let response = send(
            &app,
            "POST",
            "/v1/trading/intents",
            Some(&token),
            Some(json!({ "side": "BUY", "quantity": "10", "limit_price": "80" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "KYC_UNVERIFIED");
    }

    #[tokio::test]
    async fn mint_flow_over_http() {
        let (state, ledger, _dir) = test_state_with_ledger();
        state.workflows().accounts().seed_admin("ops").unwrap();
        let app = router(state);
        let admin = test_token("ops", Role::Admin);
        let alice = test_token("alice", Role::User);

        send(&app, "POST", "/v1/accounts", Some(&alice), Some(json!({}))).await;
        send(&app, "POST", "/v1/accounts/me/kyc", Some(&alice), None).await;
        let response = send(
            &app,
            "PUT",
            "/v1/admin/accounts/alice/kyc",
            Some(&admin),
            Some(json!({ "approve": true })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            "PUT",
            "/v1/accounts/me/custody-address",
            Some(&alice),
            Some(json!({ "address": "G-ALICE" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            "POST",
            "/v1/admin/vault/assets",
            Some(&admin),
            Some(json!({ "vault_id": "VAULT-1", "weight_grams": "500", "purity": "0.999" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(
            &app,
            "POST",
            "/v1/mint",
            Some(&alice),
            Some(json!({ "grams": "100" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let quote = json_body(response).await;
        let mint_id = quote["mint"]["mint_id"].as_str().unwrap().to_string();

        let response = send(
            &app,
            "POST",
            &format!("/v1/admin/mint/{mint_id}/execute"),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let mint = json_body(response).await;
        assert_eq!(mint["status"], "MINTED");

        use crate::ledger::LedgerAdapter;
        assert_eq!(
            ledger.balance("G-ALICE").await.unwrap(),
            rust_decimal::Decimal::from(100)
        );

        let response = send(
            &app,
            "GET",
            "/v1/admin/audit?action=MINT_EXECUTED",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let audit = json_body(response).await;
        assert_eq!(audit["total"], 1);
        assert_eq!(audit["records"][0]["reference_id"], mint_id.as_str());
    }

    #[tokio::test]
    async fn loan_terms_quote_uses_reference_price() {
        let (state, _dir) = test_state();
        let app = router(state);
        let token = test_token("alice", Role::User);

        let response = send(
            &app,
            "GET",
            "/v1/loans/terms?collateral_grams=100&requested_amount=1000",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let terms = json_body(response).await;
        assert_eq!(terms["within_limit"], true);
    }

    #[tokio::test]
    async fn oversized_loan_terms_query_is_a_bad_request() {
        let (state, _dir) = test_state();
        let app = router(state);
        let token = test_token("alice", Role::User);

        let response = send(
            &app,
            "GET",
            "/v1/loans/terms?collateral_grams=79228162514264337593543950335",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
    }
}
