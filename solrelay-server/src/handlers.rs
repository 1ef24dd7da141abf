//! Axum route handlers for the payment relay.
//!
//! Two endpoints: `GET /health` for liveness and `POST /pay` to claim a
//! disbursement against a received SOL payment.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solrelay::RelayService;

use crate::error::ApiError;

/// Shared application state.
pub type AppState = Arc<RelayService>;

/// `POST /pay` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct PayRequest {
    /// Claimed sender address (base58).
    pub sender: String,
    /// Claimed payment amount in SOL.
    pub amount: Decimal,
}

/// `POST /pay` success body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayResponse {
    /// Always "Payment successful".
    pub message: &'static str,
    /// Signature of the confirmed payout transaction.
    pub transaction_id: String,
    /// Disbursed amount in base units.
    pub amount_received: u64,
}

/// `GET /health` — liveness probe, no side effects.
pub async fn get_health() -> &'static str {
    "OK"
}

/// `POST /pay` — verifies the claimed payment and disburses the payout.
///
/// # Errors
///
/// Returns an [`ApiError`] carrying the relay's error taxonomy; see the
/// status mapping on [`ApiError`].
pub async fn post_pay(
    State(service): State<AppState>,
    payload: Result<Json<PayRequest>, JsonRejection>,
) -> Result<Json<PayResponse>, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::from_rejection(&e))?;

    // Run on a detached task: a broadcast transaction cannot be cancelled,
    // so a client disconnect must not abort the in-flight work.
    let handle = tokio::spawn(async move { service.process(&body.sender, body.amount).await });
    let disbursement = handle
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(PayResponse {
        message: "Payment successful",
        transaction_id: disbursement.transaction_id.to_string(),
        amount_received: disbursement.amount_disbursed,
    }))
}

/// Creates the relay router with both endpoints.
pub fn relay_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(get_health))
        .route("/pay", axum::routing::post(post_pay))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use solana_pubkey::Pubkey;
    use solana_signature::Signature;
    use solrelay::chain::ChainClient;
    use solrelay::ledger::SignatureLedger;
    use solrelay::testing::{MockChain, test_config, transfer_transaction};
    use tower::ServiceExt;

    fn router_with(chain: MockChain) -> (axum::Router, Arc<MockChain>, Pubkey) {
        let config = test_config();
        let receiving = config.receiving_address;
        let chain = Arc::new(chain);
        let service = Arc::new(RelayService::new(
            &config,
            Arc::clone(&chain) as Arc<dyn ChainClient>,
            Arc::new(SignatureLedger::in_memory()),
        ));
        (relay_router(service), chain, receiving)
    }

    fn pay_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/pay")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (router, _, _) = router_with(MockChain::new());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn pay_below_minimum_is_rejected() {
        let (router, _, _) = router_with(MockChain::new());
        let sender = Pubkey::new_unique();
        let response = router
            .oneshot(pay_request(&format!(
                r#"{{"sender":"{sender}","amount":0.05}}"#
            )))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Minimum purchase amount is 0.1 SOL");
    }

    #[tokio::test]
    async fn pay_without_matching_payment_is_rejected() {
        let (router, chain, _) = router_with(MockChain::new().with_balance(10_000_000_000));
        let sender = Pubkey::new_unique();
        let response = router
            .oneshot(pay_request(&format!(r#"{{"sender":"{sender}","amount":1}}"#)))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "SOL payment not found");
        assert!(chain.submissions().is_empty());
    }

    #[tokio::test]
    async fn pay_with_matching_payment_succeeds() {
        let config = test_config();
        let sender = Pubkey::new_unique();
        let chain = Arc::new(
            MockChain::new().with_balance(10_000_000_000).with_transfer(
                Signature::new_unique(),
                transfer_transaction(&sender, &config.receiving_address, 1_000_000_000),
            ),
        );
        let service = Arc::new(RelayService::new(
            &config,
            Arc::clone(&chain) as Arc<dyn ChainClient>,
            Arc::new(SignatureLedger::in_memory()),
        ));
        let router = relay_router(service);

        let response = router
            .oneshot(pay_request(&format!(r#"{{"sender":"{sender}","amount":1}}"#)))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Payment successful");
        assert_eq!(body["amountReceived"], 100_000_000);
        assert!(!body["transactionId"].as_str().expect("id").is_empty());
        assert_eq!(chain.submissions().len(), 1);
    }

    #[tokio::test]
    async fn expired_deadline_maps_to_gateway_timeout() {
        let mut config = test_config();
        config.request_timeout = std::time::Duration::from_millis(20);
        let sender = Pubkey::new_unique();
        let chain = Arc::new(
            MockChain::new()
                .with_balance(10_000_000_000)
                .hanging_sends()
                .with_transfer(
                    Signature::new_unique(),
                    transfer_transaction(&sender, &config.receiving_address, 1_000_000_000),
                ),
        );
        let service = Arc::new(RelayService::new(
            &config,
            chain as Arc<dyn ChainClient>,
            Arc::new(SignatureLedger::in_memory()),
        ));

        let response = relay_router(service)
            .oneshot(pay_request(&format!(r#"{{"sender":"{sender}","amount":1}}"#)))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "request timed out");
    }

    #[tokio::test]
    async fn malformed_json_body_is_rejected() {
        let (router, _, _) = router_with(MockChain::new());
        let response = router
            .oneshot(pay_request("{not json"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Malformed JSON in request body");
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let (router, _, _) = router_with(MockChain::new());
        for body in [r#"{}"#, r#"{"sender":"abc"}"#, r#"{"amount":1}"#] {
            let response = router
                .clone()
                .oneshot(pay_request(body))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            assert_eq!(body["error"], "Invalid sender or amount");
        }
    }

    #[tokio::test]
    async fn non_numeric_amount_is_rejected() {
        let (router, _, _) = router_with(MockChain::new());
        let sender = Pubkey::new_unique();
        let response = router
            .oneshot(pay_request(&format!(
                r#"{{"sender":"{sender}","amount":"plenty"}}"#
            )))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid sender or amount");
    }

    #[tokio::test]
    async fn infrastructure_failure_maps_to_503() {
        let (router, _, _) = router_with(MockChain::new().failing_rpc());
        let sender = Pubkey::new_unique();
        let response = router
            .oneshot(pay_request(&format!(r#"{{"sender":"{sender}","amount":1}}"#)))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
