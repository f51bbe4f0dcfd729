use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use transfer_ledger::config::TransferConfig;
use transfer_ledger::gateway::{router, state::AppState};
use transfer_ledger::store::{FailPoint, MemoryLedgerStore, default_seed};
use transfer_ledger::TransferMetrics;

struct TestApp {
    router: Router,
    store: MemoryLedgerStore,
    metrics: Arc<TransferMetrics>,
}

fn setup_test_app() -> TestApp {
    let store = MemoryLedgerStore::with_accounts(&default_seed());
    let metrics = Arc::new(TransferMetrics::new().unwrap());
    metrics.refresh_balances(&[
        transfer_ledger::Account::new("A", store.balance("A").unwrap()),
        transfer_ledger::Account::new("B", store.balance("B").unwrap()),
    ]);
    let state = AppState::new(
        Arc::new(store.clone()),
        metrics.clone(),
        &TransferConfig {
            max_attempts: 1,
            retry_backoff_ms: 0,
        },
        100,
    );
    TestApp {
        router: router(Arc::new(state)),
        store,
        metrics,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, String) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn post_transfer(app: &TestApp, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/transfer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, text) = send(app, request).await;
    (status, serde_json::from_str(&text).unwrap())
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, String) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn test_transfer_and_replay() {
    let app = setup_test_app();
    let body = r#"{"fromAccountId":"A","toAccountId":"B","amount":200,"operationId":"op-1"}"#;

    let (status, json) = post_transfer(&app, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({"status": "ok", "message": "transfer completed", "balances": {"A": 800.0, "B": 700.0}})
    );

    let (status, json) = post_transfer(&app, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "ok", "message": "operation already processed"}));
}

#[tokio::test]
async fn test_business_rejections_are_400() {
    let app = setup_test_app();
    let cases = [
        (r#"{"fromAccountId":"A","toAccountId":"B","amount":0}"#, "amount must be > 0"),
        (
            r#"{"fromAccountId":"A","toAccountId":"A","amount":10}"#,
            "fromAccountId and toAccountId must differ",
        ),
        (
            r#"{"toAccountId":"B","amount":10}"#,
            "fromAccountId and toAccountId are required",
        ),
        (r#"{"fromAccountId":"A","toAccountId":"B","amount":100000}"#, "insufficient funds"),
        (r#"{"fromAccountId":"Z","toAccountId":"B","amount":10}"#, "account not found"),
    ];

    for (body, message) in cases {
        let (status, json) = post_transfer(&app, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(json, json!({"status": "error", "message": message}), "{}", body);
    }
    assert_eq!(app.store.balance("A"), Some(rust_decimal::Decimal::new(100_000, 2)));
}

#[tokio::test]
async fn test_invalid_json_is_not_counted() {
    let app = setup_test_app();

    for body in ["{not json", r#"{"fromAccountId":"A","toAccountId":"B","amount":"ten"}"#] {
        let (status, json) = post_transfer(&app, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "invalid json");
    }

    let (_, metrics) = get(&app, "/metrics").await;
    for line in metrics.lines().filter(|l| l.starts_with("transfer_requests_total{")) {
        assert!(line.ends_with(" 0"), "unexpected count: {}", line);
    }
}

#[tokio::test]
async fn test_store_failure_is_500_without_details() {
    let app = setup_test_app();
    app.store.inject_fault(FailPoint::Commit, false, 1);

    let (status, json) = post_transfer(
        &app,
        r#"{"fromAccountId":"A","toAccountId":"B","amount":10,"operationId":"op-500"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({"status": "error", "message": "database error"}));
    assert_eq!(app.metrics.transfer_count("store_failure"), 1);
}

#[tokio::test]
async fn test_debug_state_shape() {
    let app = setup_test_app();
    post_transfer(
        &app,
        r#"{"fromAccountId":"A","toAccountId":"B","amount":200,"operationId":"op-1"}"#,
    )
    .await;

    let (status, text) = get(&app, "/debug/state").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&text).unwrap();

    assert_eq!(json["accounts"]["A"], json!({"id": "A", "balance": 800.0}));
    assert_eq!(json["accounts"]["B"], json!({"id": "B", "balance": 700.0}));
    assert_eq!(json["processedOps"], json!(["op-1"]));

    let ledger = json["ledger"].as_array().unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[0]["type"], "CREDIT");
    assert_eq!(ledger[0]["accountId"], "B");
    assert_eq!(ledger[1]["type"], "DEBIT");
    assert_eq!(ledger[1]["accountId"], "A");
    assert_eq!(ledger[0]["amount"], 200.0);
    assert_eq!(ledger[0]["at"], ledger[1]["at"]);
}

#[tokio::test]
async fn test_debug_state_store_failure() {
    let app = setup_test_app();
    app.store.inject_fault(FailPoint::Read, false, 1);

    let (status, text) = get(&app, "/debug/state").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn test_metrics_exposition() {
    let app = setup_test_app();
    post_transfer(&app, r#"{"fromAccountId":"A","toAccountId":"B","amount":200}"#).await;
    post_transfer(&app, r#"{"fromAccountId":"A","toAccountId":"B","amount":0}"#).await;

    let (status, text) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("transfer_requests_total{result=\"success\"} 1"));
    assert!(text.contains("transfer_requests_total{result=\"validation_error\"} 1"));
    assert!(text.contains("account_balance{account=\"A\"} 800"));
    assert!(text.contains("account_balance{account=\"B\"} 700"));
}

#[tokio::test]
async fn test_health() {
    let app = setup_test_app();
    let (status, text) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());

    app.store.inject_fault(FailPoint::Read, false, 1);
    let (status, text) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!({"status": "unavailable"}));
}

#[tokio::test]
async fn test_openapi_served() {
    let app = setup_test_app();
    let (status, text) = get(&app, "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("/transfer"));
}
