use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use tally_accounting::Ledger;
use tally_api::app::{self, AppServices};
use tally_api::config::{ApiConfig, ExecutionMode};
use tally_infra::WorkerConfig;

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(execution: ExecutionMode) -> Self {
        let config = ApiConfig::default()
            .with_execution(execution)
            .with_worker(
                WorkerConfig::default()
                    .with_name("api-test-worker")
                    .with_poll_interval(Duration::from_millis(10)),
            )
            .with_reply_timeout(Duration::from_secs(2));

        // Same router as prod, bound to an ephemeral port.
        let services = Arc::new(
            AppServices::build(Arc::new(Ledger::new()), &config).expect("services start"),
        );
        let app = app::build_app(Arc::clone(&services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        self.services.stop();
    }
}

fn client() -> reqwest::Client {
    // 302 is the idempotent-replay status, not a redirect to follow.
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn post(
    client: &reqwest::Client,
    srv: &TestServer,
    path: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let res = client.post(srv.url(path)).json(&body).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(serde_json::Value::Null))
}

async fn get(
    client: &reqwest::Client,
    srv: &TestServer,
    path: &str,
) -> (StatusCode, serde_json::Value) {
    let res = client.get(srv.url(path)).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(serde_json::Value::Null))
}

async fn run_scenario(execution: ExecutionMode) {
    let srv = TestServer::spawn(execution).await;
    let client = client();

    let (status, body) = post(
        &client,
        &srv,
        "/deposit",
        json!({"id": "d1", "account_id": "A", "amount": 100}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "d1");
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);

    let (status, _) = post(
        &client,
        &srv,
        "/withdraw",
        json!({"id": "w1", "account_id": "A", "amount": 40}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = post(
        &client,
        &srv,
        "/transfer",
        json!({"id": "t1", "debit_account_id": "A", "credit_account_id": "B", "amount": 30}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, balances) = get(&client, &srv, "/balances").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balances["A"], "30");
    assert_eq!(balances["B"], "30");

    let (status, txs) = get(&client, &srv, "/transactions?consistent=false").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = txs
        .as_array()
        .unwrap()
        .iter()
        .map(|tx| tx["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["d1", "w1", "t1"]);

    let (status, journal_a) = get(&client, &srv, "/journal/A").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(journal_a.as_array().unwrap().len(), 3);

    let (status, journal_b) = get(&client, &srv, "/journal/B").await;
    assert_eq!(status, StatusCode::OK);
    let rows = journal_b.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["tx_id"], "t1");
    assert_eq!(rows[0]["counterparty_id"], "A");
}

#[tokio::test]
async fn health_reports_execution_mode() {
    let srv = TestServer::spawn(ExecutionMode::Queued).await;
    let (status, body) = get(&client(), &srv, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["execution"], "queued");
    assert_eq!(body["worker"], "running");
}

#[tokio::test]
async fn scenario_over_the_direct_path() {
    run_scenario(ExecutionMode::Direct).await;
}

#[tokio::test]
async fn scenario_over_the_queued_path() {
    run_scenario(ExecutionMode::Queued).await;
}

#[tokio::test]
async fn replayed_id_is_found_not_reapplied() {
    let srv = TestServer::spawn(ExecutionMode::Queued).await;
    let client = client();
    let body = json!({"id": "d1", "account_id": "A", "amount": 10});

    let (status, _) = post(&client, &srv, "/deposit", body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, replay) = post(&client, &srv, "/deposit", body).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(replay["status"], "already_processed");
    assert_eq!(replay["id"], "d1");

    // Same id with a different payload is still a replay.
    let (status, _) = post(
        &client,
        &srv,
        "/withdraw",
        json!({"id": "d1", "account_id": "A", "amount": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::FOUND);

    let (_, balances) = get(&client, &srv, "/balances").await;
    assert_eq!(balances["A"], "10");
}

#[tokio::test]
async fn rejections_map_to_client_errors() {
    let srv = TestServer::spawn(ExecutionMode::Direct).await;
    let client = client();

    let (status, body) = post(
        &client,
        &srv,
        "/deposit",
        json!({"id": "d2", "account_id": "A", "amount": -5}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_amount");

    let (status, body) = post(
        &client,
        &srv,
        "/transfer",
        json!({"id": "t1", "debit_account_id": "A", "credit_account_id": "A", "amount": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "same_account");

    let (status, body) = post(
        &client,
        &srv,
        "/withdraw",
        json!({"id": "w1", "account_id": "A", "amount": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_funds");

    // Rejected ids are not consumed.
    let (status, _) = post(
        &client,
        &srv,
        "/deposit",
        json!({"id": "d2", "account_id": "A", "amount": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn unrepresentable_balance_is_a_bad_request_not_an_outage() {
    let srv = TestServer::spawn(ExecutionMode::Queued).await;
    let client = client();

    let (status, _) = post(
        &client,
        &srv,
        "/deposit",
        json!({"id": "d1", "account_id": "A", "amount": "79228162514264337593543950335"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post(
        &client,
        &srv,
        "/deposit",
        json!({"id": "d2", "account_id": "B", "amount": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "amount_out_of_range");

    let (status, health) = get(&client, &srv, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["worker"], "running");

    let (status, _) = post(
        &client,
        &srv,
        "/withdraw",
        json!({"id": "w1", "account_id": "A", "amount": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let srv = TestServer::spawn(ExecutionMode::Direct).await;
    let res = client()
        .post(srv.url("/deposit"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_account_journal_is_not_found() {
    let srv = TestServer::spawn(ExecutionMode::Direct).await;
    let (status, body) = get(&client(), &srv, "/journal/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn stopped_worker_returns_service_unavailable() {
    let srv = TestServer::spawn(ExecutionMode::Queued).await;
    let client = client();
    srv.services.stop();

    let mut last = StatusCode::OK;
    for _ in 0..50 {
        let (status, _) = get(&client, &srv, "/health").await;
        last = status;
        if status == StatusCode::SERVICE_UNAVAILABLE {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(last, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = post(
        &client,
        &srv,
        "/deposit",
        json!({"id": "d1", "account_id": "A", "amount": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "worker_unavailable");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let srv = TestServer::spawn(ExecutionMode::Direct).await;
    let res = client().get(srv.url("/balances")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let id = res
        .headers()
        .get(tally_api::middleware::REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}
