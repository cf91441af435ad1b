//! End-to-end HTTP surface tests exercising the literal scenarios from the
//! design document (§8: S1-S6), driven through the real axum router rather
//! than by calling the planner/mutation modules directly.

use std::io::Write;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use accounts_engine::http::create_router;
use accounts_engine::{loader, Engine};

fn write_file(dir: &std::path::Path, name: &str, content: &str) {
    let mut f = std::fs::File::create(dir.join(name)).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

async fn engine_from_accounts(accounts_json: &str) -> Arc<Engine> {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "accounts_1.json", accounts_json);
    write_file(dir.path(), "options.txt", "1000");
    Arc::new(loader::load(dir.path()).unwrap())
}

async fn get(engine: &Arc<Engine>, uri: &str) -> (StatusCode, Value) {
    let app = create_router(engine.clone(), 64);
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

async fn post(engine: &Arc<Engine>, uri: &str, body: Value) -> (StatusCode, Value) {
    let app = create_router(engine.clone(), 64);
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = if bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

const TWO_ACCOUNTS: &str = r#"{"accounts":[
    {"id":1,"email":"","sex":"m","status":"свободны","birth":0,"joined":0,"country":"C1","interests":["I1","I2"]},
    {"id":2,"email":"","sex":"f","status":"свободны","birth":0,"joined":0,"country":"C2","interests":["I2","I3"]}
]}"#;

#[tokio::test]
async fn s1_filter_by_country_omits_empty_email() {
    let engine = engine_from_accounts(TWO_ACCOUNTS).await;
    let (status, body) = get(&engine, "/accounts/filter/?country_eq=C1&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"accounts": [{"id": 1, "country": "C1"}]})
    );
}

#[tokio::test]
async fn s2_group_by_country_ordered_descending() {
    let engine = engine_from_accounts(TWO_ACCOUNTS).await;
    let (status, body) = get(&engine, "/accounts/group/?keys=country&order=-1&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    let groups = body["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    for g in groups {
        assert_eq!(g["count"], json!(1));
    }
}

#[tokio::test]
async fn s3_suggest_reflects_likes_batch() {
    let engine = engine_from_accounts(TWO_ACCOUNTS).await;
    let (status, _) = post(
        &engine,
        "/accounts/likes/",
        json!({"likes": [{"liker": 1, "likee": 2, "ts": 1000}]}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = get(&engine, "/accounts/2/suggest/?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accounts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn s4_interests_contains_drives_on_smallest_posting_list() {
    let engine = engine_from_accounts(TWO_ACCOUNTS).await;
    let (status, body) = get(&engine, "/accounts/filter/?interests_contains=I1,I2&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    let accounts = body["accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["id"], json!(1));
}

#[tokio::test]
async fn s5_recommend_returns_opposite_sex_shared_interest() {
    let engine = engine_from_accounts(TWO_ACCOUNTS).await;
    let (status, body) = get(&engine, "/accounts/1/recommend/?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    let accounts = body["accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["id"], json!(2));
}

#[tokio::test]
async fn s6_duplicate_email_on_create_is_rejected() {
    let engine = engine_from_accounts(
        r#"{"accounts":[{"id":1,"email":"taken@example.com","sex":"m","status":"свободны","birth":0,"joined":0}]}"#,
    )
    .await;
    let (status, _) = post(
        &engine,
        "/accounts/new/",
        json!({
            "id": 2,
            "email": "taken@example.com",
            "sex": "f",
            "status": "свободны",
            "birth": 0,
            "joined": 0
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!engine.store.exists(2));
}

#[tokio::test]
async fn recommend_on_unknown_id_is_not_found() {
    let engine = engine_from_accounts(TWO_ACCOUNTS).await;
    let (status, _) = get(&engine, "/accounts/999/recommend/?limit=10").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn filter_with_non_positive_limit_is_bad_request() {
    let engine = engine_from_accounts(TWO_ACCOUNTS).await;
    let (status, _) = get(&engine, "/accounts/filter/?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn group_by_email_is_unsupported() {
    let engine = engine_from_accounts(TWO_ACCOUNTS).await;
    let (status, _) = get(&engine, "/accounts/group/?keys=sex&email=example.com&limit=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_is_accepted_and_preserves_unmentioned_fields() {
    let engine = engine_from_accounts(TWO_ACCOUNTS).await;
    let (status, _) = post(&engine, "/accounts/1/", json!({"status": "заняты"})).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let a = engine.store.get(1).unwrap();
    assert_eq!(a.status.as_str(), "заняты");
    assert_eq!(a.country, "C1");
}

#[tokio::test]
async fn update_on_unknown_id_is_not_found() {
    let engine = engine_from_accounts(TWO_ACCOUNTS).await;
    let (status, _) = post(&engine, "/accounts/999/", json!({"status": "заняты"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
