//! Gateway client behavior against an in-process mock gateway: accepted and
//! rejected statuses, auth header, payload shapes, and attachment handling.

mod common;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use lib::client::{ClientError, GatewayClient, MessageState, WebhookEvent, WebhookSource};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type CapturedRequest = Arc<Mutex<Option<(Option<String>, Value)>>>;
type CapturedRaw = Arc<Mutex<Option<(String, Vec<u8>)>>>;

#[tokio::test]
async fn health_returns_parsed_json() {
    let app = Router::new().route(
        "/health",
        get(|| async { Json(json!({ "status": "ok", "version": "1.20.0" })) }),
    );
    let base = common::serve(app).await;
    let client = GatewayClient::new(&common::credentials(&base)).unwrap();

    let health = client.health().await.unwrap();
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn health_error_carries_status_and_body() {
    let app = Router::new().route(
        "/health",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance window") }),
    );
    let base = common::serve(app).await;
    let client = GatewayClient::new(&common::credentials(&base)).unwrap();

    let err = client.health().await.unwrap_err();
    match err {
        ClientError::Gateway { status, body, .. } => {
            assert_eq!(status, 503);
            assert!(body.contains("maintenance window"));
        }
        other => panic!("expected gateway error, got {:?}", other),
    }
}

#[tokio::test]
async fn send_sms_posts_basic_auth_and_payload() {
    let captured: CapturedRequest = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route(
            "/message",
            post(
                |State(cap): State<CapturedRequest>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    *cap.lock().unwrap() = Some((auth, body));
                    (
                        StatusCode::ACCEPTED,
                        Json(json!({
                            "id": "test-sms-123",
                            "state": "Pending",
                            "recipients": [{ "phoneNumber": "+15551230000", "state": "Pending" }]
                        })),
                    )
                },
            ),
        )
        .with_state(captured.clone());
    let base = common::serve(app).await;
    let client = GatewayClient::new(&common::credentials(&base)).unwrap();

    let record = client
        .send_sms("+15551230000", "hi", Some("test-sms-123"), Some(1))
        .await
        .unwrap();
    assert_eq!(record.id, "test-sms-123");
    assert_eq!(record.state, MessageState::Pending);
    assert_eq!(record.recipients.len(), 1);

    let (auth, body) = captured.lock().unwrap().take().unwrap();
    // base64("sms:secret")
    assert_eq!(auth.as_deref(), Some("Basic c21zOnNlY3JldA=="));
    assert_eq!(body["id"], "test-sms-123");
    assert_eq!(body["phoneNumbers"][0], "+15551230000");
    assert_eq!(body["textMessage"]["text"], "hi");
    assert_eq!(body["withDeliveryReport"], true);
    assert_eq!(body["simNumber"], 1);
}

#[tokio::test]
async fn send_sms_rejects_unexpected_status() {
    let app = Router::new().route(
        "/message",
        post(|| async { (StatusCode::BAD_REQUEST, "invalid phone number") }),
    );
    let base = common::serve(app).await;
    let client = GatewayClient::new(&common::credentials(&base)).unwrap();

    let err = client.send_sms("+1", "hi", None, None).await.unwrap_err();
    match err {
        ClientError::Gateway { status, body, .. } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid phone number"));
        }
        other => panic!("expected gateway error, got {:?}", other),
    }
}

#[tokio::test]
async fn get_message_percent_encodes_the_id() {
    let app = Router::new().route(
        "/messages/:id",
        get(|Path(id): Path<String>| async move { Json(json!({ "id": id, "state": "Delivered" })) }),
    );
    let base = common::serve(app).await;
    let client = GatewayClient::new(&common::credentials(&base)).unwrap();

    let record = client.get_message("test sms/1").await.unwrap();
    assert_eq!(record.id, "test sms/1");
    assert_eq!(record.state, MessageState::Delivered);
}

#[tokio::test]
async fn register_webhook_accepts_201_and_null_device_id() {
    let captured: CapturedRequest = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route(
            "/webhooks",
            post(|State(cap): State<CapturedRequest>, Json(body): Json<Value>| async move {
                *cap.lock().unwrap() = Some((None, body.clone()));
                (StatusCode::CREATED, Json(body))
            }),
        )
        .with_state(captured.clone());
    let base = common::serve(app).await;
    let client = GatewayClient::new(&common::credentials(&base)).unwrap();

    let registered = client
        .register_webhook(
            "wh-1",
            "http://127.0.0.1:8787/",
            WebhookEvent::SmsReceived,
            WebhookSource::Local,
        )
        .await
        .unwrap();
    assert_eq!(registered.id, "wh-1");
    assert_eq!(registered.event, WebhookEvent::SmsReceived);
    assert!(registered.device_id.is_none());

    let (_, body) = captured.lock().unwrap().take().unwrap();
    assert!(body["deviceId"].is_null());
    assert_eq!(body["event"], "sms:received");
    assert_eq!(body["source"], "Local");
}

#[tokio::test]
async fn list_webhooks_parses_rows() {
    let app = Router::new().route(
        "/webhooks",
        get(|| async {
            Json(json!([
                { "id": "wh-1", "deviceId": null, "url": "http://h/1", "event": "sms:received", "source": "Local" },
                { "id": "wh-2", "deviceId": "dev-9", "url": "http://h/2", "event": "system:ping", "source": "Gateway" }
            ]))
        }),
    );
    let base = common::serve(app).await;
    let client = GatewayClient::new(&common::credentials(&base)).unwrap();

    let webhooks = client.list_webhooks().await.unwrap();
    assert_eq!(webhooks.len(), 2);
    assert_eq!(webhooks[0].event, WebhookEvent::SmsReceived);
    assert_eq!(webhooks[1].device_id.as_deref(), Some("dev-9"));
    assert_eq!(webhooks[1].source, WebhookSource::Gateway);
}

#[tokio::test]
async fn delete_webhook_returns_accepted_status() {
    let app = Router::new().route(
        "/webhooks/:id",
        delete(|| async { StatusCode::NO_CONTENT }),
    );
    let base = common::serve(app).await;
    let client = GatewayClient::new(&common::credentials(&base)).unwrap();

    let status = client.delete_webhook("wh-1").await.unwrap();
    assert_eq!(status, 204);
}

#[tokio::test]
async fn missing_attachment_fails_before_any_request() {
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_for_handler = hits.clone();
    let app = Router::new().route(
        "/message",
        post(move || {
            let hits = hits_for_handler.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::ACCEPTED
            }
        }),
    );
    let base = common::serve(app).await;
    let client = GatewayClient::new(&common::credentials(&base)).unwrap();

    let missing = std::path::Path::new("/definitely/not/here.png");
    let err = client
        .send_mms("+15551230000", None, missing, Some("mms-1"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::AttachmentNotFound(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn send_mms_builds_a_multipart_request() {
    let captured: CapturedRaw = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route(
            "/message",
            post(
                |State(cap): State<CapturedRaw>, headers: HeaderMap, body: axum::body::Bytes| async move {
                    let content_type = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    *cap.lock().unwrap() = Some((content_type, body.to_vec()));
                    (
                        StatusCode::OK,
                        Json(json!({ "id": "mms-1", "state": "Pending" })),
                    )
                },
            ),
        )
        .with_state(captured.clone());
    let base = common::serve(app).await;
    let client = GatewayClient::new(&common::credentials(&base)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("picture.png");
    std::fs::write(&path, b"\x89PNG not really").unwrap();

    let record = client
        .send_mms("+15551230000", Some("hello"), &path, Some("mms-1"), Some(2))
        .await
        .unwrap();
    assert_eq!(record.id, "mms-1");

    let (content_type, body) = captured.lock().unwrap().take().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("name=\"phoneNumbers\""));
    assert!(text.contains("+15551230000"));
    assert!(text.contains("name=\"text\""));
    assert!(text.contains("name=\"id\""));
    assert!(text.contains("name=\"simNumber\""));
    assert!(text.contains("name=\"file\""));
    assert!(text.contains("filename=\"picture.png\""));
    assert!(text.contains("image/png"));
}
