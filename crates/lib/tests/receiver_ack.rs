//! Webhook receiver: every delivery is acknowledged with 200 `{"ok":true}`,
//! whatever the signature outcome.

mod common;

use lib::receiver::{self, ReceiverConfig};
use serde_json::Value;
use std::time::Duration;

const SIGNING_KEY: &str = "test-signing-key";

/// Boot the receiver on a free loopback port and wait until it answers.
async fn start_receiver(signing_key: Option<&str>) -> String {
    let port = common::free_port();
    let config = ReceiverConfig {
        host: "127.0.0.1".to_string(),
        port,
        signing_key: signing_key.map(String::from),
    };
    tokio::spawn(async move {
        let _ = receiver::run_receiver(config).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if client.post(format!("{}/warmup", base)).send().await.is_ok() {
            return base;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("receiver did not start on {}", base);
}

async fn post_delivery(
    base: &str,
    body: &'static str,
    timestamp: Option<&str>,
    signature: Option<&str>,
) -> (u16, Value) {
    let client = reqwest::Client::new();
    let mut req = client.post(format!("{}/webhook", base)).body(body);
    if let Some(ts) = timestamp {
        req = req.header("X-Timestamp", ts);
    }
    if let Some(sig) = signature {
        req = req.header("X-Signature", sig);
    }
    let res = req.send().await.expect("post delivery");
    let status = res.status().as_u16();
    let ack: Value = res.json().await.expect("ack body");
    (status, ack)
}

#[tokio::test]
async fn acknowledges_a_valid_signature() {
    let base = start_receiver(Some(SIGNING_KEY)).await;
    let body = r#"{"event":"sms:received","payload":{"phoneNumber":"+15551230000"}}"#;
    let timestamp = "1722945600";
    let signature = receiver::sign_payload(SIGNING_KEY, body, timestamp);

    let (status, ack) = post_delivery(&base, body, Some(timestamp), Some(&signature)).await;
    assert_eq!(status, 200);
    assert_eq!(ack["ok"], true);
}

#[tokio::test]
async fn acknowledges_a_tampered_signature() {
    let base = start_receiver(Some(SIGNING_KEY)).await;
    let body = r#"{"event":"sms:received"}"#;
    let timestamp = "1722945600";
    let mut signature = receiver::sign_payload(SIGNING_KEY, body, timestamp);
    // Flip the first hex digit; the mismatch is reported but never rejected.
    let flipped = if signature.starts_with('0') { "1" } else { "0" };
    signature.replace_range(0..1, flipped);

    let (status, ack) = post_delivery(&base, body, Some(timestamp), Some(&signature)).await;
    assert_eq!(status, 200);
    assert_eq!(ack["ok"], true);
}

#[tokio::test]
async fn acknowledges_without_signing_key_or_headers() {
    let base = start_receiver(None).await;

    let (status, ack) = post_delivery(&base, r#"{"event":"system:ping"}"#, None, None).await;
    assert_eq!(status, 200);
    assert_eq!(ack["ok"], true);
}

#[tokio::test]
async fn acknowledges_a_non_json_body() {
    let base = start_receiver(Some(SIGNING_KEY)).await;

    let (status, ack) = post_delivery(&base, "plain text delivery", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(ack["ok"], true);
}
