//! Local webhook test listener.
//!
//! Accepts gateway callbacks on any path, optionally verifies the
//! X-Signature header, and dumps each delivery to stdout. Every delivery is
//! acknowledged with 200; a bad signature is reported, never rejected.

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Listener settings, injected at construction.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret for X-Signature verification; verification is skipped when None.
    pub signing_key: Option<String>,
}

/// Outcome of checking one delivery's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid,
    /// No signing key configured, or the delivery carried no signature headers.
    Skipped,
}

#[derive(Clone)]
struct ReceiverState {
    signing_key: Option<Arc<str>>,
}

/// The signature the gateway computes for a delivery:
/// hex(HMAC-SHA256(key, body + timestamp)). Exposed so a forged delivery can
/// be crafted when testing a receiver.
pub fn sign_payload(key: &str, body: &str, timestamp: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("hmac accepts any key length");
    mac.update(body.as_bytes());
    mac.update(timestamp.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// True iff `signature_hex` matches hex(HMAC-SHA256(key, body + timestamp)).
/// The comparison runs in constant time via `Mac::verify_slice`.
pub fn verify_signature(key: &str, body: &str, timestamp: &str, signature_hex: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        return false;
    };
    mac.update(body.as_bytes());
    mac.update(timestamp.as_bytes());
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    mac.verify_slice(&signature).is_ok()
}

/// Classify a delivery: Valid/Invalid when a key and both headers are present,
/// Skipped otherwise.
pub fn check_signature(
    signing_key: Option<&str>,
    body: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
) -> SignatureCheck {
    match (signing_key, timestamp, signature) {
        (Some(key), Some(ts), Some(sig)) => {
            if verify_signature(key, body, ts, sig) {
                SignatureCheck::Valid
            } else {
                SignatureCheck::Invalid
            }
        }
        _ => SignatureCheck::Skipped,
    }
}

/// Catch-all handler: the gateway may POST to whatever path was registered.
async fn handle_delivery(
    State(state): State<ReceiverState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let body_text = String::from_utf8_lossy(&body).into_owned();
    let timestamp = headers.get("x-timestamp").and_then(|v| v.to_str().ok());
    let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());
    let check = check_signature(state.signing_key.as_deref(), &body_text, timestamp, signature);

    let delivery_id = uuid::Uuid::new_v4();
    let received_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    println!("{}", "=".repeat(72));
    println!("Webhook POST {} at {} (delivery {})", uri.path(), received_at, delivery_id);
    println!("X-Timestamp: {}", timestamp.unwrap_or("-"));
    println!("X-Signature: {}", signature.unwrap_or("-"));
    match check {
        SignatureCheck::Valid => println!("Signature valid: true"),
        SignatureCheck::Invalid => {
            println!("Signature valid: false");
            log::warn!("delivery {}: signature mismatch", delivery_id);
        }
        SignatureCheck::Skipped => {}
    }
    match serde_json::from_str::<serde_json::Value>(&body_text) {
        Ok(value) => println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or(body_text)
        ),
        Err(_) => println!("{}", body_text),
    }

    (StatusCode::OK, Json(json!({ "ok": true }))).into_response()
}

/// Run the webhook listener on config.host:config.port until Ctrl+C. Every
/// POST, on any path, is dumped and acknowledged with 200.
pub async fn run_receiver(config: ReceiverConfig) -> Result<()> {
    let verification_enabled = config.signing_key.is_some();
    let state = ReceiverState {
        signing_key: config.signing_key.map(Arc::from),
    };
    let app = Router::new().fallback(handle_delivery).with_state(state);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("webhook listener on http://{}", bind_addr);
    println!("Listening on http://{} ...", bind_addr);
    if verification_enabled {
        println!("Signature verification enabled");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook listener exited")?;
    log::info!("webhook listener stopped");
    Ok(())
}

/// Completes on SIGINT; the listener has no other shutdown path.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "test-signing-key";
    const BODY: &str = r#"{"event":"sms:received"}"#;
    const TIMESTAMP: &str = "1722945600";
    // hex(HMAC-SHA256(KEY, BODY + TIMESTAMP)), computed independently.
    const SIGNATURE: &str = "637fb6f349d5d559662657eb964de55b041edc33416bc8453e1696854231b9bb";

    #[test]
    fn known_signature_verifies() {
        assert!(verify_signature(KEY, BODY, TIMESTAMP, SIGNATURE));
        assert_eq!(sign_payload(KEY, BODY, TIMESTAMP), SIGNATURE);
    }

    #[test]
    fn single_byte_mutations_invalidate() {
        let mut body = BODY.to_string();
        body.replace_range(2..3, "E");
        assert!(!verify_signature(KEY, &body, TIMESTAMP, SIGNATURE));

        assert!(!verify_signature(KEY, BODY, "1722945601", SIGNATURE));

        let mut sig = SIGNATURE.to_string();
        sig.replace_range(0..1, "7");
        assert!(!verify_signature(KEY, BODY, TIMESTAMP, &sig));

        assert!(!verify_signature("other-key", BODY, TIMESTAMP, SIGNATURE));
    }

    #[test]
    fn malformed_hex_signature_is_invalid() {
        assert!(!verify_signature(KEY, BODY, TIMESTAMP, "not-hex"));
        assert!(!verify_signature(KEY, BODY, TIMESTAMP, ""));
    }

    #[test]
    fn missing_key_or_headers_skip_verification() {
        assert_eq!(
            check_signature(None, BODY, Some(TIMESTAMP), Some(SIGNATURE)),
            SignatureCheck::Skipped
        );
        assert_eq!(
            check_signature(Some(KEY), BODY, None, Some(SIGNATURE)),
            SignatureCheck::Skipped
        );
        assert_eq!(
            check_signature(Some(KEY), BODY, Some(TIMESTAMP), None),
            SignatureCheck::Skipped
        );
        assert_eq!(
            check_signature(Some(KEY), BODY, Some(TIMESTAMP), Some(SIGNATURE)),
            SignatureCheck::Valid
        );
        assert_eq!(
            check_signature(Some(KEY), "{}", Some(TIMESTAMP), Some(SIGNATURE)),
            SignatureCheck::Invalid
        );
    }
}
