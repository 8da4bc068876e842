//! MessageGate HTTP API client: health, message send (JSON and multipart),
//! message state lookup, and webhook CRUD. All calls except health carry
//! Basic auth.

use crate::config::Credentials;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Path-segment encoding: percent-encode everything except unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection, TLS, or timeout failure before a response arrived.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The gateway answered with a status outside the accepted set for the operation.
    #[error("{op} failed with status {status}: {body}")]
    Gateway {
        op: &'static str,
        status: u16,
        body: String,
    },
    #[error("attachment not found: {0}")]
    AttachmentNotFound(PathBuf),
    #[error("reading attachment {path}: {source}")]
    AttachmentRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Delivery state of a message. `Sent`, `Delivered`, and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageState {
    Pending,
    Processed,
    Sent,
    Delivered,
    Failed,
    /// Any state this kit does not know about yet.
    #[serde(other)]
    Unknown,
}

impl MessageState {
    /// True when no further transition is expected; polling stops here.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            MessageState::Sent | MessageState::Delivered | MessageState::Failed
        )
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageState::Pending => "Pending",
            MessageState::Processed => "Processed",
            MessageState::Sent => "Sent",
            MessageState::Delivered => "Delivered",
            MessageState::Failed => "Failed",
            MessageState::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Per-recipient delivery state within a message record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub phone_number: String,
    pub state: MessageState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A message as the gateway reports it. Fields beyond id/state/recipients
/// (deviceId, isHashed, per-state timestamps, ...) are passed through so
/// output shows exactly what the gateway sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub state: MessageState,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Webhook event type, by its wire name (e.g. `sms:received`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEvent {
    #[serde(rename = "sms:received")]
    SmsReceived,
    #[serde(rename = "sms:sent")]
    SmsSent,
    #[serde(rename = "sms:delivered")]
    SmsDelivered,
    #[serde(rename = "sms:failed")]
    SmsFailed,
    #[serde(rename = "sms:data-received")]
    SmsDataReceived,
    #[serde(rename = "mms:received")]
    MmsReceived,
    #[serde(rename = "system:ping")]
    SystemPing,
    /// An event type this kit does not know about yet.
    #[serde(other)]
    Unknown,
}

impl WebhookEvent {
    /// All known events, in wire order (for help text).
    pub const KNOWN: [WebhookEvent; 7] = [
        WebhookEvent::SmsReceived,
        WebhookEvent::SmsSent,
        WebhookEvent::SmsDelivered,
        WebhookEvent::SmsFailed,
        WebhookEvent::SmsDataReceived,
        WebhookEvent::MmsReceived,
        WebhookEvent::SystemPing,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            WebhookEvent::SmsReceived => "sms:received",
            WebhookEvent::SmsSent => "sms:sent",
            WebhookEvent::SmsDelivered => "sms:delivered",
            WebhookEvent::SmsFailed => "sms:failed",
            WebhookEvent::SmsDataReceived => "sms:data-received",
            WebhookEvent::MmsReceived => "mms:received",
            WebhookEvent::SystemPing => "system:ping",
            WebhookEvent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for WebhookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WebhookEvent::KNOWN
            .into_iter()
            .find(|e| e.wire_name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = WebhookEvent::KNOWN.iter().map(|e| e.wire_name()).collect();
                format!("unknown webhook event: {} (expected one of {})", s, known.join(", "))
            })
    }
}

/// Where a webhook registration lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookSource {
    Local,
    Cloud,
    Gateway,
}

impl fmt::Display for WebhookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WebhookSource::Local => "Local",
            WebhookSource::Cloud => "Cloud",
            WebhookSource::Gateway => "Gateway",
        };
        f.write_str(name)
    }
}

impl FromStr for WebhookSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Local" => Ok(WebhookSource::Local),
            "Cloud" => Ok(WebhookSource::Cloud),
            "Gateway" => Ok(WebhookSource::Gateway),
            other => Err(format!(
                "unknown webhook source: {} (expected Local, Cloud, or Gateway)",
                other
            )),
        }
    }
}

/// A webhook registration row. `device_id` stays null when registering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRegistration {
    pub id: String,
    #[serde(default)]
    pub device_id: Option<String>,
    pub url: String,
    pub event: WebhookEvent,
    pub source: WebhookSource,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextMessage {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    phone_numbers: Vec<String>,
    text_message: TextMessage,
    with_delivery_report: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sim_number: Option<u8>,
}

/// Guess a MIME type from the file extension; `application/octet-stream` when unknown.
pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("mp4") => "video/mp4",
        Some("3gp") => "video/3gpp",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        Some("amr") => "audio/amr",
        Some("txt") => "text/plain",
        Some("vcf") => "text/vcard",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Client for the MessageGate local-server HTTP API. Connections are not
/// pooled: each call opens and closes its own.
#[derive(Clone)]
pub struct GatewayClient {
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(credentials: &Credentials) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(credentials.timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self {
            base_url: credentials.base_url.clone(),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET /health — unauthenticated probe. Succeeds only on 200.
    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        let res = self.client.get(self.url("/health")).send().await?;
        let status = res.status().as_u16();
        if status != 200 {
            let body = res.text().await.unwrap_or_default();
            return Err(ClientError::Gateway {
                op: "health",
                status,
                body,
            });
        }
        Ok(res.json().await?)
    }

    /// POST /message — send an SMS with a delivery report requested. Succeeds
    /// on 200 or 202.
    pub async fn send_sms(
        &self,
        to: &str,
        text: &str,
        id: Option<&str>,
        sim_number: Option<u8>,
    ) -> Result<MessageRecord, ClientError> {
        let payload = SendMessageRequest {
            id: id.map(str::to_string),
            phone_numbers: vec![to.to_string()],
            text_message: TextMessage {
                text: text.to_string(),
            },
            with_delivery_report: true,
            sim_number,
        };
        let res = self
            .client
            .post(self.url("/message"))
            .basic_auth(&self.username, Some(&self.password))
            .json(&payload)
            .send()
            .await?;
        let status = res.status().as_u16();
        if status != 200 && status != 202 {
            let body = res.text().await.unwrap_or_default();
            return Err(ClientError::Gateway {
                op: "send sms",
                status,
                body,
            });
        }
        Ok(res.json().await?)
    }

    /// POST /message as multipart/form-data — send an MMS with one file part.
    /// The attachment must exist locally; the check happens before any network
    /// call. Succeeds on 200 or 202.
    pub async fn send_mms(
        &self,
        to: &str,
        text: Option<&str>,
        file: &Path,
        id: Option<&str>,
        sim_number: Option<u8>,
    ) -> Result<MessageRecord, ClientError> {
        if !file.is_file() {
            return Err(ClientError::AttachmentNotFound(file.to_path_buf()));
        }
        let data = tokio::fs::read(file)
            .await
            .map_err(|e| ClientError::AttachmentRead {
                path: file.to_path_buf(),
                source: e,
            })?;
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
            .to_string();

        let mut form = reqwest::multipart::Form::new().text("phoneNumbers", to.to_string());
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            form = form.text("text", text.to_string());
        }
        if let Some(id) = id {
            form = form.text("id", id.to_string());
        }
        if let Some(sim) = sim_number {
            form = form.text("simNumber", sim.to_string());
        }
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename)
            .mime_str(guess_mime_type(file))?;
        form = form.part("file", part);

        let res = self
            .client
            .post(self.url("/message"))
            .basic_auth(&self.username, Some(&self.password))
            .multipart(form)
            .send()
            .await?;
        let status = res.status().as_u16();
        if status != 200 && status != 202 {
            let body = res.text().await.unwrap_or_default();
            return Err(ClientError::Gateway {
                op: "send mms",
                status,
                body,
            });
        }
        Ok(res.json().await?)
    }

    /// GET /messages/{id} — current record including delivery state. Succeeds
    /// only on 200.
    pub async fn get_message(&self, id: &str) -> Result<MessageRecord, ClientError> {
        let encoded = utf8_percent_encode(id, PATH_SEGMENT);
        let res = self
            .client
            .get(self.url(&format!("/messages/{}", encoded)))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let status = res.status().as_u16();
        if status != 200 {
            let body = res.text().await.unwrap_or_default();
            return Err(ClientError::Gateway {
                op: "get message",
                status,
                body,
            });
        }
        Ok(res.json().await?)
    }

    /// GET /webhooks — all registrations. Succeeds only on 200.
    pub async fn list_webhooks(&self) -> Result<Vec<WebhookRegistration>, ClientError> {
        let res = self
            .client
            .get(self.url("/webhooks"))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let status = res.status().as_u16();
        if status != 200 {
            let body = res.text().await.unwrap_or_default();
            return Err(ClientError::Gateway {
                op: "list webhooks",
                status,
                body,
            });
        }
        Ok(res.json().await?)
    }

    /// POST /webhooks — register a callback URL for an event. Succeeds on 200
    /// or 201.
    pub async fn register_webhook(
        &self,
        id: &str,
        url: &str,
        event: WebhookEvent,
        source: WebhookSource,
    ) -> Result<WebhookRegistration, ClientError> {
        let payload = WebhookRegistration {
            id: id.to_string(),
            device_id: None,
            url: url.to_string(),
            event,
            source,
            extra: serde_json::Map::new(),
        };
        let res = self
            .client
            .post(self.url("/webhooks"))
            .basic_auth(&self.username, Some(&self.password))
            .json(&payload)
            .send()
            .await?;
        let status = res.status().as_u16();
        if status != 200 && status != 201 {
            let body = res.text().await.unwrap_or_default();
            return Err(ClientError::Gateway {
                op: "register webhook",
                status,
                body,
            });
        }
        Ok(res.json().await?)
    }

    /// DELETE /webhooks/{id}. Succeeds on 200 or 204; returns the status.
    pub async fn delete_webhook(&self, id: &str) -> Result<u16, ClientError> {
        let encoded = utf8_percent_encode(id, PATH_SEGMENT);
        let res = self
            .client
            .delete(self.url(&format!("/webhooks/{}", encoded)))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        let status = res.status().as_u16();
        if status != 200 && status != 204 {
            let body = res.text().await.unwrap_or_default();
            return Err(ClientError::Gateway {
                op: "delete webhook",
                status,
                body,
            });
        }
        Ok(status)
    }
}
