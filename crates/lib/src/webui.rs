//! Browser-based fallback GUI: one HTML form over the gateway client.
//!
//! A single `FormState` lives behind a mutex for the whole process; one
//! interactive user is assumed. `GET /` renders the form with the current
//! values and last output; `POST /run` applies the submitted fields, runs the
//! selected action, and redirects back to `/`.

use crate::client::GatewayClient;
use crate::config::{self, Config, Credentials};
use crate::poll;
use anyhow::{bail, Context, Result};
use axum::extract::State;
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Browser UI server settings.
#[derive(Debug, Clone)]
pub struct WebUiConfig {
    pub bind: String,
    pub port: u16,
}

/// Form fields plus the last action output, all kept as entered.
#[derive(Debug, Clone)]
pub struct FormState {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: String,
    pub to: String,
    pub message_id: String,
    pub sim_number: String,
    pub sms_text: String,
    pub mms_text: String,
    pub mms_file: String,
    pub poll_wait: String,
    pub poll_interval: String,
    pub output: String,
}

impl FormState {
    /// Initial values: connection fields seeded from env/config, texts from
    /// the kit defaults.
    pub fn seeded(config: &Config) -> Self {
        Self {
            base_url: config::resolve_base_url(None, config).unwrap_or_default(),
            username: config::resolve_username(None, config).unwrap_or_else(|| "sms".to_string()),
            password: config::resolve_password(None, config).unwrap_or_default(),
            timeout: "20".to_string(),
            to: String::new(),
            message_id: String::new(),
            sim_number: String::new(),
            sms_text: "Hello from MessageGate Web UI".to_string(),
            mms_text: "Hello MMS from MessageGate Web UI".to_string(),
            mms_file: String::new(),
            poll_wait: "120".to_string(),
            poll_interval: "3".to_string(),
            output: "Ready".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunForm {
    #[serde(default)]
    action: String,
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    timeout: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    message_id: String,
    #[serde(default)]
    sim_number: String,
    #[serde(default)]
    sms_text: String,
    #[serde(default)]
    mms_text: String,
    #[serde(default)]
    mms_file: String,
    #[serde(default)]
    poll_wait: String,
    #[serde(default)]
    poll_interval: String,
}

#[derive(Clone)]
struct WebUiState {
    form: Arc<Mutex<FormState>>,
}

fn parse_seconds(value: &str, default: u64) -> Result<u64> {
    let v = value.trim();
    if v.is_empty() {
        return Ok(default);
    }
    v.parse().with_context(|| format!("invalid number: {}", v))
}

fn parse_sim(value: &str) -> Result<Option<u8>> {
    let v = value.trim();
    if v.is_empty() {
        return Ok(None);
    }
    let sim = v
        .parse()
        .with_context(|| format!("invalid SIM number: {}", v))?;
    Ok(Some(sim))
}

fn unix_ts() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Current message id, or a generated `<prefix>-<unix-ts>` one written back
/// into the form so a later poll targets the same message.
fn effective_message_id(form: &mut FormState, prefix: &str) -> String {
    let current = form.message_id.trim().to_string();
    if !current.is_empty() {
        return current;
    }
    let generated = format!("{}-{}", prefix, unix_ts());
    form.message_id = generated.clone();
    generated
}

/// Poll to a final state using the form's wait/interval fields.
async fn poll_to_final(
    form: &FormState,
    client: &GatewayClient,
    id: &str,
) -> Result<poll::PollOutcome> {
    let wait = parse_seconds(&form.poll_wait, 120)?;
    let interval = parse_seconds(&form.poll_interval, 3)?;
    let outcome = poll::poll_message(
        client,
        id,
        Duration::from_secs(wait),
        Duration::from_secs(interval),
        &mut |_| {},
    )
    .await?;
    Ok(outcome)
}

async fn run_action(form: &mut FormState, action: &str) -> Result<serde_json::Value> {
    let timeout = parse_seconds(&form.timeout, 20)?;
    let credentials = Credentials::new(
        &form.base_url,
        &form.username,
        &form.password,
        Duration::from_secs(timeout),
    )?;
    let client = GatewayClient::new(&credentials)?;

    match action {
        "health" => Ok(json!({ "health": client.health().await? })),
        "send_sms" => {
            let to = form.to.trim().to_string();
            if to.is_empty() {
                bail!("recipient number is required");
            }
            let text = form.sms_text.trim().to_string();
            if text.is_empty() {
                bail!("SMS text is required");
            }
            let sim = parse_sim(&form.sim_number)?;
            let id = effective_message_id(form, "webui-sms");
            let sent = client.send_sms(&to, &text, Some(&id), sim).await?;
            let outcome = poll_to_final(form, &client, &id).await?;
            Ok(json!({ "send": sent, "final": outcome.record, "timedOut": outcome.timed_out }))
        }
        "send_mms" => {
            let to = form.to.trim().to_string();
            if to.is_empty() {
                bail!("recipient number is required");
            }
            let path = form.mms_file.trim().to_string();
            if path.is_empty() {
                bail!("MMS file path is required");
            }
            let sim = parse_sim(&form.sim_number)?;
            let id = effective_message_id(form, "webui-mms");
            let text = form.mms_text.trim().to_string();
            let text = if text.is_empty() { None } else { Some(text) };
            let sent = client
                .send_mms(&to, text.as_deref(), path.as_ref(), Some(&id), sim)
                .await?;
            let outcome = poll_to_final(form, &client, &id).await?;
            Ok(json!({ "send": sent, "final": outcome.record, "timedOut": outcome.timed_out }))
        }
        "poll_message" => {
            let id = form.message_id.trim().to_string();
            if id.is_empty() {
                bail!("message ID is required");
            }
            let outcome = poll_to_final(form, &client, &id).await?;
            Ok(json!({ "message": outcome.record, "timedOut": outcome.timed_out }))
        }
        other => bail!("unknown action: {}", other),
    }
}

async fn index(State(state): State<WebUiState>) -> Html<String> {
    let form = state.form.lock().await;
    Html(render_page(&form))
}

async fn run(State(state): State<WebUiState>, Form(input): Form<RunForm>) -> Redirect {
    let mut form = state.form.lock().await;
    form.base_url = input.base_url;
    form.username = input.username;
    form.password = input.password;
    form.timeout = input.timeout;
    form.to = input.to;
    form.message_id = input.message_id;
    form.sim_number = input.sim_number;
    form.sms_text = input.sms_text;
    form.mms_text = input.mms_text;
    form.mms_file = input.mms_file;
    form.poll_wait = input.poll_wait;
    form.poll_interval = input.poll_interval;

    match run_action(&mut form, &input.action).await {
        Ok(value) => {
            form.output =
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        }
        Err(e) => {
            log::debug!("web UI action {} failed: {}", input.action, e);
            form.output = format!("ERROR: {:#}", e);
        }
    }
    Redirect::to("/")
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_page(form: &FormState) -> String {
    format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8" />
  <title>MessageGate Web UI</title>
  <style>
    body {{ font-family: Arial, sans-serif; margin: 18px; background: #f6f8fb; color: #1b1f24; }}
    .box {{ background: #fff; border: 1px solid #d8e0ea; border-radius: 8px; padding: 12px; margin-bottom: 12px; }}
    label {{ display: block; font-size: 12px; color: #4a5568; margin-top: 8px; }}
    input {{ width: 100%; padding: 8px; box-sizing: border-box; border: 1px solid #cbd5e0; border-radius: 6px; }}
    .row {{ display: grid; grid-template-columns: 1fr 1fr 1fr; gap: 10px; }}
    .row4 {{ display: grid; grid-template-columns: 2fr 1fr 1fr 1fr; gap: 10px; }}
    button {{ margin-right: 8px; margin-top: 10px; padding: 10px 14px; border: 0; border-radius: 6px; background: #0e7490; color: white; cursor: pointer; }}
    pre {{ background: #0f172a; color: #e2e8f0; padding: 12px; border-radius: 8px; max-height: 360px; overflow: auto; }}
    .hint {{ font-size: 12px; color: #64748b; }}
  </style>
</head>
<body>
  <h2>MessageGate Web UI</h2>
  <form method="post" action="/run">
    <div class="box">
      <h3>Connection</h3>
      <div class="row4">
        <div>
          <label>Base URL</label>
          <input name="base_url" value="{base_url}" />
        </div>
        <div>
          <label>Username</label>
          <input name="username" value="{username}" />
        </div>
        <div>
          <label>Password</label>
          <input name="password" type="password" value="{password}" />
        </div>
        <div>
          <label>Timeout</label>
          <input name="timeout" value="{timeout}" />
        </div>
      </div>
    </div>

    <div class="box">
      <h3>Message</h3>
      <div class="row">
        <div>
          <label>To (E.164)</label>
          <input name="to" value="{to}" />
        </div>
        <div>
          <label>Message ID</label>
          <input name="message_id" value="{message_id}" />
        </div>
        <div>
          <label>SIM number (optional)</label>
          <input name="sim_number" value="{sim_number}" />
        </div>
      </div>
      <label>SMS text</label>
      <input name="sms_text" value="{sms_text}" />
      <label>MMS text</label>
      <input name="mms_text" value="{mms_text}" />
      <label>MMS file path (on this computer)</label>
      <input name="mms_file" value="{mms_file}" />

      <div class="row">
        <div>
          <label>Poll wait seconds</label>
          <input name="poll_wait" value="{poll_wait}" />
        </div>
        <div>
          <label>Poll interval seconds</label>
          <input name="poll_interval" value="{poll_interval}" />
        </div>
      </div>

      <div>
        <button name="action" value="health">Health</button>
        <button name="action" value="send_sms">Send SMS</button>
        <button name="action" value="send_mms">Send MMS</button>
        <button name="action" value="poll_message">Poll Message</button>
      </div>
      <p class="hint">MMS uses a local file path on the machine running this server.</p>
    </div>
  </form>

  <div class="box">
    <h3>Output</h3>
    <pre>{output}</pre>
  </div>
</body>
</html>
"#,
        base_url = html_escape(&form.base_url),
        username = html_escape(&form.username),
        password = html_escape(&form.password),
        timeout = html_escape(&form.timeout),
        to = html_escape(&form.to),
        message_id = html_escape(&form.message_id),
        sim_number = html_escape(&form.sim_number),
        sms_text = html_escape(&form.sms_text),
        mms_text = html_escape(&form.mms_text),
        mms_file = html_escape(&form.mms_file),
        poll_wait = html_escape(&form.poll_wait),
        poll_interval = html_escape(&form.poll_interval),
        output = html_escape(&form.output),
    )
}

/// Run the browser UI server on config.bind:config.port until Ctrl+C.
pub async fn run_web_ui(config: WebUiConfig, kit_config: &Config) -> Result<()> {
    let state = WebUiState {
        form: Arc::new(Mutex::new(FormState::seeded(kit_config))),
    };
    let app = Router::new()
        .route("/", get(index))
        .route("/run", post(run))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("web UI listening at http://{}", bind_addr);
    println!("MessageGate web UI listening at http://{}/", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("web UI server exited")?;
    log::info!("web UI stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
