use anyhow::Result;
use clap::{Parser, Subcommand};
use lib::client::{GatewayClient, WebhookEvent, WebhookSource};
use lib::config::{self, Config};
use lib::poll::{self, PollOutcome};
use lib::receiver::{self, ReceiverConfig};
use lib::webui::{self, WebUiConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "smsgate-kit")]
#[command(about = "MessageGate test kit", long_about = None)]
struct Cli {
    /// Gateway base URL, e.g. http://192.168.0.37:8080 (default: SMSGATE_URL)
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Basic auth username (default: SMSGATE_USER)
    #[arg(long, global = true)]
    username: Option<String>,

    /// Basic auth password (default: SMSGATE_PASS)
    #[arg(long, global = true)]
    password: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Config file path (default: SMSGATE_KIT_CONFIG_PATH or ~/.smsgate-kit/config.json)
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the gateway /health endpoint
    Health,

    /// Send an SMS via /message
    SendSms {
        /// Recipient phone number in E.164 format
        #[arg(long)]
        to: String,

        /// SMS text
        #[arg(long)]
        text: String,

        /// Message id (default: test-sms-<unix-ts>)
        #[arg(long)]
        id: Option<String>,

        /// SIM slot (1-based)
        #[arg(long)]
        sim_number: Option<u8>,

        /// Poll the delivery state until final
        #[arg(long)]
        poll: bool,

        /// Polling deadline in seconds
        #[arg(long, default_value_t = 90)]
        wait_seconds: u64,

        /// Polling interval in seconds
        #[arg(long, default_value_t = 3)]
        interval: u64,
    },

    /// Send an MMS via multipart /message
    SendMms {
        /// Recipient phone number in E.164 format
        #[arg(long)]
        to: String,

        /// Attachment file path
        #[arg(long)]
        file: PathBuf,

        /// Optional MMS text
        #[arg(long)]
        text: Option<String>,

        /// Message id (default: test-mms-<unix-ts>)
        #[arg(long)]
        id: Option<String>,

        /// SIM slot (1-based)
        #[arg(long)]
        sim_number: Option<u8>,

        /// Poll the delivery state until final
        #[arg(long)]
        poll: bool,

        /// Polling deadline in seconds
        #[arg(long, default_value_t = 120)]
        wait_seconds: u64,

        /// Polling interval in seconds
        #[arg(long, default_value_t = 3)]
        interval: u64,
    },

    /// Get a message's current state by id
    Message {
        #[arg(long)]
        id: String,
    },

    /// List configured webhooks
    WebhooksList,

    /// Register a webhook
    WebhooksRegister {
        /// Webhook id
        #[arg(long)]
        id: String,

        /// Callback URL the gateway will POST to
        #[arg(long)]
        url: String,

        /// Event type: sms:received, sms:sent, sms:delivered, sms:failed,
        /// sms:data-received, mms:received, or system:ping
        #[arg(long)]
        event: WebhookEvent,

        /// Registration source: Local, Cloud, or Gateway
        #[arg(long, default_value = "Local")]
        source: WebhookSource,
    },

    /// Delete a webhook
    WebhooksDelete {
        #[arg(long)]
        id: String,
    },

    /// Health + SMS (+ optional MMS) quick smoke test
    Smoke {
        /// Recipient phone number in E.164 format
        #[arg(long)]
        to: String,

        #[arg(long, default_value = "MessageGate smoke SMS")]
        sms_text: String,

        /// Optional file path for the MMS leg
        #[arg(long)]
        mms_file: Option<PathBuf>,

        #[arg(long, default_value = "MessageGate smoke MMS")]
        mms_text: String,

        /// SIM slot (1-based)
        #[arg(long)]
        sim_number: Option<u8>,

        /// Polling deadline in seconds
        #[arg(long, default_value_t = 120)]
        wait_seconds: u64,

        /// Polling interval in seconds
        #[arg(long, default_value_t = 3)]
        interval: u64,
    },

    /// Run the local webhook test listener
    ListenWebhooks {
        /// Bind address (default from config or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Listener port (default from config or 8787)
        #[arg(long)]
        port: Option<u16>,

        /// Signing key for X-Signature verification (verification skipped when absent)
        #[arg(long)]
        signing_key: Option<String>,
    },

    /// Run the browser UI server
    WebUi {
        /// Bind address (default from config or 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,

        /// Port (default from config or 8765)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (config, _path) = config::load_config(cli.config.clone())?;

    match cli.command {
        Commands::Health => {
            let client = client_from(&cli, &config)?;
            print_json(&client.health().await?)
        }
        Commands::SendSms {
            ref to,
            ref text,
            ref id,
            sim_number,
            poll,
            wait_seconds,
            interval,
        } => {
            let client = client_from(&cli, &config)?;
            let id = id.clone().unwrap_or_else(|| format!("test-sms-{}", unix_ts()));
            let response = client.send_sms(to, text, Some(&id), sim_number).await?;
            println!("send response:");
            print_json(&serde_json::to_value(&response)?)?;
            if poll {
                let outcome = poll_and_print(&client, &id, wait_seconds, interval).await?;
                println!("final state:");
                print_json(&serde_json::to_value(&outcome.record)?)?;
            }
            Ok(())
        }
        Commands::SendMms {
            ref to,
            ref file,
            ref text,
            ref id,
            sim_number,
            poll,
            wait_seconds,
            interval,
        } => {
            let client = client_from(&cli, &config)?;
            let id = id.clone().unwrap_or_else(|| format!("test-mms-{}", unix_ts()));
            let response = client
                .send_mms(to, text.as_deref(), file, Some(&id), sim_number)
                .await?;
            println!("send response:");
            print_json(&serde_json::to_value(&response)?)?;
            if poll {
                let outcome = poll_and_print(&client, &id, wait_seconds, interval).await?;
                println!("final state:");
                print_json(&serde_json::to_value(&outcome.record)?)?;
            }
            Ok(())
        }
        Commands::Message { ref id } => {
            let client = client_from(&cli, &config)?;
            let record = client.get_message(id).await?;
            print_json(&serde_json::to_value(&record)?)
        }
        Commands::WebhooksList => {
            let client = client_from(&cli, &config)?;
            let webhooks = client.list_webhooks().await?;
            print_json(&serde_json::to_value(&webhooks)?)
        }
        Commands::WebhooksRegister {
            ref id,
            ref url,
            event,
            source,
        } => {
            let client = client_from(&cli, &config)?;
            let registered = client.register_webhook(id, url, event, source).await?;
            print_json(&serde_json::to_value(&registered)?)
        }
        Commands::WebhooksDelete { ref id } => {
            let client = client_from(&cli, &config)?;
            let status = client.delete_webhook(id).await?;
            println!("deleted webhook {}, status={}", id, status);
            Ok(())
        }
        Commands::Smoke {
            ref to,
            ref sms_text,
            ref mms_file,
            ref mms_text,
            sim_number,
            wait_seconds,
            interval,
        } => {
            let client = client_from(&cli, &config)?;
            run_smoke(
                &client,
                to,
                sms_text,
                mms_file.as_deref(),
                mms_text,
                sim_number,
                wait_seconds,
                interval,
            )
            .await
        }
        Commands::ListenWebhooks {
            ref host,
            port,
            ref signing_key,
        } => {
            let receiver_config = ReceiverConfig {
                host: host.clone().unwrap_or_else(|| config.listener.host.clone()),
                port: port.unwrap_or(config.listener.port),
                signing_key: signing_key.clone().or_else(|| config.listener.signing_key.clone()),
            };
            receiver::run_receiver(receiver_config).await
        }
        Commands::WebUi { ref bind, port } => {
            let web_config = WebUiConfig {
                bind: bind.clone().unwrap_or_else(|| config.web.bind.clone()),
                port: port.unwrap_or(config.web.port),
            };
            webui::run_web_ui(web_config, &config).await
        }
    }
}

fn client_from(cli: &Cli, config: &Config) -> Result<GatewayClient> {
    let credentials = config::resolve_credentials(
        cli.base_url.as_deref(),
        cli.username.as_deref(),
        cli.password.as_deref(),
        cli.timeout,
        config,
    )?;
    Ok(GatewayClient::new(&credentials)?)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn unix_ts() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Poll to a final state, printing each observed state. Reaching the deadline
/// is reported but is not a failure; the caller still gets the last record.
async fn poll_and_print(
    client: &GatewayClient,
    id: &str,
    wait_seconds: u64,
    interval: u64,
) -> Result<PollOutcome> {
    let outcome = poll::poll_message(
        client,
        id,
        Duration::from_secs(wait_seconds),
        Duration::from_secs(interval),
        &mut |record| println!("state={}", record.state),
    )
    .await?;
    if outcome.timed_out {
        println!("polling deadline reached before a final state");
    }
    Ok(outcome)
}

async fn run_smoke(
    client: &GatewayClient,
    to: &str,
    sms_text: &str,
    mms_file: Option<&std::path::Path>,
    mms_text: &str,
    sim_number: Option<u8>,
    wait_seconds: u64,
    interval: u64,
) -> Result<()> {
    println!("[1/4] health");
    print_json(&client.health().await?)?;

    println!("[2/4] send sms");
    let sms_id = format!("smoke-sms-{}", unix_ts());
    let response = client.send_sms(to, sms_text, Some(&sms_id), sim_number).await?;
    print_json(&serde_json::to_value(&response)?)?;
    let sms_final = poll_and_print(client, &sms_id, wait_seconds, interval).await?;
    println!("sms final:");
    print_json(&serde_json::to_value(&sms_final.record)?)?;

    if let Some(file) = mms_file {
        println!("[3/4] send mms");
        let mms_id = format!("smoke-mms-{}", unix_ts());
        let response = client
            .send_mms(to, Some(mms_text), file, Some(&mms_id), sim_number)
            .await?;
        print_json(&serde_json::to_value(&response)?)?;
        let mms_final = poll_and_print(client, &mms_id, wait_seconds, interval).await?;
        println!("mms final:");
        print_json(&serde_json::to_value(&mms_final.record)?)?;
    }

    println!("[4/4] done");
    Ok(())
}
