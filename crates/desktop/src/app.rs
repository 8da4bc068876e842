//! MessageGate test kit desktop — egui app state and UI.
//!
//! One gateway action runs at a time on a background thread; progress lines
//! and the final result come back over an mpsc channel polled every frame.

use eframe::egui;
use lib::client::GatewayClient;
use lib::config::{self, Credentials};
use lib::poll;
use std::future::Future;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// One line of progress or the final result from a background action.
enum TaskEvent {
    Line(String),
    Done(Result<String, String>),
}

/// Run a gateway future to completion on a fresh runtime. Called from worker
/// threads only; blocking is fine there.
fn block_on<T>(future: impl Future<Output = T>) -> Result<T, String> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
    Ok(rt.block_on(future))
}

fn parse_u64(value: &str, default: u64) -> Result<u64, String> {
    let v = value.trim();
    if v.is_empty() {
        return Ok(default);
    }
    v.parse().map_err(|_| format!("invalid number: {}", v))
}

fn parse_sim(value: &str) -> Result<Option<u8>, String> {
    let v = value.trim();
    if v.is_empty() {
        return Ok(None);
    }
    v.parse()
        .map(Some)
        .map_err(|_| format!("invalid SIM number: {}", v))
}

fn unix_ts() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct KitApp {
    base_url: String,
    username: String,
    password: String,
    timeout: String,
    to: String,
    message_id: String,
    sim_number: String,
    sms_text: String,
    mms_text: String,
    mms_file: String,
    poll_wait: String,
    poll_interval: String,
    /// Accumulated output log shown in the scroll area.
    output: String,
    /// When Some, an action is in flight; events are read here each frame.
    task_receiver: Option<mpsc::Receiver<TaskEvent>>,
    /// Label of the in-flight action (for the started/completed lines).
    task_label: &'static str,
    task_started: Option<Instant>,
}

impl KitApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let (config, _) = config::load_config(None)
            .unwrap_or((config::Config::default(), std::path::PathBuf::new()));
        log::info!("desktop started");
        Self {
            base_url: config::resolve_base_url(None, &config).unwrap_or_default(),
            username: config::resolve_username(None, &config).unwrap_or_else(|| "sms".to_string()),
            password: config::resolve_password(None, &config).unwrap_or_default(),
            timeout: "20".to_string(),
            to: String::new(),
            message_id: String::new(),
            sim_number: String::new(),
            sms_text: "Hello from MessageGate GUI".to_string(),
            mms_text: "Hello MMS from MessageGate GUI".to_string(),
            mms_file: String::new(),
            poll_wait: "120".to_string(),
            poll_interval: "3".to_string(),
            output: "Ready".to_string(),
            task_receiver: None,
            task_label: "",
            task_started: None,
        }
    }

    fn busy(&self) -> bool {
        self.task_receiver.is_some()
    }

    fn append(&mut self, line: &str) {
        if !self.output.is_empty() {
            self.output.push('\n');
        }
        self.output.push_str(line);
    }

    /// Drain pending task events and fold them into the output log. Call each frame.
    fn poll_task_events(&mut self) {
        loop {
            let event = match &self.task_receiver {
                Some(rx) => match rx.try_recv() {
                    Ok(e) => e,
                    Err(mpsc::TryRecvError::Empty) => break,
                    Err(mpsc::TryRecvError::Disconnected) => {
                        self.task_receiver = None;
                        break;
                    }
                },
                None => break,
            };
            match event {
                TaskEvent::Line(line) => self.append(&line),
                TaskEvent::Done(result) => {
                    let label = self.task_label;
                    let elapsed = self
                        .task_started
                        .map(|t| t.elapsed().as_secs_f32())
                        .unwrap_or(0.0);
                    match result {
                        Ok(text) => {
                            self.append(&format!("[{}] completed in {:.1}s", label, elapsed));
                            self.append(&text);
                        }
                        Err(e) => self.append(&format!("[{}] ERROR: {}", label, e)),
                    }
                    self.task_receiver = None;
                    self.task_started = None;
                    break;
                }
            }
        }
    }

    /// Spawn `work` on a background thread; its progress lines and final
    /// result arrive via the task receiver.
    fn start_task<F>(&mut self, label: &'static str, work: F)
    where
        F: FnOnce(&mpsc::Sender<TaskEvent>) -> Result<String, String> + Send + 'static,
    {
        if self.busy() {
            return;
        }
        self.append(&format!("[{}] started", label));
        self.task_label = label;
        self.task_started = Some(Instant::now());
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let result = work(&tx);
            let _ = tx.send(TaskEvent::Done(result));
        });
        self.task_receiver = Some(rx);
    }

    /// Connection fields validated into immutable credentials.
    fn credentials(&self) -> Result<Credentials, String> {
        let timeout = parse_u64(&self.timeout, 20)?;
        Credentials::new(
            &self.base_url,
            &self.username,
            &self.password,
            Duration::from_secs(timeout),
        )
        .map_err(|e| e.to_string())
    }

    /// Current message id, or a generated one written back into the field so
    /// a later poll targets the same message.
    fn effective_message_id(&mut self, prefix: &str) -> String {
        let current = self.message_id.trim().to_string();
        if !current.is_empty() {
            return current;
        }
        let generated = format!("{}-{}", prefix, unix_ts());
        self.message_id = generated.clone();
        generated
    }

    fn on_health(&mut self) {
        let creds = match self.credentials() {
            Ok(c) => c,
            Err(e) => {
                self.append(&format!("[Health] ERROR: {}", e));
                return;
            }
        };
        self.start_task("Health", move |_tx| {
            block_on(async move {
                let client = GatewayClient::new(&creds).map_err(|e| e.to_string())?;
                let health = client.health().await.map_err(|e| e.to_string())?;
                serde_json::to_string_pretty(&health).map_err(|e| e.to_string())
            })?
        });
    }

    fn on_send_sms(&mut self) {
        let creds = match self.credentials() {
            Ok(c) => c,
            Err(e) => {
                self.append(&format!("[Send SMS] ERROR: {}", e));
                return;
            }
        };
        let to = self.to.trim().to_string();
        let text = self.sms_text.clone();
        let id = self.effective_message_id("gui-sms");
        let sim_field = self.sim_number.clone();
        let wait_field = self.poll_wait.clone();
        let interval_field = self.poll_interval.clone();
        self.start_task("Send SMS", move |tx| {
            if to.is_empty() {
                return Err("recipient number is required".to_string());
            }
            if text.trim().is_empty() {
                return Err("SMS text is required".to_string());
            }
            let sim = parse_sim(&sim_field)?;
            let wait = parse_u64(&wait_field, 120)?;
            let interval = parse_u64(&interval_field, 3)?;
            let tx_poll = tx.clone();
            block_on(async move {
                let client = GatewayClient::new(&creds).map_err(|e| e.to_string())?;
                let sent = client
                    .send_sms(&to, &text, Some(&id), sim)
                    .await
                    .map_err(|e| e.to_string())?;
                let outcome = poll::poll_message(
                    &client,
                    &id,
                    Duration::from_secs(wait),
                    Duration::from_secs(interval),
                    &mut |record| {
                        let _ = tx_poll.send(TaskEvent::Line(format!("poll: state={}", record.state)));
                    },
                )
                .await
                .map_err(|e| e.to_string())?;
                let result = serde_json::json!({
                    "send": sent,
                    "final": outcome.record,
                    "timedOut": outcome.timed_out,
                });
                serde_json::to_string_pretty(&result).map_err(|e| e.to_string())
            })?
        });
    }

    fn on_send_mms(&mut self) {
        let creds = match self.credentials() {
            Ok(c) => c,
            Err(e) => {
                self.append(&format!("[Send MMS] ERROR: {}", e));
                return;
            }
        };
        let to = self.to.trim().to_string();
        let text = self.mms_text.trim().to_string();
        let file = self.mms_file.trim().to_string();
        let id = self.effective_message_id("gui-mms");
        let sim_field = self.sim_number.clone();
        let wait_field = self.poll_wait.clone();
        let interval_field = self.poll_interval.clone();
        self.start_task("Send MMS", move |tx| {
            if to.is_empty() {
                return Err("recipient number is required".to_string());
            }
            if file.is_empty() {
                return Err("MMS file is required".to_string());
            }
            let sim = parse_sim(&sim_field)?;
            let wait = parse_u64(&wait_field, 120)?;
            let interval = parse_u64(&interval_field, 3)?;
            let text = if text.is_empty() { None } else { Some(text) };
            let tx_poll = tx.clone();
            block_on(async move {
                let client = GatewayClient::new(&creds).map_err(|e| e.to_string())?;
                let sent = client
                    .send_mms(&to, text.as_deref(), file.as_ref(), Some(&id), sim)
                    .await
                    .map_err(|e| e.to_string())?;
                let outcome = poll::poll_message(
                    &client,
                    &id,
                    Duration::from_secs(wait),
                    Duration::from_secs(interval),
                    &mut |record| {
                        let _ = tx_poll.send(TaskEvent::Line(format!("poll: state={}", record.state)));
                    },
                )
                .await
                .map_err(|e| e.to_string())?;
                let result = serde_json::json!({
                    "send": sent,
                    "final": outcome.record,
                    "timedOut": outcome.timed_out,
                });
                serde_json::to_string_pretty(&result).map_err(|e| e.to_string())
            })?
        });
    }

    fn on_poll_message(&mut self) {
        let creds = match self.credentials() {
            Ok(c) => c,
            Err(e) => {
                self.append(&format!("[Poll Message] ERROR: {}", e));
                return;
            }
        };
        let id = self.message_id.trim().to_string();
        let wait_field = self.poll_wait.clone();
        let interval_field = self.poll_interval.clone();
        self.start_task("Poll Message", move |tx| {
            if id.is_empty() {
                return Err("message ID is required for polling".to_string());
            }
            let wait = parse_u64(&wait_field, 120)?;
            let interval = parse_u64(&interval_field, 3)?;
            let tx_poll = tx.clone();
            block_on(async move {
                let client = GatewayClient::new(&creds).map_err(|e| e.to_string())?;
                let outcome = poll::poll_message(
                    &client,
                    &id,
                    Duration::from_secs(wait),
                    Duration::from_secs(interval),
                    &mut |record| {
                        let _ = tx_poll.send(TaskEvent::Line(format!("poll: state={}", record.state)));
                    },
                )
                .await
                .map_err(|e| e.to_string())?;
                let result = serde_json::json!({
                    "message": outcome.record,
                    "timedOut": outcome.timed_out,
                });
                serde_json::to_string_pretty(&result).map_err(|e| e.to_string())
            })?
        });
    }

    fn ui_connection(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.label(egui::RichText::new("Connection").strong());
            egui::Grid::new("connection")
                .num_columns(4)
                .spacing([8.0, 4.0])
                .show(ui, |ui| {
                    ui.label("Base URL");
                    ui.add(egui::TextEdit::singleline(&mut self.base_url).desired_width(300.0));
                    ui.label("Username");
                    ui.add(egui::TextEdit::singleline(&mut self.username).desired_width(140.0));
                    ui.end_row();

                    ui.label("Password");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.password)
                            .password(true)
                            .desired_width(300.0),
                    );
                    ui.label("Timeout (s)");
                    ui.add(egui::TextEdit::singleline(&mut self.timeout).desired_width(140.0));
                    ui.end_row();
                });
        });
    }

    fn ui_message(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.label(egui::RichText::new("Message").strong());
            egui::Grid::new("message")
                .num_columns(6)
                .spacing([8.0, 4.0])
                .show(ui, |ui| {
                    ui.label("To (E.164)");
                    ui.add(egui::TextEdit::singleline(&mut self.to).desired_width(160.0));
                    ui.label("Message ID");
                    ui.add(egui::TextEdit::singleline(&mut self.message_id).desired_width(200.0));
                    ui.label("SIM (optional)");
                    ui.add(egui::TextEdit::singleline(&mut self.sim_number).desired_width(60.0));
                    ui.end_row();
                });

            ui.label("SMS text");
            ui.add(egui::TextEdit::singleline(&mut self.sms_text).desired_width(f32::INFINITY));
            ui.label("MMS text");
            ui.add(egui::TextEdit::singleline(&mut self.mms_text).desired_width(f32::INFINITY));
            ui.label("MMS file path");
            ui.add(egui::TextEdit::singleline(&mut self.mms_file).desired_width(f32::INFINITY));

            egui::Grid::new("polling")
                .num_columns(4)
                .spacing([8.0, 4.0])
                .show(ui, |ui| {
                    ui.label("Poll wait (s)");
                    ui.add(egui::TextEdit::singleline(&mut self.poll_wait).desired_width(60.0));
                    ui.label("Poll interval (s)");
                    ui.add(egui::TextEdit::singleline(&mut self.poll_interval).desired_width(60.0));
                    ui.end_row();
                });
        });
    }

    fn ui_actions(&mut self, ui: &mut egui::Ui) {
        let busy = self.busy();
        ui.horizontal(|ui| {
            if ui.add_enabled(!busy, egui::Button::new("Health")).clicked() {
                self.on_health();
            }
            if ui.add_enabled(!busy, egui::Button::new("Send SMS")).clicked() {
                self.on_send_sms();
            }
            if ui.add_enabled(!busy, egui::Button::new("Send MMS")).clicked() {
                self.on_send_mms();
            }
            if ui
                .add_enabled(!busy, egui::Button::new("Poll Message ID"))
                .clicked()
            {
                self.on_poll_message();
            }
            if busy {
                ui.spinner();
                ui.label(format!("{} running...", self.task_label));
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Clear Output").clicked() {
                    self.output.clear();
                }
            });
        });
    }

    fn ui_output(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.label(egui::RichText::new("Output").strong());
            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut self.output.as_str())
                            .font(egui::TextStyle::Monospace)
                            .desired_width(f32::INFINITY)
                            .desired_rows(18),
                    );
                });
        });
    }
}

impl eframe::App for KitApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_task_events();
        if self.busy() {
            ctx.request_repaint_after(Duration::from_millis(200));
        }
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("MessageGate Test Kit");
            ui.add_space(8.0);
            self.ui_connection(ui);
            ui.add_space(8.0);
            self.ui_message(ui);
            ui.add_space(8.0);
            self.ui_actions(ui);
            ui.add_space(8.0);
            self.ui_output(ui);
        });
    }
}
