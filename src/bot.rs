//! Command handling: turns Telegram messages into pipeline runs.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::api::{ApiClient, validate_url};
use crate::config::Config;
use crate::pipeline::{Pipeline, Report};
use crate::telegram::TelegramClient;

const WELCOME: &str = "🤖 <b>Course Data Extractor Bot</b>

I fetch course data from an API and organize it into a text file.

<b>Commands:</b>
/start - Show this message
/help - How to use the bot
/getcourse - Fetch the default course (or /getcourse &lt;url&gt;)

<b>Features:</b>
• Extracts video and PDF links
• Organizes classes by topic
• Picks one video quality per class
• Sends a structured .txt file";

const HELP: &str = "📖 <b>Help</b>

<b>How to use:</b>
1. Send /getcourse to fetch the default course
2. Or send an API endpoint URL (http or https)
3. You get back a structured .txt file

<b>Supported APIs:</b>
• JSON with classes grouped by topic (<code>data.classes[].classes[]</code>)
• Or a flat <code>classes</code> list

<b>Each class lists:</b>
• Title, teacher, status and priority
• The preferred video quality
• PDFs as <code>PDF &lt;n&gt;: &lt;name&gt;</code>
• Practice tests, when present";

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "show the welcome message.")]
    Start,
    #[command(description = "show usage help.")]
    Help,
    #[command(description = "fetch course data (optionally from a given URL).")]
    GetCourse(String),
}

/// What a plain (non-command) text message asks for.
#[derive(Debug, PartialEq)]
pub enum TextRoute {
    Extract(String),
    Usage,
}

pub fn route_text(text: &str) -> TextRoute {
    match validate_url(text) {
        Some(url) => TextRoute::Extract(url.to_string()),
        None => TextRoute::Usage,
    }
}

fn usage_hint(example_url: &str) -> String {
    format!(
        "Please send me an API URL or use /getcourse to fetch the default course data.\n\
         Example API URL: {example_url}\n\n\
         Use /help for more information."
    )
}

/// Which trigger started an extraction; decides file name and caption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Origin {
    Command,
    PastedUrl,
}

impl Origin {
    pub fn file_name(self) -> &'static str {
        match self {
            Origin::Command => "course_data.txt",
            Origin::PastedUrl => "api_data.txt",
        }
    }
}

pub fn caption(report: &Report, extracted_at: &str) -> String {
    let s = &report.stats;
    format!(
        "✅ Course data extracted on {extracted_at}\nSource: {}\n{} topics, {} classes, {} videos, {} PDFs",
        report.course.source, s.topics, s.classes, s.videos, s.pdfs
    )
}

#[derive(Debug, PartialEq)]
pub enum Access {
    Allowed,
    /// `notify` is true only the first time a user is turned away.
    Denied { notify: bool },
}

/// Optional allow list. Empty admits everyone, including sender-less posts.
pub struct AccessGate {
    allowed: HashSet<UserId>,
    denied: Mutex<HashSet<UserId>>,
}

impl AccessGate {
    pub fn new(allowed: HashSet<UserId>) -> Self {
        Self {
            allowed,
            denied: Mutex::new(HashSet::new()),
        }
    }

    pub async fn check(&self, user: Option<UserId>) -> Access {
        if self.allowed.is_empty() {
            return Access::Allowed;
        }
        let Some(user) = user else {
            return Access::Denied { notify: false };
        };
        if self.allowed.contains(&user) {
            return Access::Allowed;
        }
        let notify = self.denied.lock().await.insert(user);
        Access::Denied { notify }
    }
}

pub struct BotState {
    config: Config,
    pipeline: Pipeline,
    telegram: TelegramClient,
    gate: AccessGate,
}

impl BotState {
    pub fn new(config: Config, bot: Bot) -> Result<Self, crate::api::Error> {
        let client = ApiClient::new(&config.user_agent, config.request_timeout)?;
        let pipeline = Pipeline::new(client, config.render_options());
        let gate = AccessGate::new(config.allowed_users.clone());
        Ok(Self {
            config,
            pipeline,
            telegram: TelegramClient::new(bot),
            gate,
        })
    }

    /// Returns false (after one denial notice) for users outside the allow list.
    async fn admit(&self, msg: &Message) -> bool {
        let user = msg.from.as_ref();
        match self.gate.check(user.map(|u| u.id)).await {
            Access::Allowed => true,
            Access::Denied { notify } => {
                if notify && let Some(user) = user {
                    info!("Denied user {} ({})", user.first_name, user.id);
                    self.telegram.send_text(msg.chat.id, "Access denied.").await.ok();
                }
                false
            }
        }
    }

    async fn extract_and_send(&self, chat_id: ChatId, url: &str, origin: Origin) {
        let report = match self.pipeline.run(url).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Extraction from {url} failed: {e}");
                self.telegram.send_text(chat_id, &format!("❌ Error: {e}")).await.ok();
                return;
            }
        };

        let extracted_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let caption = caption(&report, &extracted_at);

        // The temp file is removed when `file` drops.
        let file = match write_temp(&self.config.scratch_dir(), &report.text) {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to write output file: {e}");
                self.telegram
                    .send_text(chat_id, "❌ Error: could not write the output file.")
                    .await
                    .ok();
                return;
            }
        };

        let sent = self
            .telegram
            .send_document(chat_id, file.path(), origin.file_name(), &caption)
            .await;
        if sent.is_ok() {
            info!("✅ Sent {} for {url}", origin.file_name());
        }
        self.telegram.send_text(chat_id, &delivery_reply(&sent)).await.ok();
    }
}

/// Follow-up message after a document upload attempt.
pub fn delivery_reply(sent: &Result<(), String>) -> String {
    match sent {
        Ok(()) => "✅ File sent successfully!".to_string(),
        Err(e) => format!("❌ Error: {e}"),
    }
}

/// Write `text` to a fresh `.txt` file under `dir`.
pub fn write_temp(dir: &std::path::Path, text: &str) -> std::io::Result<tempfile::NamedTempFile> {
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("course_")
        .suffix(".txt")
        .tempfile_in(dir)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file)
}

pub async fn handle_command(msg: Message, cmd: Command, state: Arc<BotState>) -> ResponseResult<()> {
    if !state.admit(&msg).await {
        return Ok(());
    }
    let chat_id = msg.chat.id;

    match cmd {
        Command::Start => {
            state.telegram.send_html(chat_id, WELCOME).await.ok();
        }
        Command::Help => {
            state.telegram.send_html(chat_id, HELP).await.ok();
        }
        Command::GetCourse(arg) => {
            let arg = arg.trim();
            let url = if arg.is_empty() {
                state.config.default_api_url.clone()
            } else {
                match validate_url(arg) {
                    Some(url) => url.to_string(),
                    None => {
                        state
                            .telegram
                            .send_text(chat_id, &format!("❌ Error: not an http(s) URL: {arg}"))
                            .await
                            .ok();
                        return Ok(());
                    }
                }
            };
            info!("📥 /getcourse in chat {chat_id}: {url}");
            state.telegram.send_text(chat_id, "📡 Fetching course data from API...").await.ok();
            state.extract_and_send(chat_id, &url, Origin::Command).await;
        }
    }

    Ok(())
}

pub async fn handle_text(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !state.admit(&msg).await {
        return Ok(());
    }
    let chat_id = msg.chat.id;

    match route_text(text) {
        TextRoute::Extract(url) => {
            info!("🔗 URL in chat {chat_id}: {url}");
            state.telegram.send_text(chat_id, "🔗 Processing your API URL...").await.ok();
            state.extract_and_send(chat_id, &url, Origin::PastedUrl).await;
        }
        TextRoute::Usage => {
            state
                .telegram
                .send_text(chat_id, &usage_hint(&state.config.default_api_url))
                .await
                .ok();
        }
    }

    Ok(())
}

/// Log a liveness line every `interval`. Zero disables it.
pub fn spawn_heartbeat(interval: Duration) -> Option<tokio::task::JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            info!("💓 Bot is alive and running");
        }
    }))
}
