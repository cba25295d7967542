//! Chat command handling on top of [`LinkCache`].
//!
//! Turns one line of chat text into a reply. Anyone may look up a post;
//! only configured admin ids may add links or read the stats.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::LinkCache;
use crate::errors::ServiceError;
use crate::metrics::RequestMetrics;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Health,
    Stats,
    /// `<prefix><digits>`; the digit count is checked when resolving.
    Resolve { key: String },
    Define { key: String, url: String },
    /// `/addlink` with the wrong number of arguments.
    DefineUsage,
    Unknown,
}

impl Command {
    /// Name the command is counted under in the metrics. Health and stats
    /// checks are not counted, so they never inflate the totals they report.
    pub fn metric_name(&self) -> Option<&'static str> {
        match self {
            Command::Start => Some("start"),
            Command::Resolve { .. } => Some("get_post"),
            Command::Define { .. } | Command::DefineUsage => Some("add_link"),
            Command::Health | Command::Stats | Command::Unknown => None,
        }
    }
}

#[derive(Clone)]
pub struct CommandService {
    cache: LinkCache,
    metrics: RequestMetrics,
    admins: Arc<HashSet<i64>>,
    prefix: String,
}

impl CommandService {
    pub fn new(
        cache: LinkCache,
        metrics: RequestMetrics,
        admins: impl IntoIterator<Item = i64>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            metrics,
            admins: Arc::new(admins.into_iter().collect()),
            prefix: prefix.into().to_lowercase(),
        }
    }

    pub fn cache(&self) -> &LinkCache {
        &self.cache
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    fn example_key(&self) -> String {
        self.cache.key_format().format(1)
    }

    pub fn parse(&self, text: &str) -> Command {
        let mut parts = text.split_whitespace();
        let Some(head) = parts.next() else {
            return Command::Unknown;
        };
        // `/start@SomeBot` addresses a command to one bot in a group chat.
        let head = head.split('@').next().unwrap_or(head).to_lowercase();
        let args: Vec<&str> = parts.collect();

        match head.as_str() {
            "/start" | "/help" => Command::Start,
            "/health" => Command::Health,
            "/stats" => Command::Stats,
            "/addlink" | "/upload" => match args.as_slice() {
                [key, url] => Command::Define { key: key.to_string(), url: url.to_string() },
                _ => Command::DefineUsage,
            },
            other => match other.strip_prefix(self.prefix.as_str()) {
                Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                    Command::Resolve { key: digits.to_string() }
                }
                _ => Command::Unknown,
            },
        }
    }

    /// Parse `text`, run it for `user_id` and return the reply.
    pub async fn handle(&self, user_id: i64, text: &str) -> String {
        let command = self.parse(text);
        let _timer = command.metric_name().map(|name| self.metrics.measure(name));
        match command {
            Command::Start => self.start_text(),
            Command::Health => self.health().await,
            Command::Stats => self.stats(user_id).await,
            Command::Resolve { key } => self.resolve(&key).await,
            Command::Define { key, url } => self.define(user_id, &key, &url).await,
            Command::DefineUsage => {
                if self.is_admin(user_id) {
                    format!("Usage: /addlink {} https://your-link", self.example_key())
                } else {
                    "⛔ Only the bot admin can add links.".to_string()
                }
            }
            Command::Unknown => "❓ Unknown command. Use /start for help.".to_string(),
        }
    }

    pub fn start_text(&self) -> String {
        format!("👋 Hello! Use {}{} to get a link!", self.prefix, self.example_key())
    }

    pub async fn resolve(&self, key: &str) -> String {
        if !self.cache.key_format().is_valid(key) {
            return format!("❌ Invalid format. Use {}{}.", self.prefix, self.example_key());
        }
        match self.cache.get(key).await {
            Some(url) => format!("🔗 Link for post {key}: {url}"),
            None => format!("❌ Post {key} not found."),
        }
    }

    pub async fn define(&self, user_id: i64, key: &str, url: &str) -> String {
        if !self.is_admin(user_id) {
            warn!(user_id, "non-admin tried to add a link");
            return "⛔ Only the bot admin can add links.".to_string();
        }
        if !self.cache.key_format().is_valid(key) {
            return format!(
                "❌ Post number must be {} digits (e.g., {})",
                self.cache.key_format().width(),
                self.example_key()
            );
        }
        if !has_http_scheme(url) {
            return "❌ URL must start with http:// or https://".to_string();
        }
        match self.cache.put(key, url).await {
            Ok(()) => {
                info!(user_id, %key, "link defined");
                format!("✅ Saved link for post {key}!")
            }
            Err(ServiceError::Validation(msg)) => format!("❌ {msg}"),
            Err(e) => {
                warn!(user_id, %key, error = %e, "add_link failed");
                "❌ An error occurred while saving the link.".to_string()
            }
        }
    }

    pub async fn health(&self) -> String {
        let stats = self.metrics.snapshot();
        let cached = self.cache.len().await;
        format!(
            "✅ Bot is healthy\n📊 Total requests: {}\n⏱️ Avg response time: {}ms\n🔗 Cached links: {}\n⏰ Uptime: {}s",
            stats.total_requests, stats.avg_response_time_ms, cached, stats.uptime_seconds
        )
    }

    pub async fn stats(&self, user_id: i64) -> String {
        if !self.is_admin(user_id) {
            return "⛔ Only the bot admin can view stats.".to_string();
        }
        let stats = self.metrics.snapshot();
        let cached = self.cache.len().await;

        let mut out = String::from("📊 Bot Statistics\n");
        let _ = writeln!(out, "Total requests: {}", stats.total_requests);
        out.push_str("Requests by command:\n");
        for (command, count) in &stats.requests_by_command {
            let _ = writeln!(out, "  • {command}: {count}");
        }
        let _ = writeln!(out, "Average response time: {}ms", stats.avg_response_time_ms);
        let _ = writeln!(out, "Cached links: {cached}");
        let _ = write!(out, "Uptime: {}s", stats.uptime_seconds);
        out
    }
}

/// Case-sensitive scheme check; `HTTP://` is rejected like any other scheme.
pub fn has_http_scheme(url: &str) -> bool {
    ["http://", "https://"]
        .into_iter()
        .any(|scheme| url.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}
