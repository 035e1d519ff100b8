pub mod auth;
pub mod carts;
pub mod comments;
pub mod improvement;
pub mod inbox;
pub mod metrics;
pub mod orders;
pub mod settings;
pub mod simulation;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::config::DashboardConfig;
use crate::database::auth_session::{self, StoredSession};
use crate::error::ApiError;
use crate::helpers::notifier::Notifier;
use crate::integrations::BackendClient;

/// Shared state handed to every command
pub struct AppContext {
    pub config: DashboardConfig,
    pub config_path: PathBuf,
    pub backend: BackendClient,
    pub notifier: Notifier,
    /// Print raw JSON instead of tables
    pub json: bool,
}

impl AppContext {
    pub fn output<T: Serialize + ?Sized>(
        &self,
        value: &T,
        render: impl FnOnce(&T) -> String,
    ) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", render(value));
        }
        Ok(())
    }

    /// Fails locally when there is no usable stored session
    pub fn require_session(&self) -> Result<StoredSession, ApiError> {
        auth_session::load_session(self.backend.store())?.ok_or(ApiError::Unauthorized)
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let kept: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", kept)
}

/// Left-aligns `text` to `width` characters, truncating if needed
pub fn pad(text: &str, width: usize) -> String {
    let text = truncate(text, width);
    let fill = width.saturating_sub(text.chars().count());
    format!("{}{}", text, " ".repeat(fill))
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string()
}

pub fn format_optional_time(time: Option<DateTime<Utc>>) -> String {
    time.map(format_time).unwrap_or_else(|| "-".to_string())
}

pub fn format_money(amount: f64) -> String {
    format!("$ {:.2}", amount)
}

pub fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("-")
}
