use chrono::Local;
use shared_types::{BotMetrics, HealthStatus};
use std::fmt::Write as _;
use tokio::sync::mpsc;

use super::AppContext;
use crate::error::ApiError;
use crate::jobs::Poller;

const METRICS_POLL: &str = "metrics";

pub async fn metrics(ctx: &AppContext, watch: bool) -> anyhow::Result<()> {
    if !watch {
        let metrics = ctx.backend.metrics().await?;
        return ctx.output(&metrics, render_metrics);
    }

    let poller = Poller::new();
    let (tx, mut rx) = mpsc::channel::<Result<BotMetrics, ApiError>>(4);
    let backend = ctx.backend.clone();

    poller
        .start(METRICS_POLL, ctx.config.metrics.poll_interval(), move |_tick| {
            let backend = backend.clone();
            let tx = tx.clone();
            async move {
                let _ = tx.send(backend.metrics().await).await;
            }
        })
        .await;

    let result: anyhow::Result<()> = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            received = rx.recv() => match received {
                Some(Ok(metrics)) => {
                    println!("\n=== Bot status ({}) ===", Local::now().format("%H:%M:%S"));
                    ctx.output(&metrics, render_metrics)?;
                }
                Some(Err(e)) if e.is_unauthorized() => break Err(e.into()),
                // Keep the last figures on screen and wait for the next poll
                Some(Err(e)) => eprintln!("[error] Refreshing metrics failed: {}", e),
                None => break Ok(()),
            }
        }
    };

    poller.shutdown().await;
    result
}

pub async fn health(ctx: &AppContext) -> anyhow::Result<()> {
    let health = ctx.backend.health().await?;
    ctx.output(&health, render_health)?;
    if !health.is_healthy() {
        anyhow::bail!("Backend reports status '{}'", health.status);
    }
    Ok(())
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else {
        format!("{}h {}m", hours, minutes)
    }
}

pub fn render_metrics(metrics: &BotMetrics) -> String {
    let mut out = String::new();
    let counters = [
        ("Messages received", metrics.messages_received),
        ("Messages sent", metrics.messages_sent),
        ("Active conversations", metrics.active_conversations),
        ("Orders today", metrics.orders_today),
        ("Errors", metrics.errors),
    ];

    if let Some(uptime) = metrics.uptime_seconds {
        let _ = writeln!(out, "{:<22}{}", "Uptime", format_uptime(uptime));
    }
    for (label, value) in counters {
        if let Some(value) = value {
            let _ = writeln!(out, "{:<22}{}", label, value);
        }
    }
    for (key, value) in &metrics.extra {
        let _ = writeln!(out, "{:<22}{}", key, value);
    }
    out
}

pub fn render_health(health: &HealthStatus) -> String {
    let mut out = format!("Status: {}", health.status);
    if let Some(version) = &health.version {
        let _ = write!(out, " (version {})", version);
    }
    out.push('\n');
    for (name, check) in &health.checks {
        let _ = writeln!(out, "  {:<16}{}", name, check);
    }
    out
}
