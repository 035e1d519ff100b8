use shared_types::{
    AbandonedCart, CartRecoveryStats, RecoverCartsRequest, RecoverCartsResponse, RecoveryLog,
    RecoveryResponse,
};
use std::fmt::Write as _;

use super::{format_money, format_optional_time, or_dash, pad, truncate, AppContext};

pub async fn list(ctx: &AppContext) -> anyhow::Result<()> {
    let carts = ctx.backend.abandoned_carts().await?;
    ctx.output(&carts, |carts| render_carts(carts))
}

pub async fn recover(ctx: &AppContext, cart_id: i64, dry_run: bool) -> anyhow::Result<()> {
    let result = ctx.backend.recover_cart(cart_id, dry_run).await?;
    ctx.output(&result, render_recovery_result)
}

pub async fn recover_all(ctx: &AppContext, dry_run: bool, min_hours: Option<u32>) -> anyhow::Result<()> {
    let request = RecoverCartsRequest { dry_run, min_hours };
    let result = ctx.backend.recover_carts(&request).await?;
    ctx.output(&result, render_recovery_result)
}

pub async fn logs(ctx: &AppContext) -> anyhow::Result<()> {
    let logs = ctx.backend.recovery_logs().await?;
    ctx.output(&logs, |logs| render_logs(logs))
}

pub async fn responses(ctx: &AppContext) -> anyhow::Result<()> {
    let responses = ctx.backend.recovery_responses().await?;
    ctx.output(&responses, |responses| render_responses(responses))
}

pub async fn stats(ctx: &AppContext) -> anyhow::Result<()> {
    let stats = ctx.backend.cart_recovery_stats().await?;
    ctx.output(&stats, render_stats)
}

pub fn render_carts(carts: &[AbandonedCart]) -> String {
    if carts.is_empty() {
        return "No abandoned carts\n".to_string();
    }

    let mut out = String::new();
    for cart in carts {
        let items = cart
            .items
            .iter()
            .map(|item| format!("{}x {}", item.quantity, item.name))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "#{:<6} {} {} {:>12} {} {} {}",
            cart.id,
            pad(&cart.phone, 15),
            pad(or_dash(cart.contact_name.as_deref()), 20),
            format_money(cart.total),
            format_optional_time(cart.created_at),
            if cart.recovered {
                "recovered".to_string()
            } else {
                format!("{} attempts", cart.recovery_attempts)
            },
            truncate(&items, 40)
        );
    }
    out
}

pub fn render_recovery_result(result: &RecoverCartsResponse) -> String {
    let mode = if result.dry_run { "Dry run" } else { "Recovery" };
    let mut out = format!(
        "{}: {} processed, {} messages sent\n",
        mode, result.processed, result.sent
    );
    if let Some(message) = result.message.as_deref().filter(|m| !m.is_empty()) {
        let _ = writeln!(out, "{}", message);
    }
    if !result.success {
        out.push_str("Backend reported the run as unsuccessful\n");
    }
    out
}

fn render_logs(logs: &[RecoveryLog]) -> String {
    if logs.is_empty() {
        return "No recovery messages sent yet\n".to_string();
    }

    let mut out = String::new();
    for log in logs {
        let _ = writeln!(
            out,
            "{} {} {} {}",
            format_optional_time(log.sent_at),
            pad(&log.phone, 15),
            pad(&log.status, 10),
            truncate(or_dash(log.message.as_deref()), 60)
        );
    }
    out
}

fn render_responses(responses: &[RecoveryResponse]) -> String {
    if responses.is_empty() {
        return "No customer responses yet\n".to_string();
    }

    let mut out = String::new();
    for response in responses {
        let _ = writeln!(
            out,
            "{} {} {} {} {}",
            format_optional_time(response.responded_at),
            pad(&response.phone, 15),
            pad(or_dash(response.contact_name.as_deref()), 20),
            if response.converted { "[converted]" } else { "           " },
            truncate(&response.response, 60)
        );
    }
    out
}

fn render_stats(stats: &CartRecoveryStats) -> String {
    format!(
        "Abandoned carts:   {}\nMessages sent:     {}\nResponses:         {}\nRecovered:         {}\nRecovery rate:     {:.1}%\nRevenue recovered: {}\n",
        stats.total_abandoned,
        stats.messages_sent,
        stats.responses,
        stats.recovered,
        stats.recovery_rate,
        format_money(stats.revenue_recovered)
    )
}
