use shared_types::{OrderDetails, TrackingInfo};
use std::fmt::Write as _;

use super::{format_money, format_optional_time, or_dash, AppContext};

pub async fn order(ctx: &AppContext, number: &str) -> anyhow::Result<()> {
    let order = ctx.backend.order(number.trim_start_matches('#')).await?;
    ctx.output(&order, render_order)
}

pub async fn track(ctx: &AppContext, number: &str) -> anyhow::Result<()> {
    let tracking = ctx.backend.track(number.trim_start_matches('#')).await?;
    ctx.output(&tracking, render_tracking)
}

pub fn render_order(order: &OrderDetails) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Order #{}", order.number);
    let _ = writeln!(out, "Status:   {}", or_dash(order.status.as_deref()));
    let _ = writeln!(out, "Customer: {}", or_dash(order.customer_name.as_deref()));
    let _ = writeln!(out, "Phone:    {}", or_dash(order.phone.as_deref()));
    let _ = writeln!(out, "Created:  {}", format_optional_time(order.created_at));
    let _ = writeln!(
        out,
        "Total:    {}",
        order.total.map(format_money).unwrap_or_else(|| "-".to_string())
    );
    if let Some(tracking) = order.tracking_number.as_deref() {
        let _ = writeln!(out, "Tracking: {}", tracking);
    }
    for item in &order.items {
        let price = item.price.map(format_money).unwrap_or_default();
        let _ = writeln!(out, "  {}x {} {}", item.quantity, item.name, price);
    }
    out
}

pub fn render_tracking(tracking: &TrackingInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Order #{}: {} ({})",
        tracking.number,
        or_dash(tracking.status.as_deref()),
        or_dash(tracking.carrier.as_deref())
    );
    if tracking.events.is_empty() {
        out.push_str("No tracking events yet\n");
    }
    for event in &tracking.events {
        let _ = writeln!(
            out,
            "  {} {} {}",
            format_optional_time(event.date),
            event.description,
            event
                .location
                .as_deref()
                .map(|l| format!("[{}]", l))
                .unwrap_or_default()
        );
    }
    out
}
