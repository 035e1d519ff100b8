use anyhow::anyhow;
use chrono::Local;
use shared_types::{ContactInfo, Direction};
use std::fmt::Write as _;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{format_money, format_optional_time, format_time, or_dash, pad, AppContext};
use crate::error::ApiError;
use crate::helpers::notifier::{Notice, NoticeLevel};
use crate::inbox::{
    ConversationFilter, ConversationQuery, ConversationRow, DayGroup, Inbox, InboxEvent,
    Selection,
};

pub struct ListOptions {
    pub filter: ConversationFilter,
    pub search: Option<String>,
    pub test: bool,
}

impl ListOptions {
    fn query(&self) -> ConversationQuery {
        ConversationQuery {
            search: self.search.clone().unwrap_or_default(),
            filter: self.filter,
            show_test: self.test,
        }
    }
}

fn open_inbox(ctx: &AppContext) -> Inbox {
    Inbox::new(
        ctx.backend.clone(),
        ctx.config.inbox.clone(),
        ctx.notifier.clone(),
    )
}

/// Refreshes the list, falling back to the cached copy when the backend is unreachable
async fn load_conversations(ctx: &AppContext, inbox: &Inbox) -> anyhow::Result<()> {
    ctx.require_session()?;
    if !inbox.refresh_conversations(false).await {
        ctx.require_session()?;
        eprintln!("[info] Backend unreachable, showing cached conversations");
    }
    Ok(())
}

pub async fn list(ctx: &AppContext, options: &ListOptions) -> anyhow::Result<()> {
    let inbox = open_inbox(ctx);
    load_conversations(ctx, &inbox).await?;
    inbox.set_query(options.query()).await;

    let rows = inbox.visible_conversations().await;
    ctx.output(&rows, |rows| render_conversations(rows))
}

pub async fn show(ctx: &AppContext, phone: &str) -> anyhow::Result<()> {
    let inbox = open_inbox(ctx);
    load_conversations(ctx, &inbox).await?;

    let mut events = inbox.subscribe();
    let mut notices = ctx.notifier.subscribe();
    inbox.select(phone).await;

    let wait = ctx.config.backend.timeout() + Duration::from_secs(5);
    let loaded = tokio::time::timeout(wait, wait_for_thread(&mut events, &mut notices, phone))
        .await
        .map_err(|_| anyhow!("Timed out loading messages for {}", phone));
    let groups = inbox.message_groups().await;
    inbox.back().await;
    loaded??;

    ctx.output(&groups, |groups| render_day_groups(groups))
}

async fn wait_for_thread(
    events: &mut broadcast::Receiver<InboxEvent>,
    notices: &mut broadcast::Receiver<Notice>,
    phone: &str,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(InboxEvent::MessagesUpdated { phone: updated, .. }) if updated == phone => {
                    return Ok(());
                }
                Ok(InboxEvent::SessionExpired) => return Err(ApiError::Unauthorized.into()),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => anyhow::bail!("Inbox stopped before messages loaded"),
            },
            notice = notices.recv() => {
                if let Ok(notice) = notice {
                    if notice.level == NoticeLevel::Error {
                        anyhow::bail!("{}", notice.text);
                    }
                }
            }
        }
    }
}

pub async fn send(ctx: &AppContext, phone: &str, text: &str) -> anyhow::Result<()> {
    ctx.require_session()?;
    let inbox = open_inbox(ctx);
    inbox.send_message(phone, text).await?;
    println!("Message sent to {}", phone);
    Ok(())
}

pub async fn attend(ctx: &AppContext, phone: &str) -> anyhow::Result<()> {
    let inbox = open_inbox(ctx);
    load_conversations(ctx, &inbox).await?;
    inbox.mark_attended(phone).await?;
    println!("Marked {} as attended", phone);
    Ok(())
}

pub async fn contact(ctx: &AppContext, phone: &str) -> anyhow::Result<()> {
    let info = ctx.backend.contact_info(phone).await?;
    ctx.output(&info, render_contact)
}

/// Live view: keeps polling until Ctrl+C and reprints whatever changed
pub async fn watch(ctx: &AppContext, options: &ListOptions, phone: Option<&str>) -> anyhow::Result<()> {
    ctx.require_session()?;
    let inbox = open_inbox(ctx);
    let mut events = inbox.subscribe();
    let mut notices = ctx.notifier.subscribe();

    inbox.set_query(options.query()).await;
    inbox.mount().await;
    if let Some(phone) = phone {
        inbox.select(phone).await;
    }

    let result: anyhow::Result<()> = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            event = events.recv() => match event {
                Ok(InboxEvent::ConversationsUpdated { .. }) | Ok(InboxEvent::ReadStateChanged { .. }) => {
                    println!("\n=== Conversaciones ({}) ===", Local::now().format("%H:%M:%S"));
                    print!("{}", render_conversations(&inbox.visible_conversations().await));
                }
                Ok(InboxEvent::MessagesUpdated { phone, count, .. }) => {
                    println!("\n=== {} ({} mensajes) ===", phone, count);
                    print!("{}", render_day_groups(&inbox.message_groups().await));
                }
                Ok(InboxEvent::SelectionChanged(Selection::None)) => println!("\nConversation closed"),
                Ok(InboxEvent::SessionExpired) => break Err(ApiError::Unauthorized.into()),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break Ok(()),
            },
            notice = notices.recv() => {
                if let Ok(notice) = notice {
                    eprintln!("{}", notice);
                }
            }
        }
    };

    inbox.unmount().await;
    result
}

fn direction_arrow(direction: Direction) -> &'static str {
    match direction {
        Direction::Incoming => "<-",
        Direction::Outgoing => "->",
    }
}

pub fn render_conversations(rows: &[ConversationRow]) -> String {
    if rows.is_empty() {
        return "No conversations\n".to_string();
    }

    let mut out = String::new();
    for row in rows {
        let c = &row.conversation;
        let _ = writeln!(
            out,
            "{} {} {} {} {} ({})",
            if row.unread { "*" } else { " " },
            pad(&row.display_name, 24),
            direction_arrow(c.direction),
            pad(&c.last_message, 48),
            format_time(c.last_message_time),
            c.message_count
        );
    }
    out
}

pub fn render_day_groups(groups: &[DayGroup]) -> String {
    if groups.is_empty() {
        return "No messages\n".to_string();
    }

    let mut out = String::new();
    for group in groups {
        let _ = writeln!(out, "--- {} ---", group.label);
        for message in &group.messages {
            let _ = writeln!(
                out,
                "{} {} {}",
                message.timestamp.with_timezone(&Local).format("%H:%M"),
                direction_arrow(message.direction),
                message.message
            );
        }
    }
    out
}

pub fn render_contact(info: &ContactInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Phone:       {}", info.phone);
    let _ = writeln!(out, "Name:        {}", or_dash(info.known_name()));
    let _ = writeln!(out, "Orders:      {}", info.order_count);
    let _ = writeln!(out, "Total spent: {}", format_money(info.total_spent));

    if let Some(last) = &info.last_order {
        let _ = writeln!(
            out,
            "Last order:  #{} {} {}",
            last.order_number,
            or_dash(last.status.as_deref()),
            format_optional_time(last.date)
        );
    }

    for order in &info.orders {
        let _ = writeln!(
            out,
            "  #{} {} {} {} items {}",
            order.order_number,
            pad(or_dash(order.status.as_deref()), 12),
            format_optional_time(order.date),
            order.items_count.unwrap_or(0),
            order.total.map(format_money).unwrap_or_else(|| "-".to_string()),
        );
    }
    out
}
