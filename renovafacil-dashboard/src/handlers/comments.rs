use shared_types::FbComment;
use std::fmt::Write as _;

use super::{format_optional_time, or_dash, pad, truncate, AppContext};

pub async fn list(ctx: &AppContext) -> anyhow::Result<()> {
    let comments = ctx.backend.fb_comments().await?;
    ctx.output(&comments, |comments| render_comments(comments))
}

pub fn render_comments(comments: &[FbComment]) -> String {
    if comments.is_empty() {
        return "No comments\n".to_string();
    }

    let mut out = String::new();
    for comment in comments {
        let _ = writeln!(
            out,
            "{} {} {} {}",
            format_optional_time(comment.created_time),
            pad(or_dash(comment.author.as_deref()), 20),
            pad(or_dash(comment.action.as_deref()), 10),
            truncate(&comment.message, 60)
        );
        if let Some(reply) = comment.reply.as_deref().filter(|r| !r.trim().is_empty()) {
            let _ = writeln!(out, "    reply: {}", truncate(reply, 70));
        }
    }
    out
}
