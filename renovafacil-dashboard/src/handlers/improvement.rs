use shared_types::{ImprovementStats, Mutation, MutationActionResponse, MutationStatus, Suggestion};
use std::fmt::Write as _;

use super::{format_optional_time, or_dash, pad, truncate, AppContext};
use crate::integrations::improvement::MutationAction;

pub async fn stats(ctx: &AppContext) -> anyhow::Result<()> {
    let stats = ctx.backend.improvement_stats().await?;
    ctx.output(&stats, render_stats)
}

pub async fn suggestions(ctx: &AppContext) -> anyhow::Result<()> {
    let suggestions = ctx.backend.suggestions().await?;
    ctx.output(&suggestions, |s| render_suggestions(s))
}

pub async fn mutations(ctx: &AppContext) -> anyhow::Result<()> {
    let mutations = ctx.backend.mutations().await?;
    ctx.output(&mutations, |m| render_mutations(m))
}

pub async fn analyze(ctx: &AppContext) -> anyhow::Result<()> {
    let result = ctx.backend.analyze().await?;
    ctx.output(&result, |result| {
        let mut out = format!(
            "Analysis {}: {} new suggestions\n",
            if result.success { "finished" } else { "failed" },
            result.suggestions_created
        );
        if let Some(message) = &result.message {
            let _ = writeln!(out, "{}", message);
        }
        out
    })
}

/// Applies an action to a mutation, then prints the refreshed mutation list
pub async fn act_on_mutation(
    ctx: &AppContext,
    mutation_id: i64,
    action: MutationAction,
) -> anyhow::Result<()> {
    let result = ctx.backend.mutation_action(mutation_id, action).await?;
    if !ctx.json {
        print!("{}", render_action_result(mutation_id, action, &result));
    }
    if !result.success {
        anyhow::bail!("Backend refused to {} mutation {}", action, mutation_id);
    }
    mutations(ctx).await
}

fn status_label(status: &MutationStatus) -> &'static str {
    match status {
        MutationStatus::Pending => "pending",
        MutationStatus::Approved => "approved",
        MutationStatus::Active => "active",
        MutationStatus::Rejected => "rejected",
        MutationStatus::Inactive => "inactive",
        MutationStatus::Unknown => "unknown",
    }
}

fn render_stats(stats: &ImprovementStats) -> String {
    format!(
        "Conversations analyzed: {}\nPending suggestions:    {}\nActive mutations:       {}\nRejected mutations:     {}\nLast analysis:          {}\n",
        stats.conversations_analyzed,
        stats.suggestions_pending,
        stats.mutations_active,
        stats.mutations_rejected,
        format_optional_time(stats.last_analysis)
    )
}

fn render_suggestions(suggestions: &[Suggestion]) -> String {
    if suggestions.is_empty() {
        return "No suggestions\n".to_string();
    }

    let mut out = String::new();
    for suggestion in suggestions {
        let confidence = suggestion
            .confidence
            .map(|c| format!("{:>3.0}%", c * 100.0))
            .unwrap_or_else(|| "   -".to_string());
        let _ = writeln!(
            out,
            "#{:<5} {} {} {}",
            suggestion.id,
            pad(or_dash(suggestion.category.as_deref()), 14),
            confidence,
            truncate(&suggestion.description, 70)
        );
    }
    out
}

pub fn render_mutations(mutations: &[Mutation]) -> String {
    if mutations.is_empty() {
        return "No mutations\n".to_string();
    }

    let mut out = String::new();
    for mutation in mutations {
        let _ = writeln!(
            out,
            "#{:<5} {} {} {}",
            mutation.id,
            pad(status_label(&mutation.status), 9),
            format_optional_time(mutation.created_at),
            truncate(&mutation.description, 60)
        );
    }
    out
}

fn render_action_result(id: i64, action: MutationAction, result: &MutationActionResponse) -> String {
    let outcome = if result.success { "done" } else { "refused" };
    let mut out = format!("{} mutation #{}: {}\n", action, id, outcome);
    if let Some(message) = result.message.as_deref().filter(|m| !m.is_empty()) {
        let _ = writeln!(out, "{}", message);
    }
    out
}
