use anyhow::Context;
use std::io::{BufRead, Write};

use super::{format_time, or_dash, AppContext};
use crate::error::ApiError;

pub async fn login(ctx: &AppContext, username: &str, password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt_password()?,
    };

    let session = match ctx.backend.login(username, &password).await {
        Ok(session) => session,
        Err(ApiError::Unauthorized) => anyhow::bail!("Invalid username or password"),
        Err(e) => return Err(e.into()),
    };

    println!(
        "Logged in as {} (session valid until {})",
        or_dash(session.username.as_deref()),
        format_time(session.expires_at)
    );
    Ok(())
}

fn prompt_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    Ok(password)
}

pub async fn logout(ctx: &AppContext) -> anyhow::Result<()> {
    ctx.backend.logout().await?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(ctx: &AppContext) -> anyhow::Result<()> {
    let session = ctx.require_session()?;
    let verified = ctx.backend.verify().await?;

    let username = verified
        .username
        .as_deref()
        .or(session.username.as_deref());
    println!("{}", or_dash(username));
    println!(
        "Session valid until {}",
        format_time(verified.expires_at.unwrap_or(session.expires_at))
    );
    Ok(())
}
