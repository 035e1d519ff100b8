use super::AppContext;
use crate::helpers::store_path::get_store_path;

/// Prints where configuration and local state live, then the effective
/// configuration after environment overrides.
pub fn show(ctx: &AppContext) -> anyhow::Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&ctx.config)?);
        return Ok(());
    }

    println!("# Config file: {}", ctx.config_path.display());
    println!("# Local store: {}", get_store_path(&ctx.config.storage)?.display());
    println!();
    print!("{}", toml::to_string_pretty(&ctx.config)?);
    Ok(())
}
