//! `parley key create`.

use anyhow::Result;
use console::style;

use parley_types::chat::UserId;

use crate::state::AppState;

pub async fn create_key(state: &AppState, user: &str, name: &str, json: bool) -> Result<()> {
    let created = state.api_keys.create(&UserId::new(user), name).await?;

    if json {
        let out = serde_json::json!({
            "id": created.id,
            "user_id": created.user_id,
            "name": created.name,
            "key": created.plaintext,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} API key for '{}' (save this -- it won't be shown again):",
        style("🔑").bold(),
        style(user).cyan()
    );
    println!();
    println!("  {}", style(&created.plaintext).yellow().bold());
    println!();
    Ok(())
}
