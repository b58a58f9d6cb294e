//! `parley sessions list`.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use parley_types::chat::{ConversationView, UserId};

use crate::state::AppState;

const TITLE_WIDTH: usize = 40;

pub async fn list_sessions(state: &AppState, user: &str, json: bool) -> Result<()> {
    let caller = UserId::new(user);
    let conversations = state
        .conversation_service
        .list_conversations(Some(&caller))
        .await?;
    let views: Vec<ConversationView> = conversations.iter().map(ConversationView::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if views.is_empty() {
        println!();
        println!(
            "  {} No conversations for '{}'. Start one with: {}",
            style("i").blue().bold(),
            style(user).cyan(),
            style(format!("parley ask --user {user} \"...\"")).yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Title").fg(Color::White),
        Cell::new("Uid").fg(Color::White),
        Cell::new("Created").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for view in &views {
        table.add_row(vec![
            Cell::new(shorten(&view.title, TITLE_WIDTH)),
            Cell::new(&view.uid).fg(Color::DarkGrey),
            Cell::new(view.created_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(view.updated_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

fn shorten(title: &str, width: usize) -> String {
    if title.chars().count() > width {
        let head: String = title.chars().take(width - 3).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("Short", 10), "Short");
        assert_eq!(shorten("Exactly10!", 10), "Exactly10!");
        assert_eq!(shorten("Rather long title", 10), "Rather ...");
        assert_eq!(shorten("ééééééééééé", 10), "ééééééé...");
    }
}
