//! `parley ask`: one generation streamed to the terminal.
//!
//! Content is written as it arrives. Conversation and title events are shown
//! on stderr so stdout carries only the answer; with `--json` every event is
//! printed as one JSON line instead.

use std::io::Write;

use anyhow::Result;
use console::style;
use tokio::sync::mpsc;

use parley_core::generation::service::GenerationRequest;
use parley_types::chat::UserId;
use parley_types::event::GenerationEvent;
use parley_types::llm::Message;

use crate::state::AppState;

pub async fn ask(
    state: &AppState,
    user: &str,
    session: Option<String>,
    message: String,
    json: bool,
) -> Result<()> {
    let caller = UserId::new(user);
    let request = GenerationRequest {
        messages: vec![Message::user(message)],
        conversation_uid: session,
    };
    let generation = state
        .generation_service
        .start(Some(&caller), request)
        .await?;

    let (tx, mut rx) = mpsc::channel::<GenerationEvent>(64);
    let handle = tokio::spawn(generation.run(tx));

    // The channel closes once the generation and any fallback title job are done.
    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }
        render(&mut stdout, &event)?;
    }

    handle.await??;
    Ok(())
}

fn render(out: &mut impl Write, event: &GenerationEvent) -> Result<()> {
    match event {
        GenerationEvent::Content { text } => {
            write!(out, "{text}")?;
            out.flush()?;
        }
        GenerationEvent::OutputComplete { .. } => writeln!(out)?,
        GenerationEvent::SessionUpdated { conversation, .. } => {
            eprintln!(
                "  {} conversation {}",
                style("•").blue().bold(),
                style(&conversation.uid).dim()
            );
        }
        GenerationEvent::TitleGenerated { conversation, .. } => {
            eprintln!(
                "  {} {}",
                style("title:").blue().bold(),
                style(&conversation.title).cyan()
            );
        }
        GenerationEvent::ModelReady { .. } | GenerationEvent::OutputEnd { .. } => {}
    }
    Ok(())
}
