//! Gmail API client module

pub mod client;
pub mod gmail;
mod shortener;

use anyhow::{Context, Result};

pub use client::AuthorizedClient;
pub use shortener::LinkShortener;

use crate::models::Message;

/// What `unread` does after fetching.
#[derive(Debug, Default)]
pub struct UnreadOptions {
    /// Archive each fetched message
    pub archive: bool,
    /// Apply this (hidden) label to each fetched message
    pub label: Option<String>,
    /// One line per message instead of the JSON dump
    pub summary: bool,
}

/// List and fetch unread inbox mail, print it, then apply the requested actions.
pub async fn unread(client: &AuthorizedClient, options: &UnreadOptions) -> Result<()> {
    let refs = gmail::list_unread(client)
        .await
        .context("Failed to list unread messages")?;

    tracing::info!("Fetching {} unread message(s)...", refs.len());
    let messages = gmail::get_messages(client, &refs)
        .await
        .context("Failed to fetch messages")?;

    if options.summary {
        print_summary(&messages);
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(&messages).context("Failed to serialize messages")?
        );
    }

    if let Some(name) = &options.label {
        let label = gmail::ensure_label(client, name)
            .await
            .with_context(|| format!("Failed to find or create label '{}'", name))?;
        for msg in &messages {
            gmail::add_label(client, &msg.id, &label.id)
                .await
                .with_context(|| format!("Failed to label message {}", msg.id))?;
        }
        tracing::info!("Labelled {} message(s) '{}'", messages.len(), name);
    }

    if options.archive {
        for msg in &messages {
            gmail::archive_message(client, &msg.id)
                .await
                .with_context(|| format!("Failed to archive message {}", msg.id))?;
        }
        tracing::info!("Archived {} message(s)", messages.len());
    }

    Ok(())
}

fn print_summary(messages: &[Message]) {
    if messages.is_empty() {
        println!("(no unread messages)");
        return;
    }

    for msg in messages {
        println!("{}", summary_line(msg));
    }
}

fn summary_line(msg: &Message) -> String {
    format!(
        "{}  {}: {}",
        msg.id,
        msg.header("From").unwrap_or("(unknown sender)"),
        msg.header("Subject").unwrap_or("(no subject)"),
    )
}
