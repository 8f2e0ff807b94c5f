// `streamchat history` — fetch a room's message history and exit.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;
use url::Url;

use streamchat_client::config::GlobalConfig;
use streamchat_client::feed::ChatFeed;
use streamchat_client::history::{HistoryClient, HistoryStore};
use streamchat_client::http::{AuthSession, StaticToken};

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Room (stream) id.
    pub room: String,

    /// Bearer token (overrides the configured one).
    #[arg(long)]
    token: Option<String>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

/// One history row, ready for printing.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryLine {
    pub at: String,
    pub author: String,
    pub content: String,
}

pub fn run(args: HistoryArgs) -> Result<()> {
    let format = OutputFormat::detect(args.json);
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("tokio runtime should build")?;

    match rt.block_on(fetch_history(args)) {
        Ok(lines) => {
            output::print_output(format, &lines, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

async fn fetch_history(args: HistoryArgs) -> Result<Vec<HistoryLine>> {
    let cfg = GlobalConfig::load();
    let chat_url = cfg.chat_url.ok_or_else(|| anyhow!("chat_url is not configured"))?;
    let token = args
        .token
        .or(cfg.token)
        .ok_or_else(|| anyhow!("token is not configured (pass --token or set it in the config)"))?;

    let base_url = Url::parse(&chat_url)
        .map_err(|error| anyhow!("invalid chat_url `{chat_url}`: {error}"))?;
    let client = HistoryClient::new(base_url, AuthSession::new(token, StaticToken));
    let rows = client.fetch_messages(&args.room).await?;

    let mut feed = ChatFeed::new(args.room, None);
    feed.load_history(rows);

    let lines = feed
        .messages()
        .iter()
        .map(|message| HistoryLine {
            at: message.created_at.to_rfc3339(),
            author: feed.resolve_display_name(message),
            content: message.content.clone(),
        })
        .collect();
    Ok(lines)
}

fn format_human(lines: &Vec<HistoryLine>) -> String {
    if lines.is_empty() {
        return "(no messages)".to_string();
    }
    lines
        .iter()
        .map(|line| format!("[{}] {}: {}", line.at, line.author, line.content))
        .collect::<Vec<_>>()
        .join("\n")
}
