// `streamchat join` — live chat in the terminal.
//
// Stdin lines become outbound messages; inbound traffic renders to
// stdout as it lands. Ctrl-C (or stdin EOF) leaves the room with a
// deliberate close.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use tokio::sync::{mpsc, watch};
use url::Url;

use streamchat_client::config::GlobalConfig;
use streamchat_client::connection::ws::WsTransport;
use streamchat_client::connection::{RoomConfig, MAX_RETRIES};
use streamchat_client::history::HistoryClient;
use streamchat_client::http::{AuthSession, StaticToken};
use streamchat_client::session::{FeedEntry, RoomEvent, RoomSession};
use streamchat_common::types::CurrentUser;

use crate::output::{self, OutputFormat};

/// Longest message accepted for sending, in characters.
const MAX_CONTENT_LEN: usize = 500;

#[derive(Debug, Args)]
pub struct JoinArgs {
    /// Room (stream) id to join.
    pub room: String,

    /// Bearer token (overrides the configured one).
    #[arg(long)]
    token: Option<String>,

    /// Your account id, used to label your own messages.
    #[arg(long)]
    user: Option<String>,

    /// Display name for your own messages (overrides the configured one).
    #[arg(long)]
    name: Option<String>,
}

pub fn run(args: JoinArgs) -> Result<()> {
    let format = OutputFormat::detect(false);
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("tokio runtime should build")?;

    match rt.block_on(join_room(args)) {
        Ok(()) => Ok(()),
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

async fn join_room(args: JoinArgs) -> Result<()> {
    let cfg = GlobalConfig::load();
    let ws_url = cfg.ws_url.ok_or_else(|| anyhow!("ws_url is not configured"))?;
    let chat_url = cfg.chat_url.ok_or_else(|| anyhow!("chat_url is not configured"))?;
    let token = args
        .token
        .or(cfg.token)
        .ok_or_else(|| anyhow!("token is not configured (pass --token or set it in the config)"))?;
    let display_name = args.name.or(cfg.display_name);
    let current_user = args.user.map(|id| CurrentUser { id, display_name });

    let auth = AuthSession::new(token.clone(), StaticToken);
    let base_url = Url::parse(&chat_url)
        .map_err(|error| anyhow!("invalid chat_url `{chat_url}`: {error}"))?;
    let history = HistoryClient::new(base_url, auth);

    let room_config =
        RoomConfig { ws_url, room_id: args.room.clone(), auth_token: token };
    let session = RoomSession::new(room_config, WsTransport::new(), history, current_user);

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();
    let (sd_tx, sd_rx) = watch::channel(false);

    // Detached thread so a blocked stdin read can't hold up shutdown.
    std::thread::spawn(move || read_stdin_lines(out_tx));

    let shutdown = sd_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(true);
        }
    });

    let printer = async move {
        while let Some(event) = ev_rx.recv().await {
            render_event(&event);
        }
    };

    let (outcome, ()) = tokio::join!(session.run(out_rx, ev_tx, sd_rx), printer);
    outcome?;
    Ok(())
}

fn read_stdin_lines(out_tx: mpsc::UnboundedSender<String>) {
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match accept_line(&line) {
            LineVerdict::Send(content) => {
                if out_tx.send(content.to_owned()).is_err() {
                    break;
                }
            }
            LineVerdict::TooLong => {
                eprintln!("! message too long (over {MAX_CONTENT_LEN} characters), not sent");
            }
            LineVerdict::Skip => {}
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineVerdict<'a> {
    Send(&'a str),
    TooLong,
    Skip,
}

fn accept_line(line: &str) -> LineVerdict<'_> {
    let content = line.trim();
    if content.is_empty() {
        return LineVerdict::Skip;
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return LineVerdict::TooLong;
    }
    LineVerdict::Send(content)
}

fn render_event(event: &RoomEvent) {
    match event {
        RoomEvent::HistoryLoaded { entries } => {
            for entry in entries {
                println!("{}", render_entry(entry));
            }
        }
        RoomEvent::Appended(entry) => println!("{}", render_entry(entry)),
        RoomEvent::Connected => println!("* connected"),
        RoomEvent::Reconnecting { attempt } => {
            println!("* connection lost, retrying ({attempt}/{MAX_RETRIES})...");
        }
        RoomEvent::Ended { error: None } => println!("* disconnected"),
        RoomEvent::Ended { error: Some(error) } => {
            eprintln!("error: {error}");
        }
        RoomEvent::SendRejected { content } => {
            eprintln!("! not connected, message dropped: {content}");
        }
    }
}

fn render_entry(entry: &FeedEntry) -> String {
    format!(
        "[{}] {}: {}",
        entry.message.created_at.format("%H:%M:%S"),
        entry.display_name,
        entry.message.content
    )
}
