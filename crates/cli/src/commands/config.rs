// `streamchat config` — show or initialize `~/.streamchat/config.toml`.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;

use streamchat_client::config::{global_config_path, GlobalConfig};

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Write a default config file if none exists.
    #[arg(long)]
    init: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ConfigView {
    path: String,
    #[serde(flatten)]
    config: GlobalConfig,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    let format = OutputFormat::detect(args.json);
    let path =
        global_config_path().ok_or_else(|| anyhow!("could not determine home directory"))?;

    if args.init {
        if path.exists() {
            println!("config already exists at {}", path.display());
            return Ok(());
        }
        GlobalConfig::default().save().context("failed to write default config")?;
        println!("wrote default config to {}", path.display());
        return Ok(());
    }

    let config = GlobalConfig::load();
    let view = ConfigView { path: path.display().to_string(), config };
    output::print_output(format, &view, format_human)?;
    Ok(())
}

fn format_human(view: &ConfigView) -> String {
    let body = toml::to_string_pretty(&view.config)
        .unwrap_or_else(|_| "(unserializable config)".to_string());
    let body = if body.is_empty() { "(empty)".to_string() } else { body };
    format!("# {}\n{}", view.path, body.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_format_shows_path_and_settings() {
        let view = ConfigView {
            path: "/home/me/.streamchat/config.toml".to_string(),
            config: GlobalConfig {
                chat_url: Some("https://chat.example.com".to_string()),
                ws_url: Some("wss://chat.example.com".to_string()),
                display_name: None,
                token: None,
            },
        };
        let rendered = format_human(&view);
        assert!(rendered.starts_with("# /home/me/.streamchat/config.toml"));
        assert!(rendered.contains(r#"chat_url = "https://chat.example.com""#));
        assert!(!rendered.contains("token ="));
    }

    #[test]
    fn human_format_marks_an_empty_config() {
        let view = ConfigView {
            path: "/home/me/.streamchat/config.toml".to_string(),
            config: GlobalConfig::default(),
        };
        assert!(format_human(&view).contains("(empty)"));
    }
}
