// CLI subcommand dispatch.

use clap::Subcommand;

pub mod config;
pub mod history;
pub mod join;

#[derive(Subcommand)]
pub enum Command {
    /// Join a room: live chat in the terminal
    Join(join::JoinArgs),
    /// Fetch a room's message history and exit
    History(history::HistoryArgs),
    /// Show or initialize the client configuration
    Config(config::ConfigArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Join(args) => join::run(args),
        Command::History(args) => history::run(args),
        Command::Config(args) => config::run(args),
    }
}
