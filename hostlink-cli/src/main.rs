mod cli;
mod commands;
mod config;
mod report;
mod script;

use clap::Parser;

use cli::{Cli, Command};
use commands::run_cmd::RunArgs;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Command::Init { path, force } = &cli.command {
        return commands::init_cmd::run(path, *force);
    }

    let (config, source) = config::resolve(cli.config.as_deref())?;
    match source.path() {
        Some(path) => log::debug!("config from {}", path.display()),
        None => log::debug!("default config"),
    }

    match cli.command {
        Command::Run {
            module,
            frames,
            frame_ms,
            events,
        } => {
            let args = RunArgs {
                module,
                frames,
                frame_ms,
                events,
            };
            commands::run_cmd::run(config, args).await
        }
        Command::Inspect { module } => commands::inspect_cmd::run(config, module).await,
        Command::Init { .. } => Ok(()),
    }
}
