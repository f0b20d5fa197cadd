use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hlrun",
    about = "Run hostlink compute modules headlessly",
    version
)]
pub struct Cli {
    /// Runtime config (defaults to hostlink.toml, searched upwards)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Instantiate a module and pump frames
    Run {
        /// Module path or file:// URL (.wasm or .wat)
        module: String,
        /// Number of animation frames to run
        #[arg(long, default_value_t = 60)]
        frames: u32,
        /// Milliseconds between frames
        #[arg(long, default_value_t = 16.0)]
        frame_ms: f64,
        /// TOML script of input events to dispatch
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// List a module's imports and exports against the import table
    Inspect {
        /// Module path or file:// URL
        module: String,
    },
    /// Write a default hostlink.toml
    Init {
        /// Where to write the config
        #[arg(default_value = "hostlink.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "hlrun", "run", "demo.wasm", "--frames", "3", "--events", "keys.toml",
        ]);
        match cli.command {
            Command::Run { module, frames, frame_ms, events } => {
                assert_eq!(module, "demo.wasm");
                assert_eq!(frames, 3);
                assert_eq!(frame_ms, 16.0);
                assert_eq!(events, Some(PathBuf::from("keys.toml")));
            }
            _ => panic!("expected run"),
        }
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["hlrun", "inspect", "demo.wasm", "--config", "alt.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    }
}
