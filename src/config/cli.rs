use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const DEFAULT_CONFIG_PATH: &str = ".edoc-dl-config.yml";

#[derive(Parser, Debug)]
#[clap(author, version, about = "Download all documents of an edocperso vault")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[clap(about = "Mirror folders and documents to the destination folder")]
    Sync {
        #[clap(long, help = "Path to config (defaults to .edoc-dl-config.yml, if present)")]
        config_path: Option<PathBuf>,

        #[clap(short, long, help = "Destination folder for downloaded files")]
        destination_folder: Option<PathBuf>,

        #[clap(
            short,
            long,
            help = "Ignore existing files in the destination folder. Do not download these files again."
        )]
        ignore_existing: bool,

        #[clap(long, help = "Disable animations")]
        no_animation: bool,
    },

    #[clap(about = "Create a config file")]
    Setup {
        #[clap(long, help = "Path of the config to write", default_value = DEFAULT_CONFIG_PATH)]
        config_path: PathBuf,
    },
}

impl Cli {
    pub fn animations_enabled(&self) -> bool {
        match self.command {
            Commands::Sync { no_animation, .. } => !no_animation,
            Commands::Setup { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_flags() {
        let cli = Cli::parse_from(["edoc-dl", "sync", "-d", "/out", "-i", "--no-animation"]);
        assert!(!cli.animations_enabled());
        match cli.command {
            Commands::Sync {
                config_path,
                destination_folder,
                ignore_existing,
                ..
            } => {
                assert_eq!(config_path, None);
                assert_eq!(destination_folder, Some(PathBuf::from("/out")));
                assert!(ignore_existing);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_setup_default_path() {
        let cli = Cli::parse_from(["edoc-dl", "setup"]);
        match cli.command {
            Commands::Setup { config_path } => {
                assert_eq!(config_path, PathBuf::from(DEFAULT_CONFIG_PATH))
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
