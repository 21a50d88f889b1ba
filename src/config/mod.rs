pub mod cli;
pub mod sync_config;
