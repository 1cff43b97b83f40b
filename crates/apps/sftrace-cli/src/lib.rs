pub mod app;
pub mod commands_apex;
pub mod commands_lightning;
pub mod config;
pub mod logging;
pub mod output;
pub mod rest_client;

pub use app::{run_cli, Cli, Command};
