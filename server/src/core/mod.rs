//! Core application infrastructure

pub mod cli;
pub mod config;
pub mod constants;
pub mod secret;
pub mod shutdown;
pub mod storage;

pub use crate::app::CoreApp;
pub use cli::{CliConfig, Commands, KeyCommands};
pub use config::{AppConfig, ServerConfig, TransactionalBackend};
pub use shutdown::ShutdownService;
pub use storage::{AppStorage, DataSubdir};

pub use crate::data::TransactionalService;
