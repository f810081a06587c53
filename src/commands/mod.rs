//! Command implementations behind the CLI.

pub mod auth;
pub mod config;
pub mod events;
mod paths;

pub use config::{Config, token_store};
pub use paths::{COOKIE_JAR_FILE, LEGACY_CREDENTIALS_FILE, SESSION_FILE, default_state_dir};
