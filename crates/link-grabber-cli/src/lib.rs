//! Link Grabber CLI — collect, classify, and list every outbound link on a page.

pub mod commands;
pub mod config;
pub mod render;

pub use commands::{CollectArgs, ViewArgs};
pub use config::resolve_settings_path;
pub use render::{render, OutputFormat};
