//! Atlas Bot - media downloader and PDF converter for Telegram
#![deny(missing_docs)]

/// Telegram adapter
pub mod bot;
/// Configuration management
pub mod config;
/// Pending audio/video prompts
pub mod conversation;
/// Document conversion
pub mod convert;
/// Transport-agnostic inbound and outbound messages
pub mod events;
/// Inbound event routing
pub mod handler;
/// Log setup with token redaction
pub mod logging;
/// Media download pipeline
pub mod media;
/// Utility functions
pub mod utils;
