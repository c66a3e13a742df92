//! Share-to-unlock access gate bot for Telegram.
//!
//! Receives webhook updates, tracks per-user language and share progress,
//! gates exclusive content behind a share goal, and lets operators broadcast
//! content and run lightweight polls over every known subscriber.

/// Telegram-facing layer: update decoding, routing and handlers
pub mod bot;
/// Configuration management
pub mod config;
/// Per-user and global gate state machinery
pub mod gate;
/// Messaging gateway client
pub mod gateway;
/// Remote key/value store adapter
pub mod store;
pub mod testing;
