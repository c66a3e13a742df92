//! Telegram-facing layer: update decoding, routing and handlers.

/// Admin command surface
pub mod admin;
/// Localized message catalog
pub mod catalog;
/// Join, message and button handlers
pub mod handlers;
/// Update router and application state
pub mod router;
/// Inbound update decoding
pub mod update;
/// Inline keyboard and command menu assembly
pub mod views;
