//! Per-user and global state machinery of the access gate.

/// Rate-limited broadcast fan-out
pub mod broadcast;
/// Per-user language selection
pub mod locale;
/// Poll creation, voting and tallying
pub mod poll;
/// Share counters and the progress gate
pub mod progress;
/// Persistent subscriber set
pub mod registry;
