pub mod analyzer;
pub mod config;
pub mod key;
pub mod organizer;

/// Audio file extensions picked up when walking a library.
/// Matched case-insensitively against the final extension only.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac"];

/// Application name for XDG paths
pub const APP_NAME: &str = "keysort";
