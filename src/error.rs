//! Error types for summary-forge.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for summary-forge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by configuration loading, rendering and the chat/survey
/// use cases. Markdown conversion never fails and has no variant here.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The YAML configuration file could not be read.
    #[error("Failed to read config file at {path}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    /// The YAML configuration could not be parsed into the typed schema.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// The configuration parsed but references something undefined.
    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    /// A font file could not be parsed.
    #[error("Font error: {0}")]
    Font(String),

    /// Layout computation failed.
    #[error("Layout error: {0}")]
    Layout(String),

    /// PDF emission failed.
    #[error("Rendering error: {0}")]
    Render(String),

    /// A stored message could not be decrypted.
    #[error("Decryption failed: {0}")]
    Decrypt(String),

    /// The requested chat room does not exist.
    #[error("Chat room not found: {0}")]
    RoomNotFound(String),

    /// The chat room belongs to another account.
    #[error("Account {account_id} may not access room {room_id}")]
    Forbidden { room_id: String, account_id: u64 },

    /// The chat room has no messages to summarise.
    #[error("Chat room {0} has no messages")]
    EmptyConversation(String),

    /// The text-generation collaborator failed.
    #[error("Summary generation failed: {0}")]
    Generation(String),

    /// The survey repository failed for a reason other than a duplicate.
    #[error("Survey storage error: {0}")]
    Survey(String),
}
