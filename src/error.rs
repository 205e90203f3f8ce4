//! Error types for configuration and file handling.
//!
//! Search results are never errors; see [`crate::session::SolveOutcome`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config '{path}': {source}", path = path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}': {source}", path = path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize layout: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid puzzle: {0}")]
    Puzzle(#[from] PuzzleError),
}

/// Problems with the content of a puzzle or layout definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PuzzleError {
    #[error("Puzzle syntax error: {0}")]
    Syntax(String),

    #[error("Grid has no cells")]
    EmptyGrid,

    #[error("Grid row {row} has a different width than row 0")]
    RaggedGrid { row: usize },

    #[error("Unexpected character '{found}' in {context}")]
    InvalidCharacter { context: String, found: char },

    #[error("Upgrade '{name}' has a ragged pattern")]
    RaggedPattern { name: String },

    #[error("Upgrade '{name}' has no enabled pattern cells")]
    EmptyPattern { name: String },

    #[error("Upgrade name '{name}' is used more than once")]
    DuplicateName { name: String },

    #[error("Unknown upgrade '{name}'")]
    UnknownUpgrade { name: String },

    #[error("Upgrade '{name}' cannot be equipped at ({x}, {y}) rotation {rotation}")]
    EquipRejected {
        name: String,
        x: i32,
        y: i32,
        rotation: u8,
    },
}
