//! Error types shared across the bot.

use std::path::PathBuf;

use thiserror::Error;

use crate::quiz::Difficulty;

/// Errors raised by the exam engine. All of them are recovered inside the
/// handlers and shown to the user as a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExamError {
    #[error("exam is already completed")]
    InvalidState,
    #[error("time for the exam is over")]
    Expired,
    #[error("option {option} does not exist, question has {available} options")]
    InvalidOption { option: usize, available: usize },
    #[error("{difficulty:?} needs {required} questions, bank has {available}")]
    NotEnoughQuestions {
        difficulty: Difficulty,
        required: usize,
        available: usize,
    },
}

/// Failure to read or write the statistics database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored timestamp is malformed: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("stored record is malformed: {0}")]
    Record(String),
    #[error("stats task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BankError {
    #[error("failed to read question bank {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse question bank {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{path}: question #{index} of {difficulty:?} is invalid: {reason}")]
    InvalidQuestion {
        path: PathBuf,
        difficulty: Difficulty,
        index: usize,
        reason: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API_TOKEN is not set")]
    MissingToken,
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("failed to build certificate: {0}")]
    Pdf(String),
    #[error("certificate task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// An optional document asset that could not be used. Rendering continues
/// with a fallback.
#[derive(Debug, Error)]
#[error("asset {path} is unavailable: {reason}")]
pub struct AssetMissing {
    pub path: PathBuf,
    pub reason: String,
}
