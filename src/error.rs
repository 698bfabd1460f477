use crate::agent::AgentError;
use crate::db::StoreError;
use crate::llm::LlmError;
use crate::table::TableError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid username or password")]
    AuthFailure,

    #[error("Username already exists.")]
    DuplicateUsername,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("No file selected")]
    NoCurrentFile,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Could not read CSV: {0}")]
    Table(#[from] TableError),
}

// Implement Serialize for Tauri
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
