use crate::answer::ChatEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserRecord {
    pub username: String,
    /// Password hash (see `auth`); rows written before hashing hold plaintext.
    pub password: String,
    pub name: String,
    pub file_sessions: Vec<StoredFileSession>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoredFileSession {
    pub file_id: String,
    pub name: String,
    pub data_csv: String,
    #[serde(default)]
    pub chat_history: Vec<ChatEntry>,
}
