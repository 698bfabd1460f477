//! Per-user application state: the signed-in user and their file sessions.

use crate::agent::{Agent, AgentFactory};
use crate::answer::ChatEntry;
use crate::auth;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::orchestrator::{self, AskOutcome};
use crate::serializer;
use crate::table::{self, DataTable};
use serde::Serialize;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One uploaded CSV with its conversation.
pub struct FileSession {
    pub file_id: String,
    pub name: String,
    pub table: DataTable,
    /// Created on the first question, never persisted.
    pub agent: Option<Box<dyn Agent>>,
    pub chat_history: Vec<ChatEntry>,
}

impl FileSession {
    pub fn new(file_id: impl Into<String>, name: impl Into<String>, table: DataTable) -> Self {
        Self {
            file_id: file_id.into(),
            name: name.into(),
            table,
            agent: None,
            chat_history: Vec::new(),
        }
    }

    pub fn has_agent(&self) -> bool {
        self.agent.is_some()
    }

    pub fn last_question(&self) -> Option<&str> {
        self.chat_history.last().map(|entry| entry.question.as_str())
    }

    pub fn summary(&self) -> FileSummary {
        let (rows, columns) = self.table.shape();
        FileSummary {
            file_id: self.file_id.clone(),
            name: self.name.clone(),
            rows,
            columns,
            messages: self.chat_history.len(),
        }
    }
}

impl fmt::Debug for FileSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSession")
            .field("file_id", &self.file_id)
            .field("name", &self.name)
            .field("shape", &self.table.shape())
            .field("has_agent", &self.has_agent())
            .field("chat_history", &self.chat_history.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub file_id: String,
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub messages: usize,
}

/// Shape and first rows of a file's table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePreview {
    pub name: String,
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedInUser {
    pub username: String,
    pub name: String,
}

/// Everything that lives between login and logout.
#[derive(Debug, Default)]
pub struct SessionState {
    user: Option<SignedInUser>,
    files: Vec<FileSession>,
    current: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&SignedInUser> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn files(&self) -> &[FileSession] {
        &self.files
    }

    pub fn current_file_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&FileSession> {
        let id = self.current.as_deref()?;
        self.files.iter().find(|f| f.file_id == id)
    }

    pub fn current_mut(&mut self) -> Option<&mut FileSession> {
        let id = self.current.as_deref()?;
        self.files.iter_mut().find(|f| f.file_id == id)
    }

    /// Verify credentials and restore the user's saved files. Any previous
    /// state in memory is replaced; no file is selected afterwards.
    pub fn login(&mut self, db: &Database, username: &str, password: &str) -> Result<&SignedInUser> {
        let record = auth::authenticate(db, username, password)?;
        let files = serializer::load(record.file_sessions);
        info!(username = %record.username, files = files.len(), "user signed in");
        *self = Self {
            user: Some(SignedInUser {
                username: record.username,
                name: record.name,
            }),
            files,
            current: None,
        };
        self.user.as_ref().ok_or(AppError::NotSignedIn)
    }

    /// Persist every file session of the signed-in user.
    pub fn save(&self, db: &Database) -> Result<()> {
        let user = self.user.as_ref().ok_or(AppError::NotSignedIn)?;
        let stored = serializer::save(&self.files)?;
        db.save_file_sessions(&user.username, &stored)?;
        info!(username = %user.username, files = stored.len(), "saved file sessions");
        Ok(())
    }

    /// Save, then clear all in-memory state. If saving fails the state is kept.
    pub fn logout(&mut self, db: &Database) -> Result<()> {
        if self.user.is_none() {
            return Ok(());
        }
        self.save(db)?;
        if let Some(user) = self.user.take() {
            info!(username = %user.username, "user signed out");
        }
        self.files.clear();
        self.current = None;
        Ok(())
    }

    /// Add an uploaded CSV and make it current. Re-uploading a file with the
    /// same name and size selects the existing session instead.
    pub fn upload(&mut self, name: &str, bytes: &[u8]) -> Result<&FileSession> {
        if !self.is_authenticated() {
            return Err(AppError::NotSignedIn);
        }
        let file_id = table::fingerprint(name, bytes.len());
        let index = match self.files.iter().position(|f| f.file_id == file_id) {
            Some(index) => {
                info!(%file_id, "file already uploaded, selecting it");
                index
            }
            None => {
                let table = DataTable::from_upload(bytes)?;
                info!(%file_id, name, shape = ?table.shape(), "file uploaded");
                self.files.push(FileSession::new(file_id.clone(), name, table));
                self.files.len() - 1
            }
        };
        self.current = Some(file_id);
        Ok(&self.files[index])
    }

    pub fn switch_to(&mut self, file_id: &str) -> Result<&FileSession> {
        let index = self
            .files
            .iter()
            .position(|f| f.file_id == file_id)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown file: {}", file_id)))?;
        self.current = Some(file_id.to_string());
        Ok(&self.files[index])
    }

    /// Remove the current file session; the first remaining file, if any,
    /// becomes current.
    pub fn delete_current(&mut self) -> Result<FileSession> {
        let id = self.current.take().ok_or(AppError::NoCurrentFile)?;
        let index = self
            .files
            .iter()
            .position(|f| f.file_id == id)
            .ok_or(AppError::NoCurrentFile)?;
        let removed = self.files.remove(index);
        self.current = self.files.first().map(|f| f.file_id.clone());
        info!(file_id = %removed.file_id, "file deleted");
        Ok(removed)
    }

    /// Empty the current file's history. The agent and its memory are kept.
    pub fn clear_chat(&mut self) -> Result<()> {
        let session = self.current_mut().ok_or(AppError::NoCurrentFile)?;
        session.chat_history.clear();
        Ok(())
    }

    pub fn preview(&self, rows: usize) -> Result<TablePreview> {
        let file = self.current().ok_or(AppError::NoCurrentFile)?;
        Ok(TablePreview {
            name: file.name.clone(),
            shape: file.table.shape(),
            columns: file.table.columns().to_vec(),
            rows: file.table.head(rows).to_vec(),
        })
    }

    pub async fn ask(
        &mut self,
        factory: &dyn AgentFactory,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<AskOutcome> {
        let session = self.current_mut().ok_or(AppError::NoCurrentFile)?;
        Ok(orchestrator::ask(session, factory, question, cancel).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::StoredAnswer;

    const PEOPLE: &[u8] = b"name,Height (cm)\nAlice,170\nBob,180\n";
    const CITIES: &[u8] = b"city,pop\nOslo,700000\n";

    fn signed_in(db: &Database) -> SessionState {
        auth::register(db, "ada", "pw", "Ada").unwrap();
        let mut state = SessionState::new();
        state.login(db, "ada", "pw").unwrap();
        state
    }

    #[test]
    fn upload_requires_login() {
        let mut state = SessionState::new();
        assert!(matches!(state.upload("a.csv", PEOPLE), Err(AppError::NotSignedIn)));
    }

    #[test]
    fn upload_selects_and_cleans_columns() {
        let db = Database::open_in_memory().unwrap();
        let mut state = signed_in(&db);
        let file_id = state.upload("people.csv", PEOPLE).unwrap().file_id.clone();
        assert_eq!(file_id, table::fingerprint("people.csv", PEOPLE.len()));
        assert_eq!(state.current_file_id(), Some(file_id.as_str()));
        assert_eq!(state.current().unwrap().table.columns(), ["name", "Height_cm"]);
    }

    #[test]
    fn reupload_reuses_existing_session() {
        let db = Database::open_in_memory().unwrap();
        let mut state = signed_in(&db);
        state.upload("people.csv", PEOPLE).unwrap();
        state
            .current_mut()
            .unwrap()
            .chat_history
            .push(ChatEntry::new("q", StoredAnswer::text("a")));
        state.upload("cities.csv", CITIES).unwrap();
        state.upload("people.csv", PEOPLE).unwrap();

        assert_eq!(state.files().len(), 2);
        assert_eq!(state.current().unwrap().name, "people.csv");
        assert_eq!(state.current().unwrap().chat_history.len(), 1);
    }

    #[test]
    fn malformed_upload_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let mut state = signed_in(&db);
        let err = state.upload("bad.csv", b"a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, AppError::Table(_)));
        assert!(state.files().is_empty());
    }

    #[test]
    fn delete_moves_selection_to_first_remaining() {
        let db = Database::open_in_memory().unwrap();
        let mut state = signed_in(&db);
        let first = state.upload("people.csv", PEOPLE).unwrap().file_id.clone();
        state.upload("cities.csv", CITIES).unwrap();

        let removed = state.delete_current().unwrap();
        assert_eq!(removed.name, "cities.csv");
        assert_eq!(state.current_file_id(), Some(first.as_str()));

        state.delete_current().unwrap();
        assert_eq!(state.current_file_id(), None);
        assert!(matches!(state.delete_current(), Err(AppError::NoCurrentFile)));
    }

    #[test]
    fn preview_shows_shape_and_head() {
        let db = Database::open_in_memory().unwrap();
        let mut state = signed_in(&db);
        assert!(matches!(state.preview(5), Err(AppError::NoCurrentFile)));
        state.upload("people.csv", PEOPLE).unwrap();
        let preview = state.preview(1).unwrap();
        assert_eq!(preview.shape, (2, 2));
        assert_eq!(preview.rows, vec![vec!["Alice".to_string(), "170".to_string()]]);
    }

    #[test]
    fn switch_to_unknown_file_fails() {
        let db = Database::open_in_memory().unwrap();
        let mut state = signed_in(&db);
        state.upload("people.csv", PEOPLE).unwrap();
        assert!(matches!(state.switch_to("nope"), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn clear_chat_empties_current_history() {
        let db = Database::open_in_memory().unwrap();
        let mut state = signed_in(&db);
        assert!(matches!(state.clear_chat(), Err(AppError::NoCurrentFile)));
        state.upload("people.csv", PEOPLE).unwrap();
        state
            .current_mut()
            .unwrap()
            .chat_history
            .push(ChatEntry::new("q", StoredAnswer::text("a")));
        state.clear_chat().unwrap();
        assert!(state.current().unwrap().chat_history.is_empty());
    }

    #[test]
    fn logout_saves_and_login_restores() {
        let db = Database::open_in_memory().unwrap();
        let mut state = signed_in(&db);
        state.upload("people.csv", PEOPLE).unwrap();
        state.upload("cities.csv", CITIES).unwrap();
        state
            .current_mut()
            .unwrap()
            .chat_history
            .push(ChatEntry::new("biggest?", StoredAnswer::text("Oslo")));

        state.logout(&db).unwrap();
        assert!(!state.is_authenticated());
        assert!(state.files().is_empty());

        state.login(&db, "ada", "pw").unwrap();
        let names: Vec<_> = state.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["people.csv", "cities.csv"]);
        assert_eq!(state.files()[1].chat_history.len(), 1);
        assert!(state.files().iter().all(|f| !f.has_agent()));
        assert_eq!(state.current_file_id(), None);
    }

    #[test]
    fn failed_login_keeps_previous_state() {
        let db = Database::open_in_memory().unwrap();
        let mut state = signed_in(&db);
        state.upload("people.csv", PEOPLE).unwrap();
        assert!(state.login(&db, "ada", "wrong").is_err());
        assert_eq!(state.user().unwrap().username, "ada");
        assert_eq!(state.files().len(), 1);
    }
}
