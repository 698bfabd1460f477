//! Conversion between live file sessions and their stored documents.
//!
//! Tables are stored as CSV text with a header. Histories are already in
//! their portable form, so they are copied as-is; older answer encodings are
//! migrated when the document is deserialized. The agent is never stored.

use crate::db::models::StoredFileSession;
use crate::session::FileSession;
use crate::table::{DataTable, TableError};
use tracing::error;

pub fn save(sessions: &[FileSession]) -> Result<Vec<StoredFileSession>, TableError> {
    sessions
        .iter()
        .map(|session| {
            Ok(StoredFileSession {
                file_id: session.file_id.clone(),
                name: session.name.clone(),
                data_csv: session.table.to_csv()?,
                chat_history: session.chat_history.clone(),
            })
        })
        .collect()
}

/// Rebuild sessions from storage. A session whose table no longer parses is
/// dropped and logged rather than failing the whole load.
pub fn load(stored: Vec<StoredFileSession>) -> Vec<FileSession> {
    stored
        .into_iter()
        .filter_map(|doc| match DataTable::from_csv(doc.data_csv.as_bytes()) {
            Ok(table) => {
                let mut session = FileSession::new(doc.file_id, doc.name, table);
                session.chat_history = doc.chat_history;
                Some(session)
            }
            Err(err) => {
                error!(file_id = %doc.file_id, error = %err, "dropping unreadable stored session");
                None
            }
        })
        .collect()
}
