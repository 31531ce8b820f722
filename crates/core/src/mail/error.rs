use thiserror::Error;

use crate::command::CommandError;
use crate::db::DatabaseError;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("No EMAIL_TO recipient configured for {file_id}")]
    NoRecipients { file_id: String },

    #[error("Attachment not found: {path}")]
    AttachmentMissing { path: String },

    #[error("Mail command failed: {0}")]
    Command(#[from] CommandError),
}

impl From<DatabaseError> for MailError {
    fn from(e: DatabaseError) -> Self {
        MailError::Database(e.to_string())
    }
}
