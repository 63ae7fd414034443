pub mod classifier;
pub mod refine;

use crate::metadata::models::{ConversationMessage, Role};
use crate::metadata::{ConversationStore, StoreError};

/// A session's memory window: the most recent messages in chronological
/// order, plus the latest message carrying SQL (the refinement target).
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub messages: Vec<ConversationMessage>,
    pub last_sql_message: Option<ConversationMessage>,
    pub has_context: bool,
}

impl SessionContext {
    /// The most recent prior user question, if any.
    pub fn last_user_question(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

pub async fn session_context(
    store: &dyn ConversationStore,
    session_id: &str,
    limit: usize,
) -> Result<SessionContext, StoreError> {
    let messages = store.recent(session_id, limit).await?;
    let last_sql_message = messages.iter().rev().find(|m| m.sql.is_some()).cloned();
    let has_context = !messages.is_empty();
    Ok(SessionContext {
        messages,
        last_sql_message,
        has_context,
    })
}
