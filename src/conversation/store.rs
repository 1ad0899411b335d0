//! JSON-file-backed multi-session conversation store.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::title::derive_title;
use super::types::{
    AssistantTurn, ConversationDocument, Message, MessageRole, Session, SessionSummary,
    DEFAULT_TITLE,
};
use crate::error::{DeskError, Result};

pub const DEFAULT_CONTEXT_LIMIT: usize = 8;
const MAX_TOOL_RESULT_CHARS: usize = 300;

/// Multi-session message log persisted as one JSON document.
///
/// All access goes through a single async mutex, and every mutation writes
/// the whole document to a temp file that is then renamed over the original,
/// so concurrent requests cannot lose each other's updates.
pub struct ConversationStore {
    path: PathBuf,
    document: Mutex<ConversationDocument>,
}

impl ConversationStore {
    /// Open (or start) the store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    let backup = path.with_extension("json.corrupt");
                    warn!(path = %path.display(), error = %e, "conversation file unreadable; starting fresh");
                    tokio::fs::rename(&path, &backup).await?;
                    ConversationDocument::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => ConversationDocument::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), sessions = document.sessions.len(), "conversation store opened");
        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Apply `f` to a copy of the document, persist it, then commit it in memory.
    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ConversationDocument) -> Result<T>,
    {
        let mut guard = self.document.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        persist(&self.path, &next).await?;
        *guard = next;
        Ok(out)
    }

    pub async fn create_session(&self, title: Option<&str>) -> Result<Session> {
        let session = Session::new(title);
        let created = session.clone();
        self.mutate(move |doc| {
            doc.current_session_id = Some(session.id.clone());
            doc.sessions.insert(session.id.clone(), session);
            Ok(())
        })
        .await?;
        info!(session_id = %created.id, "conversation session created");
        Ok(created)
    }

    pub async fn current_session(&self) -> Option<Session> {
        let doc = self.document.lock().await;
        doc.current_session_id
            .as_ref()
            .and_then(|id| doc.sessions.get(id))
            .cloned()
    }

    pub async fn get_session(&self, id: &str) -> Result<Session> {
        let doc = self.document.lock().await;
        doc.sessions.get(id).cloned().ok_or_else(|| not_found(id))
    }

    pub async fn switch_session(&self, id: &str) -> Result<Session> {
        self.mutate(|doc| {
            let session = doc.sessions.get(id).cloned().ok_or_else(|| not_found(id))?;
            doc.current_session_id = Some(session.id.clone());
            Ok(session)
        })
        .await
    }

    /// Delete a session. If it was current, the most recent remaining one becomes current.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        self.mutate(|doc| {
            doc.sessions.remove(id).ok_or_else(|| not_found(id))?;
            if doc.current_session_id.as_deref() == Some(id) {
                doc.current_session_id = doc.most_recent_id();
            }
            Ok(())
        })
        .await?;
        info!(session_id = %id, "conversation session deleted");
        Ok(())
    }

    pub async fn rename_session(&self, id: &str, title: &str) -> Result<Session> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DeskError::Validation("title must not be empty".into()));
        }
        self.mutate(|doc| {
            let session = doc.sessions.get_mut(id).ok_or_else(|| not_found(id))?;
            session.title = title.to_string();
            session.updated_at = Utc::now();
            Ok(session.clone())
        })
        .await
    }

    pub async fn clear_session(&self, id: &str) -> Result<Session> {
        self.mutate(|doc| {
            let session = doc.sessions.get_mut(id).ok_or_else(|| not_found(id))?;
            session.messages.clear();
            session.updated_at = Utc::now();
            Ok(session.clone())
        })
        .await
    }

    /// Sessions, most recently updated first.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let doc = self.document.lock().await;
        let mut sessions: Vec<SessionSummary> = doc.sessions.values().map(Session::summary).collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    /// Append a user message and the assistant's reply.
    ///
    /// Without an explicit id the current session is used, creating one if none
    /// exists. Returns the id of the session written to.
    pub async fn append_exchange(
        &self,
        user_text: &str,
        assistant: AssistantTurn,
        session_id: Option<&str>,
    ) -> Result<String> {
        let user = Message::new(MessageRole::User, user_text, Vec::new());
        let reply = Message::new(MessageRole::Assistant, assistant.content, assistant.tool_calls);
        self.mutate(move |doc| {
            let id = match session_id {
                Some(id) if doc.sessions.contains_key(id) => id.to_string(),
                Some(id) => return Err(not_found(id)),
                None => match doc.current_session_id.clone().filter(|id| doc.sessions.contains_key(id)) {
                    Some(id) => id,
                    None => {
                        let session = Session::new(None);
                        let id = session.id.clone();
                        doc.sessions.insert(id.clone(), session);
                        id
                    }
                },
            };
            doc.current_session_id = Some(id.clone());
            let session = doc.sessions.get_mut(&id).ok_or_else(|| not_found(&id))?;
            if session.messages.is_empty() && session.title == DEFAULT_TITLE {
                session.title = derive_title(&user.content);
            }
            session.messages.push(user);
            session.messages.push(reply);
            session.updated_at = Utc::now();
            Ok(id)
        })
        .await
    }

    /// Last `limit` messages of a session (current session when `None`), in order.
    pub async fn recent_messages(&self, session_id: Option<&str>, limit: usize) -> Result<Vec<Message>> {
        let doc = self.document.lock().await;
        let id = match session_id {
            Some(id) => id.to_string(),
            None => match doc.current_session_id.clone() {
                Some(id) => id,
                None => return Ok(Vec::new()),
            },
        };
        let session = doc.sessions.get(&id).ok_or_else(|| not_found(&id))?;
        let start = session.messages.len().saturating_sub(limit);
        Ok(session.messages[start..].to_vec())
    }

    /// Recent turns rendered as `User: ...` / `Assistant: ...` lines for prompt injection.
    pub async fn context_window(&self, session_id: Option<&str>, limit: usize) -> Result<String> {
        let messages = self.recent_messages(session_id, limit).await?;
        Ok(format_context(&messages))
    }
}

/// Render messages as prompt context, including tool outcomes.
pub fn format_context(messages: &[Message]) -> String {
    let mut lines = Vec::new();
    for message in messages {
        lines.push(format!("{}: {}", message.role, message.content.trim()));
        for call in &message.tool_calls {
            lines.push(format!(
                "  [tool {}({}) -> {}]",
                call.name,
                call.arguments,
                truncate(&call.result.to_string(), MAX_TOOL_RESULT_CHARS)
            ));
        }
    }
    lines.join("\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

fn not_found(id: &str) -> DeskError {
    DeskError::NotFound(format!("conversation session {id}"))
}

async fn persist(path: &Path, doc: &ConversationDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let serialized = serde_json::to_vec_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, serialized).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
