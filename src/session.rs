//! Chat sessions, recent searches and SQL feedback
//!
//! Each session owns its transcript and its own conversation context; nothing
//! here outlives the process.

use crate::context::{ConversationContext, SharedContext};
use crate::data_assistant::ClarificationRequest;
use crate::error::{AssistantError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::info;
use uuid::Uuid;

const TITLE_MAX_CHARS: usize = 20;

pub const SUGGESTED_SEARCHES: &[&str] = &[
    "최근 7일간의 수질 데이터를 보여줘",
    "지역별 물 사용량 비교",
    "점검이 필요한 시설물 확인",
    "pH 수치가 8.0 이상인 데이터",
    "수원지A 평균 탁도",
    "전기전도도가 300 이상인 곳",
    "어제 수원지B의 잔류염소 수치",
    "탁도가 0.5 이하인 깨끗한 물",
];

pub const POPULAR_SEARCHES: &[&str] = &[
    "수질 데이터 평균 보여줘",
    "비정상 수질 데이터 찾기",
    "이번 달 수도 사용량 패턴",
    "수원지B 최근 데이터",
    "가동률 90% 이상인 시설",
    "pH 8.5 이상인 위험 구간",
    "모든 수원지의 암모니아성 질소 비교",
    "탁도 상위 10개 지점",
    "최근 24시간 실시간 현황",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Good,
    Bad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub clarification: Option<ClarificationRequest>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            sql: None,
            clarification: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub title: String,
    pub last_message: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub context: SharedContext,
}

impl ChatSession {
    fn new(first_query: &str, history_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: session_title(first_query),
            last_message: first_query.to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
            context: ConversationContext::shared(history_capacity),
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.last_message = message.content.clone();
        self.messages.push(message);
    }
}

/// First 20 characters of the opening query
pub fn session_title(query: &str) -> String {
    let query = query.trim();
    if query.chars().count() > TITLE_MAX_CHARS {
        let head: String = query.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        query.to_string()
    }
}

/// Sidebar of chat sessions, newest first
pub struct SessionStore {
    sessions: Vec<ChatSession>,
    active: Option<Uuid>,
    history_capacity: usize,
}

impl SessionStore {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            sessions: Vec::new(),
            active: None,
            history_capacity,
        }
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn active(&self) -> Option<&ChatSession> {
        let id = self.active?;
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn active_mut(&mut self) -> Option<&mut ChatSession> {
        let id = self.active?;
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// The active session, created and titled from `query` if there is none
    pub fn ensure_active(&mut self, query: &str) -> &mut ChatSession {
        let exists = self
            .active
            .map(|id| self.sessions.iter().any(|s| s.id == id))
            .unwrap_or(false);

        if !exists {
            let session = ChatSession::new(query, self.history_capacity);
            info!(" New chat session {} \"{}\"", session.id, session.title);
            self.active = Some(session.id);
            self.sessions.insert(0, session);
        }

        let id = self.active.unwrap_or_default();
        let index = self
            .sessions
            .iter()
            .position(|s| s.id == id)
            .unwrap_or(0);
        &mut self.sessions[index]
    }

    /// Clear the active session; the next query opens a new one
    pub fn start_new(&mut self) {
        self.active = None;
    }

    pub fn switch(&mut self, id: Uuid) -> Result<&ChatSession> {
        let session = self
            .sessions
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| AssistantError::Session(format!("No session {}", id)))?;
        self.active = Some(id);
        Ok(session)
    }

    /// Remove a session; deleting the active one starts a new chat
    pub fn delete(&mut self, id: Uuid) -> Result<()> {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        if self.sessions.len() == before {
            return Err(AssistantError::Session(format!("No session {}", id)));
        }
        if self.active == Some(id) {
            self.start_new();
        }
        Ok(())
    }
}

/// Most recent distinct searches, newest first
#[derive(Debug, Clone)]
pub struct RecentSearches {
    entries: VecDeque<String>,
    capacity: usize,
}

impl RecentSearches {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Pre-filled with the demo suggestions
    pub fn seeded(capacity: usize) -> Self {
        Self {
            entries: SUGGESTED_SEARCHES.iter().map(|s| s.to_string()).collect(),
            capacity: capacity.max(1),
        }
    }

    /// Push a new query to the front; already-listed queries are left alone
    pub fn record(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() || self.entries.iter().any(|e| e == query) {
            return false;
        }
        self.entries.truncate(self.capacity - 1);
        self.entries.push_front(query.to_string());
        true
    }

    /// Drop a query from the list; false when it was not listed
    pub fn remove(&mut self, query: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e != query);
        self.entries.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: Option<Rating>,
    pub comment: Option<String>,
}

/// Ratings and comments keyed by the SQL they refer to
#[derive(Debug, Default)]
pub struct FeedbackLedger {
    entries: HashMap<String, Feedback>,
}

impl FeedbackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate(&mut self, sql: &str, rating: Rating) {
        self.entries.entry(sql.to_string()).or_default().rating = Some(rating);
    }

    pub fn comment(&mut self, sql: &str, comment: &str) {
        let comment = comment.trim();
        let entry = self.entries.entry(sql.to_string()).or_default();
        entry.comment = if comment.is_empty() {
            None
        } else {
            Some(comment.to_string())
        };
    }

    pub fn get(&self, sql: &str) -> Option<&Feedback> {
        self.entries.get(sql)
    }
}
