//! Conversation context carried between turns of one chat session

use crate::sql_compiler::SqlStatement;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

/// Context shared between a session and its in-flight turn
pub type SharedContext = Arc<Mutex<ConversationContext>>;

/// A query that made it all the way to SQL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTurn {
    pub query: String,
    pub statement: SqlStatement,
    pub sql: String,
}

/// Last resolved query and SQL plus a short FIFO history.
///
/// The last query and last SQL are always the newest history entry, so they
/// can only change together through `record`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    history: VecDeque<ResolvedTurn>,
    capacity: usize,
    /// Bumped by `begin_turn`; only the newest turn may record
    #[serde(default)]
    generation: u64,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            generation: 0,
        }
    }

    pub fn shared(capacity: usize) -> SharedContext {
        Arc::new(Mutex::new(Self::with_capacity(capacity)))
    }

    pub fn last_query(&self) -> Option<&str> {
        self.history.back().map(|t| t.query.as_str())
    }

    pub fn last_sql(&self) -> Option<&SqlStatement> {
        self.history.back().map(|t| &t.statement)
    }

    pub fn last_sql_text(&self) -> Option<&str> {
        self.history.back().map(|t| t.sql.as_str())
    }

    /// Oldest first
    pub fn history(&self) -> impl Iterator<Item = &ResolvedTurn> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Start a turn, invalidating any turn started before it
    pub fn begin_turn(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Record only if no newer turn has begun since `generation`
    pub fn record_if_current(
        &mut self,
        generation: u64,
        query: impl Into<String>,
        statement: SqlStatement,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        self.record(query, statement);
        true
    }

    /// Record a turn that produced SQL, evicting the oldest beyond capacity
    pub fn record(&mut self, query: impl Into<String>, statement: SqlStatement) {
        let sql = statement.render();
        self.history.push_back(ResolvedTurn {
            query: query.into(),
            statement,
            sql,
        });
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new()
    }
}
