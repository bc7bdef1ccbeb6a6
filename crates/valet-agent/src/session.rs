// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation sessions with capped history and one-shot
//! restoration from storage.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use valet_core::{Role, StorageAdapter, Turn, ValetError};

/// Drops the oldest non-system turns until at most `limit` remain.
/// System turns are never evicted.
pub fn trim_history(turns: &mut Vec<Turn>, limit: usize) {
    let non_system = turns.iter().filter(|t| t.role != Role::System).count();
    if non_system <= limit {
        return;
    }
    let mut to_drop = non_system - limit;
    turns.retain(|t| {
        if t.role == Role::System {
            return true;
        }
        if to_drop > 0 {
            to_drop -= 1;
            false
        } else {
            true
        }
    });
}

/// One conversation's live transcript: a leading system preamble plus a
/// bounded window of user and assistant turns.
pub struct ConversationSession {
    turns: Vec<Turn>,
    history_limit: usize,
    restored: bool,
}

impl ConversationSession {
    pub fn new(preamble: String, history_limit: usize) -> Self {
        Self {
            turns: vec![Turn::new(Role::System, preamble)],
            history_limit,
            restored: false,
        }
    }

    /// Replaces the leading system preamble. The preamble is rebuilt for
    /// every pipeline run; all other turns are append-only.
    pub fn set_preamble(&mut self, preamble: String) {
        match self.turns.first_mut() {
            Some(first) if first.role == Role::System => first.content = preamble,
            _ => self.turns.insert(0, Turn::new(Role::System, preamble)),
        }
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        trim_history(&mut self.turns, self.history_limit);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn non_system_len(&self) -> usize {
        self.turns.iter().filter(|t| t.role != Role::System).count()
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }
}

/// Creates sessions on demand and restores their recent history from
/// storage exactly once per process lifetime.
pub struct SessionManager {
    sessions: DashMap<String, Arc<Mutex<ConversationSession>>>,
    storage: Arc<dyn StorageAdapter>,
    history_limit: usize,
    restore_limit: usize,
}

impl SessionManager {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        history_limit: usize,
        restore_limit: usize,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            storage,
            history_limit,
            restore_limit,
        }
    }

    /// Returns the session for `conversation_key`, creating it and
    /// replaying its most recent persisted turns on first access.
    /// Restoration runs at most once per key; repeat calls return the
    /// live session untouched.
    pub async fn get_or_restore(
        &self,
        conversation_key: &str,
        preamble: &str,
    ) -> Result<Arc<Mutex<ConversationSession>>, ValetError> {
        let session = self
            .sessions
            .entry(conversation_key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ConversationSession::new(
                    preamble.to_string(),
                    self.history_limit,
                )))
            })
            .clone();

        {
            let mut guard = session.lock().await;
            if !guard.restored {
                guard.restored = true;
                match self
                    .storage
                    .load_recent_messages(conversation_key, self.restore_limit)
                    .await
                {
                    Ok(rows) => {
                        let replayed = rows.len();
                        for row in rows {
                            guard.push_turn(Turn::new(row.role, row.content));
                        }
                        if replayed > 0 {
                            debug!(
                                conversation_key,
                                replayed, "restored session from storage"
                            );
                        }
                    }
                    Err(e) => {
                        // An unreadable history should not block live
                        // traffic; the session starts empty instead.
                        warn!(conversation_key, error = %e, "session restore failed");
                    }
                }
            }
        }

        Ok(session)
    }

    /// Returns the session only if it already exists.
    pub fn get(&self, conversation_key: &str) -> Option<Arc<Mutex<ConversationSession>>> {
        self.sessions.get(conversation_key).map(|s| Arc::clone(&s))
    }

    /// Discards a conversation's in-memory state. The next message
    /// creates a fresh session and restores from storage again.
    pub fn reset(&self, conversation_key: &str) -> bool {
        self.sessions.remove(conversation_key).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(text: &str) -> Turn {
        Turn::new(Role::User, text)
    }

    fn assistant(text: &str) -> Turn {
        Turn::new(Role::Assistant, text)
    }

    #[test]
    fn trim_keeps_most_recent_non_system_turns() {
        let mut turns = vec![Turn::new(Role::System, "preamble")];
        for i in 0..10 {
            turns.push(user(&format!("u{i}")));
            turns.push(assistant(&format!("a{i}")));
        }

        trim_history(&mut turns, 4);

        assert_eq!(turns.len(), 5);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[1].content, "u8");
        assert_eq!(turns[4].content, "a9");
    }

    #[test]
    fn trim_never_evicts_system_turns() {
        let mut turns = vec![
            Turn::new(Role::System, "preamble"),
            user("u0"),
            Turn::new(Role::System, "memory context"),
            user("u1"),
            assistant("a1"),
        ];

        trim_history(&mut turns, 2);

        let systems: Vec<_> = turns.iter().filter(|t| t.role == Role::System).collect();
        assert_eq!(systems.len(), 2);
        assert_eq!(turns.iter().filter(|t| t.role != Role::System).count(), 2);
        assert_eq!(turns.last().unwrap().content, "a1");
    }

    #[test]
    fn trim_under_limit_is_a_no_op() {
        let mut turns = vec![Turn::new(Role::System, "p"), user("u0")];
        let before = turns.clone();
        trim_history(&mut turns, 40);
        assert_eq!(turns, before);
    }

    #[test]
    fn session_cap_holds_under_sustained_pushes() {
        let mut session = ConversationSession::new("p".into(), 6);
        for i in 0..50 {
            session.push_turn(user(&format!("u{i}")));
            session.push_turn(assistant(&format!("a{i}")));
        }
        assert_eq!(session.non_system_len(), 6);
        assert_eq!(session.turns()[0].role, Role::System);
        assert_eq!(session.turns().last().unwrap().content, "a49");
    }

    #[test]
    fn set_preamble_replaces_leading_system_turn() {
        let mut session = ConversationSession::new("old".into(), 10);
        session.push_turn(user("hi"));
        session.set_preamble("new".into());
        assert_eq!(session.turns()[0].content, "new");
        assert_eq!(session.turns().len(), 2);
    }
}
