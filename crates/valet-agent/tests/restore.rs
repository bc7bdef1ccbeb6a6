// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cold-start session restore semantics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use valet_agent::{MessagePipeline, PipelineSettings, SessionManager};
use valet_core::{
    MessageStatus, PersistedMessage, ProviderAdapter, Role, StorageAdapter,
};
use valet_test_utils::{MemStorage, MockChannel, MockProvider};

fn row(key: &str, role: Role, content: &str, status: MessageStatus) -> PersistedMessage {
    PersistedMessage {
        id: uuid::Uuid::new_v4().to_string(),
        conversation_key: key.to_string(),
        role,
        content: content.to_string(),
        transport_message_id: None,
        sender_name: None,
        sender_id: None,
        status,
        created_at: Utc::now().to_rfc3339(),
    }
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        system_prompt: "preamble".to_string(),
        conversation_prompts: HashMap::new(),
        prompt_fragments: Vec::new(),
        max_tokens: 256,
        provider_timeout: Duration::from_secs(5),
        memory_recall_limit: 3,
    }
}

async fn preloaded_storage() -> Arc<MemStorage> {
    let storage = Arc::new(MemStorage::new());
    storage
        .append_message(&row("alice", Role::User, "old question", MessageStatus::Done))
        .await
        .unwrap();
    storage
        .append_message(&row(
            "alice",
            Role::Assistant,
            "old answer",
            MessageStatus::Done,
        ))
        .await
        .unwrap();
    storage
        .append_message(&row(
            "alice",
            Role::User,
            "crashed mid-flight",
            MessageStatus::Processing,
        ))
        .await
        .unwrap();
    storage
        .append_message(&row(
            "alice",
            Role::User,
            "went sideways",
            MessageStatus::Error,
        ))
        .await
        .unwrap();
    storage
}

#[tokio::test]
async fn restore_replays_finished_history_in_order() {
    let storage = preloaded_storage().await;
    let sessions = SessionManager::new(storage as Arc<dyn StorageAdapter>, 40, 20);

    let session = sessions.get_or_restore("alice", "preamble").await.unwrap();
    let guard = session.lock().await;
    let turns = guard.turns();

    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].role, Role::System);
    assert_eq!(turns[1].content, "old question");
    assert_eq!(turns[2].content, "old answer");
    // Neither the crashed nor the errored turn reappears.
    assert!(turns.iter().all(|t| t.content != "crashed mid-flight"));
    assert!(turns.iter().all(|t| t.content != "went sideways"));
}

#[tokio::test]
async fn restore_runs_at_most_once_per_key() {
    let storage = preloaded_storage().await;
    let sessions = SessionManager::new(storage as Arc<dyn StorageAdapter>, 40, 20);

    let first = sessions.get_or_restore("alice", "preamble").await.unwrap();
    let len_after_first = first.lock().await.turns().len();

    let second = sessions.get_or_restore("alice", "preamble").await.unwrap();
    let len_after_second = second.lock().await.turns().len();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(len_after_first, len_after_second);
}

#[tokio::test]
async fn reset_discards_state_and_restores_fresh_next_time() {
    let storage = preloaded_storage().await;
    let sessions = SessionManager::new(
        storage.clone() as Arc<dyn StorageAdapter>,
        40,
        20,
    );

    let session = sessions.get_or_restore("alice", "preamble").await.unwrap();
    session
        .lock()
        .await
        .push_turn(valet_core::Turn::new(Role::User, "ephemeral"));

    assert!(sessions.reset("alice"));
    assert!(sessions.get("alice").is_none());

    // Fresh session restores from storage again; the unpersisted turn is
    // gone.
    let session = sessions.get_or_restore("alice", "preamble").await.unwrap();
    let guard = session.lock().await;
    assert_eq!(guard.turns().len(), 3);
    assert!(guard.turns().iter().all(|t| t.content != "ephemeral"));
}

#[tokio::test]
async fn restore_respects_the_limit() {
    let storage = Arc::new(MemStorage::new());
    for i in 0..10 {
        storage
            .append_message(&row(
                "alice",
                Role::User,
                &format!("m{i}"),
                MessageStatus::Done,
            ))
            .await
            .unwrap();
    }
    let sessions = SessionManager::new(storage as Arc<dyn StorageAdapter>, 40, 4);

    let session = sessions.get_or_restore("alice", "preamble").await.unwrap();
    let guard = session.lock().await;
    assert_eq!(guard.non_system_len(), 4);
    assert_eq!(guard.turns()[1].content, "m6");
    assert_eq!(guard.turns().last().unwrap().content, "m9");
}

#[tokio::test]
async fn restored_context_reaches_the_provider() {
    let storage = preloaded_storage().await;
    let channel = Arc::new(MockChannel::new());
    let provider = Arc::new(MockProvider::with_replies(vec!["with context"]));
    let sessions = Arc::new(SessionManager::new(
        storage.clone() as Arc<dyn StorageAdapter>,
        40,
        20,
    ));
    let pipeline = MessagePipeline::new(
        settings(),
        sessions,
        storage,
        provider.clone() as Arc<dyn ProviderAdapter>,
        None,
        channel,
    );

    pipeline
        .process(MockChannel::dm("alice", "Alice", "follow-up"))
        .await;

    let calls = provider.calls().await;
    let turns = &calls[0];
    assert!(turns.iter().any(|t| t.content == "old question"));
    assert!(turns.iter().any(|t| t.content == "old answer"));
    assert_eq!(turns.last().unwrap().content, "follow-up");
}
