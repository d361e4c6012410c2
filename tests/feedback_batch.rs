// Bounded-concurrency batch operations: bulk decryption and bulk
// feedback generation.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use eatlock::feedback_engine::FeedbackEngine;
use eatlock::log_entry::{FeedbackState, LogCategory, LogEntry};
use eatlock::log_store::{LogStore, MemoryLogStore};
use eatlock::repository::{LogRepository, RepositoryLimits};

fn repository() -> LogRepository {
    LogRepository::with_limits(
        Arc::new(MemoryLogStore::new()),
        eatlock::key_manager::KeyManager::generate_key(),
        FeedbackEngine::with_seed(9),
        RepositoryLimits::default(),
    )
}

#[tokio::test]
async fn bulk_decryption_returns_every_entry_once() {
    let repo = repository();

    let mut expected: HashMap<Uuid, String> = HashMap::new();
    let mut entries = Vec::new();
    for i in 0..25 {
        let content = format!("{i}回目の記録です");
        let entry = repo.create(&content, LogCategory::Other).await.unwrap();
        expected.insert(entry.id, content);
        entries.push(entry);
    }

    // Exercise the decrypt path rather than the cache
    repo.clear_caches().await;

    let contents = repo.get_secure_contents(&entries).await;
    assert_eq!(contents.len(), entries.len());
    for (id, content) in &expected {
        assert_eq!(contents.get(id), Some(content));
    }
}

#[tokio::test]
async fn batch_feedback_attaches_exactly_m_results() {
    let repo = repository();

    let mut entries = Vec::new();
    for i in 0..20 {
        let content = format!("{i}日目、ケーキを我慢しました");
        entries.push(repo.create(&content, LogCategory::Success).await.unwrap());
    }

    let attached = repo.generate_feedback_batch(&mut entries).await.unwrap();
    assert_eq!(attached, entries.len());

    for entry in &entries {
        assert!(entry.feedback.is_attached());
        // ケーキ carries the 400 kcal override for every input
        assert_eq!(entry.feedback.prevented_calories(), Some(400));

        let message = repo.get_secure_feedback(entry).await.unwrap();
        assert!(!message.is_empty());
    }

    // Persisted state matches the in-memory batch, no lost updates
    let stored = repo.list_entries().await.unwrap();
    assert_eq!(stored.len(), entries.len());
    assert!(stored.iter().all(|e| e.feedback.is_attached()));

    let stats = repo.get_statistics(None).await.unwrap();
    assert_eq!(stats.total_prevented_calories, 400 * entries.len() as u64);
}

#[tokio::test]
async fn batch_is_a_no_op_on_empty_input() {
    let repo = repository();
    let mut entries = Vec::new();

    let attached = repo.generate_feedback_batch(&mut entries).await.unwrap();
    assert_eq!(attached, 0);

    let contents = repo.get_secure_contents(&entries).await;
    assert!(contents.is_empty());
}

#[tokio::test]
async fn undecryptable_entries_are_marked_failed_not_classified() {
    let store = Arc::new(MemoryLogStore::new());
    let repo = LogRepository::with_limits(
        store.clone(),
        eatlock::key_manager::KeyManager::generate_key(),
        FeedbackEngine::with_seed(9),
        RepositoryLimits::default(),
    );

    let mut entries = vec![repo
        .create("ケーキを我慢した", LogCategory::Success)
        .await
        .unwrap()];

    // Ciphertext written under a different key reads as corrupted
    let foreign = LogEntry::new(vec![0u8; 32], LogCategory::Other);
    store.put(&foreign).unwrap();
    entries.push(foreign);

    repo.clear_caches().await;
    let attached = repo.generate_feedback_batch(&mut entries).await.unwrap();
    assert_eq!(attached, 1);

    assert!(entries[0].feedback.is_attached());
    assert_eq!(entries[1].feedback, FeedbackState::Failed);

    // The failed transition is persisted, not just in-memory
    let stored = store.get(&entries[1].id).unwrap().unwrap();
    assert_eq!(stored.feedback, FeedbackState::Failed);
}

#[tokio::test]
async fn batch_respects_a_tight_concurrency_cap() {
    // A cap of 1 serializes the fan-out; the result must be identical.
    let limits = RepositoryLimits {
        batch_concurrency: 1,
        ..RepositoryLimits::default()
    };
    let repo = LogRepository::with_limits(
        Arc::new(MemoryLogStore::new()),
        eatlock::key_manager::KeyManager::generate_key(),
        FeedbackEngine::with_seed(9),
        limits,
    );

    let mut entries = Vec::new();
    for _ in 0..10 {
        entries.push(
            repo.create("ビールを我慢した", LogCategory::Success)
                .await
                .unwrap(),
        );
    }

    let attached = repo.generate_feedback_batch(&mut entries).await.unwrap();
    assert_eq!(attached, 10);
    assert!(entries.iter().all(|e| e.feedback.is_attached()));
}
