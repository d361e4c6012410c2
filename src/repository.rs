//! Encrypted log repository
//!
//! Sole mediator between callers and the persistent store. Owns the
//! device key, the decrypted-text caches, feedback generation and the
//! aggregate statistics. All mutations are serialized through `&self`
//! methods; read-side caches are independently thread-safe.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::content_crypto;
use crate::errors::{EatLockError, EatLockResult};
use crate::feedback_engine::{FeedbackEngine, FeedbackResult};
use crate::log_entry::{validate_content, EntryContent, FeedbackState, LogCategory, LogEntry};
use crate::log_store::LogStore;
use crate::secure_cache::SecureCache;
use crate::statistics::{self, AggregateStats, DateRange};

/// Placeholder returned when stored ciphertext cannot be decrypted.
/// Read paths never fail; corruption degrades to this string.
pub const DECRYPT_FALLBACK: &str = "（内容を復元できません）";

/// Tunables for the repository, mirroring the configuration constants.
#[derive(Debug, Clone)]
pub struct RepositoryLimits {
    pub max_content_chars: usize,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub batch_concurrency: usize,
    pub feedback_timeout: Duration,
}

impl Default for RepositoryLimits {
    fn default() -> Self {
        Self {
            max_content_chars: crate::log_entry::MAX_CONTENT_CHARS,
            cache_capacity: 100,
            cache_ttl: Duration::from_secs(30),
            batch_concurrency: 8,
            feedback_timeout: Duration::from_secs(10),
        }
    }
}

/// Change notifications emitted to subscribers.
#[derive(Debug, Clone)]
pub enum RepositoryEvent {
    EntryChanged(Uuid),
    EntryDeleted(Uuid),
    StatisticsChanged(AggregateStats),
}

/// Encrypt-at-rest repository over a [`LogStore`].
pub struct LogRepository {
    store: Arc<dyn LogStore>,
    key: [u8; 32],
    content_cache: SecureCache,
    feedback_cache: SecureCache,
    engine: Arc<FeedbackEngine>,
    stats: RwLock<AggregateStats>,
    events: broadcast::Sender<RepositoryEvent>,
    limits: RepositoryLimits,
}

impl LogRepository {
    pub fn new(store: Arc<dyn LogStore>, key: [u8; 32]) -> Self {
        Self::with_limits(store, key, FeedbackEngine::new(), RepositoryLimits::default())
    }

    pub fn with_limits(
        store: Arc<dyn LogStore>,
        key: [u8; 32],
        engine: FeedbackEngine,
        limits: RepositoryLimits,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            key,
            content_cache: SecureCache::new(limits.cache_capacity, limits.cache_ttl),
            feedback_cache: SecureCache::new(limits.cache_capacity, limits.cache_ttl),
            engine: Arc::new(engine),
            stats: RwLock::new(AggregateStats::default()),
            events,
            limits,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryEvent> {
        self.events.subscribe()
    }

    // ---- creation ----------------------------------------------------

    /// Validate, encrypt and persist a new entry.
    ///
    /// Encryption failure aborts the create entirely; no plaintext is
    /// ever handed to the store.
    pub async fn create(&self, content: &str, category: LogCategory) -> EatLockResult<LogEntry> {
        let trimmed = validate_content(content, self.limits.max_content_chars)?;
        let ciphertext = content_crypto::encrypt_str(trimmed, &self.key)?;

        let entry = LogEntry::new(ciphertext, category);
        self.store.put(&entry)?;

        self.after_mutation(entry.id).await;
        Ok(entry)
    }

    /// `create`, then generate and attach feedback.
    ///
    /// Feedback failure never fails the call: the entry persists in the
    /// `Pending`/`Failed` state and the condition is logged only.
    pub async fn create_with_feedback(
        &self,
        content: &str,
        category: LogCategory,
    ) -> EatLockResult<LogEntry> {
        let mut entry = self.create(content, category).await?;
        let plaintext = content.trim().to_string();

        match self.generate_feedback(&plaintext).await {
            Some(result) => {
                if let Err(e) = self
                    .attach_feedback(&mut entry, &result.message, result.prevented_calories)
                    .await
                {
                    tracing::warn!(entry = %entry.id, error = %e, "feedback attachment failed");
                    self.mark_feedback_failed(&mut entry).await;
                }
            }
            None => {
                self.mark_feedback_failed(&mut entry).await;
            }
        }

        Ok(entry)
    }

    /// Run the classifier under the feedback timeout.
    ///
    /// Engine validation failures substitute the fixed fallback result;
    /// a timeout yields `None` and the entry stays without feedback.
    async fn generate_feedback(&self, plaintext: &str) -> Option<FeedbackResult> {
        let engine = self.engine.clone();
        let text = plaintext.to_string();
        let classify = tokio::task::spawn_blocking(move || engine.classify(&text));

        match tokio::time::timeout(self.limits.feedback_timeout, classify).await {
            Ok(Ok(Ok(result))) => Some(result),
            Ok(Ok(Err(e))) => {
                tracing::debug!(error = %e, "classification rejected input, using fallback");
                Some(FeedbackEngine::fallback())
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "classification task failed");
                None
            }
            Err(_) => {
                tracing::warn!("feedback generation timed out");
                None
            }
        }
    }

    // ---- mutation ----------------------------------------------------

    /// Encrypt and attach a feedback message and calorie estimate.
    ///
    /// On persistence failure the entry is rolled back to its
    /// pre-mutation snapshot and an `Update` error is returned.
    pub async fn attach_feedback(
        &self,
        entry: &mut LogEntry,
        message: &str,
        prevented_calories: u32,
    ) -> EatLockResult<()> {
        let ciphertext = content_crypto::encrypt_str(message, &self.key)?;

        let feedback_snapshot = entry.feedback.clone();
        let updated_snapshot = entry.updated_at;

        entry.feedback = FeedbackState::Attached {
            message: ciphertext,
            prevented_calories,
        };
        entry.updated_at = Utc::now();

        if let Err(e) = self.store.put(entry) {
            entry.feedback = feedback_snapshot;
            entry.updated_at = updated_snapshot;
            return Err(EatLockError::update("attach_feedback", e.to_string()));
        }

        self.after_mutation(entry.id).await;
        Ok(())
    }

    /// Replace the entry content, with the same rollback discipline.
    pub async fn update_content(
        &self,
        entry: &mut LogEntry,
        new_content: &str,
    ) -> EatLockResult<()> {
        let trimmed = validate_content(new_content, self.limits.max_content_chars)?;
        let ciphertext = content_crypto::encrypt_str(trimmed, &self.key)?;

        let content_snapshot = entry.content.clone();
        let updated_snapshot = entry.updated_at;

        entry.content = EntryContent::Encrypted(ciphertext);
        entry.updated_at = Utc::now();

        if let Err(e) = self.store.put(entry) {
            entry.content = content_snapshot;
            entry.updated_at = updated_snapshot;
            return Err(EatLockError::update("update_content", e.to_string()));
        }

        self.after_mutation(entry.id).await;
        Ok(())
    }

    /// Reassign the entry category.
    pub async fn set_category(
        &self,
        entry: &mut LogEntry,
        category: LogCategory,
    ) -> EatLockResult<()> {
        let category_snapshot = entry.category;
        let updated_snapshot = entry.updated_at;

        entry.category = category;
        entry.updated_at = Utc::now();

        if let Err(e) = self.store.put(entry) {
            entry.category = category_snapshot;
            entry.updated_at = updated_snapshot;
            return Err(EatLockError::update("set_category", e.to_string()));
        }

        self.after_mutation(entry.id).await;
        Ok(())
    }

    /// Append an emotion tag; duplicates are ignored.
    pub async fn add_emotion_tag(&self, entry: &mut LogEntry, tag: &str) -> EatLockResult<()> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(EatLockError::validation("emotion_tag", "must not be empty"));
        }
        if entry.emotion_tags.iter().any(|t| t == tag) {
            return Ok(());
        }

        let tags_snapshot = entry.emotion_tags.clone();
        let updated_snapshot = entry.updated_at;

        entry.emotion_tags.push(tag.to_string());
        entry.updated_at = Utc::now();

        if let Err(e) = self.store.put(entry) {
            entry.emotion_tags = tags_snapshot;
            entry.updated_at = updated_snapshot;
            return Err(EatLockError::update("add_emotion_tag", e.to_string()));
        }

        self.after_mutation(entry.id).await;
        Ok(())
    }

    /// Remove an emotion tag if present.
    pub async fn remove_emotion_tag(&self, entry: &mut LogEntry, tag: &str) -> EatLockResult<()> {
        if !entry.emotion_tags.iter().any(|t| t == tag) {
            return Ok(());
        }

        let tags_snapshot = entry.emotion_tags.clone();
        let updated_snapshot = entry.updated_at;

        entry.emotion_tags.retain(|t| t != tag);
        entry.updated_at = Utc::now();

        if let Err(e) = self.store.put(entry) {
            entry.emotion_tags = tags_snapshot;
            entry.updated_at = updated_snapshot;
            return Err(EatLockError::update("remove_emotion_tag", e.to_string()));
        }

        self.after_mutation(entry.id).await;
        Ok(())
    }

    /// Best-effort transition to the `Failed` feedback state.
    pub async fn mark_feedback_failed(&self, entry: &mut LogEntry) {
        let feedback_snapshot = entry.feedback.clone();
        let updated_snapshot = entry.updated_at;

        entry.feedback = FeedbackState::Failed;
        entry.updated_at = Utc::now();

        if let Err(e) = self.store.put(entry) {
            entry.feedback = feedback_snapshot;
            entry.updated_at = updated_snapshot;
            tracing::warn!(entry = %entry.id, error = %e, "could not record feedback failure");
            return;
        }

        self.after_mutation(entry.id).await;
    }

    // ---- deletion ----------------------------------------------------

    pub async fn delete(&self, entry: &LogEntry) -> EatLockResult<()> {
        self.store
            .remove(&entry.id)
            .map_err(|e| EatLockError::delete("delete", e.to_string()))?;

        self.after_deletion(&[entry.id]).await;
        Ok(())
    }

    /// Delete a batch. All removals are attempted; the error reports how
    /// many failed. No partial-deletion guarantee beyond the store's own.
    pub async fn delete_many(&self, entries: &[LogEntry]) -> EatLockResult<usize> {
        let mut deleted = Vec::new();
        let mut failures = 0usize;

        for entry in entries {
            match self.store.remove(&entry.id) {
                Ok(()) => deleted.push(entry.id),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(entry = %entry.id, error = %e, "delete failed");
                }
            }
        }

        self.after_deletion(&deleted).await;

        if failures > 0 {
            return Err(EatLockError::delete(
                "delete_many",
                format!("{failures} of {} removals failed", entries.len()),
            ));
        }
        Ok(deleted.len())
    }

    /// Retention sweep: delete every entry created before the cutoff.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> EatLockResult<usize> {
        let expired: Vec<LogEntry> = self
            .store
            .list()?
            .into_iter()
            .filter(|e| e.timestamp < cutoff)
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }
        self.delete_many(&expired).await
    }

    // ---- reads -------------------------------------------------------

    /// Fetch one entry by id.
    pub async fn get_entry(&self, id: &Uuid) -> EatLockResult<LogEntry> {
        self.store
            .get(id)?
            .ok_or_else(|| EatLockError::not_found("log_entry", id.to_string()))
    }

    /// All entries, newest first.
    pub async fn list_entries(&self) -> EatLockResult<Vec<LogEntry>> {
        let mut entries = self.store.list()?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    /// Cache-checked decrypt of the entry content. Never fails: a
    /// decryption error degrades to [`DECRYPT_FALLBACK`].
    pub async fn get_secure_content(&self, entry: &LogEntry) -> String {
        if let Some(text) = self.content_cache.get(&entry.id).await {
            return text;
        }

        match entry.content.reveal(&self.key) {
            Ok(text) => {
                self.content_cache.insert(entry.id, text.clone()).await;
                text
            }
            Err(e) => {
                tracing::warn!(entry = %entry.id, error = %e, "content decryption failed");
                DECRYPT_FALLBACK.to_string()
            }
        }
    }

    /// Cache-checked decrypt of the feedback message, `None` while
    /// feedback is pending or failed.
    pub async fn get_secure_feedback(&self, entry: &LogEntry) -> Option<String> {
        let ciphertext = match &entry.feedback {
            FeedbackState::Attached { message, .. } => message,
            _ => return None,
        };

        if let Some(text) = self.feedback_cache.get(&entry.id).await {
            return Some(text);
        }

        match content_crypto::decrypt_str(ciphertext, &self.key) {
            Ok(text) => {
                self.feedback_cache.insert(entry.id, text.clone()).await;
                Some(text)
            }
            Err(e) => {
                tracing::warn!(entry = %entry.id, error = %e, "feedback decryption failed");
                Some(DECRYPT_FALLBACK.to_string())
            }
        }
    }

    /// Decrypt a batch of contents with bounded fan-out, keyed by id.
    pub async fn get_secure_contents(
        &self,
        entries: &[LogEntry],
    ) -> HashMap<Uuid, String> {
        let mut results = HashMap::with_capacity(entries.len());
        let semaphore = Arc::new(Semaphore::new(self.limits.batch_concurrency));
        let mut tasks: JoinSet<(Uuid, Option<String>)> = JoinSet::new();

        for entry in entries {
            if let Some(text) = self.content_cache.get(&entry.id).await {
                results.insert(entry.id, text);
                continue;
            }

            let payload = match &entry.content {
                EntryContent::Plain(text) => {
                    results.insert(entry.id, text.clone());
                    continue;
                }
                EntryContent::Encrypted(data) => data.clone(),
            };

            let id = entry.id;
            let key = self.key;
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (id, None),
                };
                (id, content_crypto::decrypt_str(&payload, &key).ok())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Some(text))) => {
                    self.content_cache.insert(id, text.clone()).await;
                    results.insert(id, text);
                }
                Ok((id, None)) => {
                    tracing::warn!(entry = %id, "batch content decryption failed");
                    results.insert(id, DECRYPT_FALLBACK.to_string());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "batch decryption task failed");
                }
            }
        }

        results
    }

    /// Classify a batch of entries with bounded fan-out and attach the
    /// results. Classification runs concurrently; mutations are applied
    /// serially afterwards. Entries whose ciphertext cannot be decrypted
    /// are marked `Failed` rather than classified from the placeholder.
    /// Returns the number of attachments made.
    pub async fn generate_feedback_batch(
        &self,
        entries: &mut [LogEntry],
    ) -> EatLockResult<usize> {
        let texts = self.get_secure_contents(entries).await;

        let semaphore = Arc::new(Semaphore::new(self.limits.batch_concurrency));
        let mut tasks: JoinSet<(Uuid, FeedbackResult)> = JoinSet::new();
        let mut undecryptable: HashSet<Uuid> = HashSet::new();

        for (id, text) in texts {
            if text == DECRYPT_FALLBACK {
                undecryptable.insert(id);
                continue;
            }
            let engine = self.engine.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (id, FeedbackEngine::fallback()),
                };
                let result = engine
                    .classify(&text)
                    .unwrap_or_else(|_| FeedbackEngine::fallback());
                (id, result)
            });
        }

        let mut results: HashMap<Uuid, FeedbackResult> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, result)) => {
                    results.insert(id, result);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "batch classification task failed");
                }
            }
        }

        let mut attached = 0usize;
        for entry in entries.iter_mut() {
            if undecryptable.contains(&entry.id) {
                tracing::warn!(entry = %entry.id, "content unreadable, marking feedback failed");
                self.mark_feedback_failed(entry).await;
                continue;
            }
            let Some(result) = results.get(&entry.id) else {
                continue;
            };
            match self
                .attach_feedback(entry, &result.message, result.prevented_calories)
                .await
            {
                Ok(()) => attached += 1,
                Err(e) => {
                    tracing::warn!(entry = %entry.id, error = %e, "batch feedback attachment failed");
                }
            }
        }

        Ok(attached)
    }

    // ---- statistics ----------------------------------------------------

    /// Full recompute from the store; updates the last-known-good
    /// aggregate and notifies subscribers.
    pub async fn refresh_statistics(&self) -> EatLockResult<AggregateStats> {
        let entries = self.store.list()?;
        let stats = statistics::compute(&entries, Utc::now().date_naive());

        *self.stats.write().await = stats.clone();
        let _ = self
            .events
            .send(RepositoryEvent::StatisticsChanged(stats.clone()));
        Ok(stats)
    }

    /// On-demand fold over the (optionally range-filtered) entry set.
    pub async fn get_statistics(
        &self,
        range: Option<DateRange>,
    ) -> EatLockResult<AggregateStats> {
        let mut entries = self.store.list()?;
        if let Some(range) = range {
            entries.retain(|e| range.contains(e.timestamp));
        }
        Ok(statistics::compute(&entries, Utc::now().date_naive()))
    }

    /// Last-known-good aggregate, possibly stale until the next refresh.
    pub async fn current_statistics(&self) -> AggregateStats {
        self.stats.read().await.clone()
    }

    /// Safety-net refresh task against missed triggers.
    pub fn spawn_periodic_refresh(
        repository: Arc<LogRepository>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = repository.refresh_statistics().await {
                    tracing::warn!(error = %e, "periodic statistics refresh failed");
                }
            }
        })
    }

    // ---- internal ------------------------------------------------------

    /// Post-write bookkeeping: wholesale cache invalidation, statistics
    /// recompute (failure logged, stats stay stale), change event.
    async fn after_mutation(&self, changed: Uuid) {
        self.content_cache.clear().await;
        self.feedback_cache.clear().await;

        if let Err(e) = self.refresh_statistics().await {
            tracing::warn!(error = %e, "statistics refresh failed after mutation");
        }
        let _ = self.events.send(RepositoryEvent::EntryChanged(changed));
    }

    async fn after_deletion(&self, deleted: &[Uuid]) {
        self.content_cache.clear().await;
        self.feedback_cache.clear().await;

        if let Err(e) = self.refresh_statistics().await {
            tracing::warn!(error = %e, "statistics refresh failed after deletion");
        }
        for id in deleted {
            let _ = self.events.send(RepositoryEvent::EntryDeleted(*id));
        }
    }

    /// Clear both plaintext caches (exposed for tests and hygiene).
    pub async fn clear_caches(&self) {
        self.content_cache.clear().await;
        self.feedback_cache.clear().await;
    }
}
