//! Library root for the `eatlock` crate
//! Local-first behavioral logging with encrypt-at-rest storage and
//! rule-based feedback generation.

// Core error handling
pub mod errors;

// Encryption & key management
pub mod content_crypto;
pub mod key_manager;

// Data model & persistence
pub mod log_entry;
pub mod log_store;

// Feedback generation
pub mod calorie_table;
pub mod feedback_engine;

// Repository, caching & statistics
pub mod repository;
pub mod secure_cache;
pub mod statistics;

// Configuration
pub mod config;

// Re-export the primary API surface
pub use errors::{EatLockError, EatLockResult};
pub use feedback_engine::{FeedbackCategory, FeedbackEngine, FeedbackResult};
pub use log_entry::{EntryContent, FeedbackState, LogCategory, LogEntry};
pub use repository::{LogRepository, RepositoryEvent, RepositoryLimits};
pub use statistics::{AggregateStats, DateRange};
