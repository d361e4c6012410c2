//! Behavioral log entry data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::content_crypto;
use crate::errors::{EatLockError, EatLockResult};

/// Maximum content length accepted at creation or update, in characters.
pub const MAX_CONTENT_CHARS: usize = 500;

/// User-assigned classification of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Success,
    Failure,
    Struggle,
    Other,
}

impl FromStr for LogCategory {
    type Err = EatLockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(LogCategory::Success),
            "failure" => Ok(LogCategory::Failure),
            "struggle" => Ok(LogCategory::Struggle),
            "other" => Ok(LogCategory::Other),
            other => Err(EatLockError::validation(
                "category",
                format!("unknown category: {other}"),
            )),
        }
    }
}

/// Entry text in exactly one representation at a time.
///
/// `Plain` exists only transiently between user input and encryption;
/// the store refuses to persist it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryContent {
    Plain(String),
    Encrypted(Vec<u8>),
}

impl EntryContent {
    /// Decrypt into the plaintext string. `Plain` reveals itself.
    pub fn reveal(&self, key: &[u8; 32]) -> EatLockResult<String> {
        match self {
            EntryContent::Plain(text) => Ok(text.clone()),
            EntryContent::Encrypted(data) => content_crypto::decrypt_str(data, key),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, EntryContent::Encrypted(_))
    }
}

/// Feedback lifecycle of an entry.
///
/// The generated message and the prevented-calorie estimate are carried
/// together inside `Attached`, so they can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackState {
    /// Created, feedback not yet generated.
    Pending,
    /// Feedback generated and encrypted.
    Attached {
        /// Ciphertext of the feedback message
        message: Vec<u8>,
        prevented_calories: u32,
    },
    /// Generation failed; the entry stands without feedback.
    Failed,
}

impl FeedbackState {
    pub fn is_attached(&self) -> bool {
        matches!(self, FeedbackState::Attached { .. })
    }

    /// Calorie estimate carried by attached feedback, if any.
    pub fn prevented_calories(&self) -> Option<u32> {
        match self {
            FeedbackState::Attached {
                prevented_calories, ..
            } => Some(*prevented_calories),
            _ => None,
        }
    }
}

/// One user-submitted behavioral record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub content: EntryContent,
    pub category: LogCategory,
    /// Creation time; immutable, used for day-bucketing.
    pub timestamp: DateTime<Utc>,
    pub feedback: FeedbackState,
    /// Ordered, deduplicated free-form tags.
    pub emotion_tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl LogEntry {
    /// Build a new entry around already-encrypted content.
    pub fn new(encrypted_content: Vec<u8>, category: LogCategory) -> Self {
        let now = Utc::now();
        LogEntry {
            id: Uuid::new_v4(),
            content: EntryContent::Encrypted(encrypted_content),
            category,
            timestamp: now,
            feedback: FeedbackState::Pending,
            emotion_tags: Vec::new(),
            updated_at: now,
        }
    }
}

/// Trim and validate user content against the length bound.
pub fn validate_content(content: &str, max_chars: usize) -> EatLockResult<&str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(EatLockError::validation("content", "must not be empty"));
    }
    if trimmed.chars().count() > max_chars {
        return Err(EatLockError::validation(
            "content",
            format!("exceeds {max_chars} characters"),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parsing() {
        assert_eq!("success".parse::<LogCategory>().unwrap(), LogCategory::Success);
        assert_eq!("Struggle".parse::<LogCategory>().unwrap(), LogCategory::Struggle);
        assert!("snack".parse::<LogCategory>().is_err());
    }

    #[test]
    fn content_validation_bounds() {
        assert!(validate_content("", MAX_CONTENT_CHARS).is_err());
        assert!(validate_content("   \n\t ", MAX_CONTENT_CHARS).is_err());

        let exactly = "あ".repeat(MAX_CONTENT_CHARS);
        assert!(validate_content(&exactly, MAX_CONTENT_CHARS).is_ok());

        let over = "あ".repeat(MAX_CONTENT_CHARS + 1);
        assert!(validate_content(&over, MAX_CONTENT_CHARS).is_err());
    }

    #[test]
    fn validation_trims_whitespace() {
        assert_eq!(validate_content("  我慢した  ", 500).unwrap(), "我慢した");
    }

    #[test]
    fn reveal_roundtrip() {
        let key = crate::key_manager::KeyManager::generate_key();
        let ciphertext = crate::content_crypto::encrypt_str("おやつを断った", &key).unwrap();
        let content = EntryContent::Encrypted(ciphertext);
        assert!(content.is_encrypted());
        assert_eq!(content.reveal(&key).unwrap(), "おやつを断った");
    }

    #[test]
    fn feedback_state_fields_move_together() {
        let attached = FeedbackState::Attached {
            message: vec![1, 2, 3],
            prevented_calories: 250,
        };
        assert!(attached.is_attached());
        assert_eq!(attached.prevented_calories(), Some(250));
        assert_eq!(FeedbackState::Pending.prevented_calories(), None);
    }
}
