//! Rule-based feedback generation
//!
//! A stateless classifier over static keyword tables: free text in,
//! feedback category, message and prevented-calorie estimate out. The
//! only nondeterminism is message selection, driven by an injectable RNG
//! so tests can pin a seed.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;

use crate::calorie_table;

/// Maximum input length the engine accepts, in characters.
pub const MAX_ENGINE_INPUT_CHARS: usize = 200;

/// Multiplier applied to the calorie estimate for late-night inputs.
pub const LATE_NIGHT_MULTIPLIER: f64 = 1.5;
/// Minimum calorie value after the late-night multiplier.
pub const LATE_NIGHT_FLOOR_KCAL: u32 = 500;

/// Feedback classification of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCategory {
    Achievement,
    Support,
    Warning,
    Encouragement,
}

/// Output of a classification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackResult {
    pub message: String,
    pub prevented_calories: u32,
    pub category: FeedbackCategory,
}

impl FeedbackResult {
    /// Debug/export JSON shape: `{"message", "kcal", "type", "generatedAt"}`.
    pub fn export(&self, generated_at: DateTime<Utc>) -> FeedbackExport {
        FeedbackExport {
            message: self.message.clone(),
            kcal: self.prevented_calories,
            category: self.category,
            generated_at,
        }
    }
}

/// JSON export shape for generated feedback.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackExport {
    pub message: String,
    pub kcal: u32,
    #[serde(rename = "type")]
    pub category: FeedbackCategory,
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
}

/// Input validation failures. Both are non-fatal: callers substitute
/// [`FeedbackEngine::fallback`] instead of surfacing them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("input is empty after trimming")]
    Empty,
    #[error("input exceeds {max} characters")]
    TooLong { max: usize },
}

lazy_static! {
    /// Resistance / success words
    static ref POSITIVE_ACTION: Vec<&'static str> = vec![
        "我慢", "やめた", "やめました", "断った", "断りました", "防いだ", "防ぎました",
        "抑えた", "抑えました", "耐えた", "成功", "食べなかった", "飲まなかった",
        "resisted", "skipped", "avoided",
    ];

    /// Late-night words
    static ref TIME_CONTEXT: Vec<&'static str> = vec![
        "深夜", "夜中", "真夜中", "夜食", "寝る前", "late night", "midnight",
    ];

    /// Stress / anxiety words
    static ref EMOTIONAL_TRIGGER: Vec<&'static str> = vec![
        "ストレス", "イライラ", "不安", "疲れ", "落ち込", "辛い", "しんどい",
        "stressed", "anxious", "tired",
    ];

    static ref ACHIEVEMENT_MESSAGES: Vec<&'static str> = vec![
        "素晴らしい！その我慢が未来の自分を作ります。",
        "よく耐えました！確実に前に進んでいます。",
        "見事な自制心です。この調子で続けましょう！",
        "その選択ができたこと自体が大きな成果です。",
    ];

    static ref LATE_NIGHT_ACHIEVEMENT_MESSAGES: Vec<&'static str> = vec![
        "深夜の誘惑に勝ちました！これは本当に難しいことです。",
        "夜中の我慢は効果絶大。睡眠の質も上がります。",
        "一番つらい時間帯を乗り越えましたね。お見事です！",
    ];

    static ref SUPPORT_MESSAGES: Vec<&'static str> = vec![
        "つらい気持ち、ちゃんと記録できていることが立派です。",
        "ストレスを感じたら、まず深呼吸。食べ物以外の癒しも探してみましょう。",
        "無理をしないで。気づけたこと自体が回復への一歩です。",
    ];

    static ref WARNING_MESSAGES: Vec<&'static str> = vec![
        "深夜の食事は脂肪になりやすい時間帯です。明日の朝ごはんを楽しみにしませんか？",
        "夜遅くの誘惑は手強いもの。温かい飲み物で気を紛らわせるのも手です。",
        "この時間の空腹は偽物のことが多いです。白湯を一杯どうぞ。",
    ];

    static ref ENCOURAGEMENT_MESSAGES: Vec<&'static str> = vec![
        "記録を続けていること自体が素晴らしい習慣です。",
        "小さな一歩の積み重ねが大きな変化になります。",
        "今日も記録できましたね。その継続が力になります。",
    ];
}

/// Fixed fallback used when a message pool is unexpectedly empty.
const POOL_FALLBACK_MESSAGE: &str = "記録ありがとうございます。一緒に続けていきましょう。";
/// Fixed fallback substituted for validation failures.
const INPUT_FALLBACK_MESSAGE: &str = "今日も一歩ずつ。記録を続けましょう！";

/// Keyword signals extracted from one input.
#[derive(Debug, Clone, Copy)]
struct Signals {
    has_positive_action: bool,
    has_time_context: bool,
    has_emotional_trigger: bool,
}

/// Stateless rule-based classifier with an injectable RNG.
pub struct FeedbackEngine {
    rng: Mutex<StdRng>,
    max_input_chars: usize,
}

impl Default for FeedbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackEngine {
    /// Engine with OS-seeded message selection.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
            max_input_chars: MAX_ENGINE_INPUT_CHARS,
        }
    }

    /// Deterministic engine for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            max_input_chars: MAX_ENGINE_INPUT_CHARS,
        }
    }

    /// Result substituted when validation fails.
    pub fn fallback() -> FeedbackResult {
        FeedbackResult {
            message: INPUT_FALLBACK_MESSAGE.to_string(),
            prevented_calories: 0,
            category: FeedbackCategory::Encouragement,
        }
    }

    /// Classify free text into a feedback category, message and calorie
    /// estimate.
    ///
    /// Category priority, first match wins: positive action → achievement,
    /// emotional trigger → support, time context → warning, otherwise
    /// encouragement. Only achievements carry a calorie estimate.
    pub fn classify(&self, text: &str) -> Result<FeedbackResult, InputError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(InputError::Empty);
        }
        if trimmed.chars().count() > self.max_input_chars {
            return Err(InputError::TooLong {
                max: self.max_input_chars,
            });
        }

        let lowered = trimmed.to_lowercase();
        let signals = Self::extract_signals(&lowered);
        let category = Self::decide_category(signals);

        let prevented_calories = if category == FeedbackCategory::Achievement {
            let mut kcal = calorie_table::estimate(&lowered, signals.has_time_context);
            if signals.has_time_context {
                kcal = apply_late_night_multiplier(kcal);
            }
            kcal
        } else {
            0
        };

        let message = self.pick_message(category, signals.has_time_context);

        Ok(FeedbackResult {
            message,
            prevented_calories,
            category,
        })
    }

    fn extract_signals(lowered: &str) -> Signals {
        Signals {
            has_positive_action: POSITIVE_ACTION.iter().any(|k| lowered.contains(k)),
            has_time_context: TIME_CONTEXT.iter().any(|k| lowered.contains(k)),
            has_emotional_trigger: EMOTIONAL_TRIGGER.iter().any(|k| lowered.contains(k)),
        }
    }

    fn decide_category(signals: Signals) -> FeedbackCategory {
        if signals.has_positive_action {
            FeedbackCategory::Achievement
        } else if signals.has_emotional_trigger {
            FeedbackCategory::Support
        } else if signals.has_time_context {
            FeedbackCategory::Warning
        } else {
            FeedbackCategory::Encouragement
        }
    }

    fn pick_message(&self, category: FeedbackCategory, late_night: bool) -> String {
        let pool: &[&str] = match category {
            FeedbackCategory::Achievement if late_night => {
                LATE_NIGHT_ACHIEVEMENT_MESSAGES.as_slice()
            }
            FeedbackCategory::Achievement => ACHIEVEMENT_MESSAGES.as_slice(),
            FeedbackCategory::Support => SUPPORT_MESSAGES.as_slice(),
            FeedbackCategory::Warning => WARNING_MESSAGES.as_slice(),
            FeedbackCategory::Encouragement => ENCOURAGEMENT_MESSAGES.as_slice(),
        };

        if pool.is_empty() {
            return POOL_FALLBACK_MESSAGE.to_string();
        }

        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let index = rng.random_range(0..pool.len());
        pool[index].to_string()
    }
}

/// `max(round(kcal * 1.5), 500)` for late-night inputs.
fn apply_late_night_multiplier(kcal: u32) -> u32 {
    let scaled = (kcal as f64 * LATE_NIGHT_MULTIPLIER).round() as u32;
    scaled.max(LATE_NIGHT_FLOOR_KCAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FeedbackEngine {
        FeedbackEngine::with_seed(7)
    }

    #[test]
    fn positive_action_yields_achievement_with_calories() {
        let result = engine().classify("アイスクリームを我慢しました").unwrap();
        assert_eq!(result.category, FeedbackCategory::Achievement);
        assert_eq!(result.prevented_calories, 250);
    }

    #[test]
    fn late_night_achievement_hits_the_floor() {
        // 250 * 1.5 = 375, floored up to 500
        let result = engine()
            .classify("深夜にアイスクリームを我慢しました")
            .unwrap();
        assert_eq!(result.category, FeedbackCategory::Achievement);
        assert_eq!(result.prevented_calories, 500);
    }

    #[test]
    fn specific_item_override_wins_over_generic_keyword() {
        let result = engine().classify("チョコレートケーキを我慢しました").unwrap();
        assert_eq!(result.category, FeedbackCategory::Achievement);
        assert_eq!(result.prevented_calories, 400);
    }

    #[test]
    fn late_night_multiplier_scales_above_the_floor() {
        // ピザ 600 * 1.5 = 900
        let result = engine().classify("夜中にピザを我慢した").unwrap();
        assert_eq!(result.prevented_calories, 900);
    }

    #[test]
    fn achievement_without_food_match_uses_default() {
        let result = engine().classify("間食を我慢した").unwrap();
        assert_eq!(result.category, FeedbackCategory::Achievement);
        assert_eq!(result.prevented_calories, calorie_table::DEFAULT_KCAL);
    }

    #[test]
    fn emotional_trigger_yields_support_without_calories() {
        let result = engine().classify("ストレスでお菓子を食べてしまった").unwrap();
        assert_eq!(result.category, FeedbackCategory::Support);
        assert_eq!(result.prevented_calories, 0);
    }

    #[test]
    fn positive_action_outranks_emotional_trigger() {
        let result = engine().classify("ストレスだったけどケーキを我慢した").unwrap();
        assert_eq!(result.category, FeedbackCategory::Achievement);
    }

    #[test]
    fn time_context_alone_yields_warning() {
        let result = engine().classify("深夜にラーメンを食べたくなっている").unwrap();
        assert_eq!(result.category, FeedbackCategory::Warning);
        assert_eq!(result.prevented_calories, 0);
    }

    #[test]
    fn no_keyword_yields_encouragement() {
        let result = engine().classify("今日の記録です").unwrap();
        assert_eq!(result.category, FeedbackCategory::Encouragement);
        assert_eq!(result.prevented_calories, 0);
    }

    #[test]
    fn empty_and_whitespace_fail_identically() {
        let engine = engine();
        assert_eq!(engine.classify("").unwrap_err(), InputError::Empty);
        assert_eq!(engine.classify("   \n\t ").unwrap_err(), InputError::Empty);
    }

    #[test]
    fn length_boundary_is_exact() {
        let engine = engine();
        let exactly = "あ".repeat(MAX_ENGINE_INPUT_CHARS);
        assert!(engine.classify(&exactly).is_ok());

        let over = "あ".repeat(MAX_ENGINE_INPUT_CHARS + 1);
        assert_eq!(
            engine.classify(&over).unwrap_err(),
            InputError::TooLong {
                max: MAX_ENGINE_INPUT_CHARS
            }
        );
    }

    #[test]
    fn seeded_engines_pick_the_same_message() {
        let a = FeedbackEngine::with_seed(42)
            .classify("ポテチを我慢した")
            .unwrap();
        let b = FeedbackEngine::with_seed(42)
            .classify("ポテチを我慢した")
            .unwrap();
        assert_eq!(a.message, b.message);
    }

    #[test]
    fn fallback_is_encouragement_with_zero_calories() {
        let fallback = FeedbackEngine::fallback();
        assert_eq!(fallback.category, FeedbackCategory::Encouragement);
        assert_eq!(fallback.prevented_calories, 0);
        assert!(!fallback.message.is_empty());
    }

    #[test]
    fn export_shape_matches_contract() {
        let result = engine().classify("ビールを我慢した").unwrap();
        let export = result.export(chrono::Utc::now());
        let value = serde_json::to_value(&export).unwrap();

        assert!(value.get("message").is_some());
        assert_eq!(value.get("kcal").unwrap().as_u64(), Some(150));
        assert_eq!(value.get("type").unwrap().as_str(), Some("achievement"));
        assert!(value.get("generatedAt").unwrap().as_str().is_some());
    }
}
