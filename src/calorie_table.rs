//! Keyword-to-calorie lookup tables
//!
//! Food categories are tested in declaration order and the first category
//! whose keyword list intersects the input wins. Inside a category the
//! per-item overrides are likewise ordered, so a specific item keyword
//! (ケーキ) beats a generic category keyword (チョコ) appearing in the
//! same input.

/// Flat default when no food category matches.
pub const DEFAULT_KCAL: u32 = 150;
/// Default when no category matches but the input carries a late-night cue.
pub const LATE_NIGHT_DEFAULT_KCAL: u32 = 500;

struct FoodCategory {
    /// Keywords establishing category membership
    keywords: &'static [&'static str],
    /// Ordered specific-item overrides, first match wins
    overrides: &'static [(&'static str, u32)],
    /// Category base value when no override matches
    base_kcal: u32,
}

const FOOD_CATEGORIES: &[FoodCategory] = &[
    // Sweets
    FoodCategory {
        keywords: &[
            "チョコ", "ケーキ", "アイス", "クッキー", "プリン", "ドーナツ", "和菓子", "スイーツ",
            "chocolate", "cake", "ice cream", "cookie", "donut",
        ],
        overrides: &[
            ("ケーキ", 400),
            ("cake", 400),
            ("ドーナツ", 350),
            ("donut", 350),
            ("アイス", 250),
            ("ice cream", 250),
            ("クッキー", 200),
            ("cookie", 200),
            ("プリン", 180),
        ],
        base_kcal: 300,
    },
    // Snacks
    FoodCategory {
        keywords: &["ポテチ", "ポテトチップス", "スナック", "せんべい", "chips", "snack"],
        overrides: &[("ポテチ", 450), ("ポテトチップス", 450), ("chips", 450)],
        base_kcal: 350,
    },
    // Drinks
    FoodCategory {
        keywords: &["ジュース", "コーラ", "甘い飲み物", "ミルクティー", "juice", "cola", "soda"],
        overrides: &[("コーラ", 140), ("cola", 140), ("ミルクティー", 200)],
        base_kcal: 150,
    },
    // Fast food
    FoodCategory {
        keywords: &[
            "ハンバーガー", "ピザ", "ファストフード", "ラーメン", "burger", "pizza", "ramen",
        ],
        overrides: &[
            ("ピザ", 600),
            ("pizza", 600),
            ("ラーメン", 550),
            ("ramen", 550),
        ],
        base_kcal: 500,
    },
    // Fried food
    FoodCategory {
        keywords: &["揚げ物", "唐揚げ", "フライ", "天ぷら", "fried"],
        overrides: &[("唐揚げ", 300), ("天ぷら", 350)],
        base_kcal: 400,
    },
    // Alcohol
    FoodCategory {
        keywords: &["ビール", "お酒", "ワイン", "酎ハイ", "beer", "wine"],
        overrides: &[("ビール", 150), ("beer", 150), ("ワイン", 120), ("wine", 120)],
        base_kcal: 200,
    },
];

/// Estimate the calories referenced by lowercased input text.
pub fn estimate(lowered: &str, has_time_context: bool) -> u32 {
    for category in FOOD_CATEGORIES {
        if category.keywords.iter().any(|k| lowered.contains(k)) {
            for (keyword, kcal) in category.overrides {
                if lowered.contains(keyword) {
                    return *kcal;
                }
            }
            return category.base_kcal;
        }
    }

    if has_time_context {
        LATE_NIGHT_DEFAULT_KCAL
    } else {
        DEFAULT_KCAL
    }
}
