use crate::catalog::Catalog;
use crate::quiz::Quiz;
use chrono::{DateTime, Duration as ChronoDuration, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Neutral,
    Sad,
    Unhappy,
}

impl Mood {
    pub fn label(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Neutral => "neutral",
            Mood::Sad => "sad",
            Mood::Unhappy => "unhappy",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Pet {
    pub id: Uuid,
    pub name: String,
    pub level: u32,
    pub xp: u32,
    pub hunger: f64,
    pub hygiene: f64,
    pub happiness: f64,
    pub coins: u32,
    pub last_fed: DateTime<Utc>,
    pub last_cleaned: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
    #[serde(default)]
    pub worn_items: BTreeSet<String>,
}

impl Pet {
    pub fn new_default(now: DateTime<Utc>, rules: &Rules) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            level: 1,
            xp: 0,
            hunger: 0.8,
            hygiene: 1.0,
            happiness: 0.9,
            coins: rules.starting_coins,
            last_fed: now,
            last_cleaned: now,
            last_interaction: now,
            worn_items: BTreeSet::new(),
        }
    }

    /// Derived from the average of the three care stats; never stored.
    pub fn mood(&self) -> Mood {
        let avg = (self.hunger + self.hygiene + self.happiness) / 3.0;
        if avg >= 0.8 {
            Mood::Happy
        } else if avg >= 0.5 {
            Mood::Neutral
        } else if avg >= 0.2 {
            Mood::Sad
        } else {
            Mood::Unhappy
        }
    }

    /// Name used in feedback messages before onboarding has named the pet.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Your manul"
        } else {
            &self.name
        }
    }
}

pub(crate) fn clamp_stat(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

pub(crate) fn advance(ts: &mut DateTime<Utc>, now: DateTime<Utc>) {
    if now > *ts {
        *ts = now;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryEntry {
    pub item_id: String,
    pub purchased: bool,
    #[serde(default)]
    pub quantity: u32,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlacedItem {
    pub item_id: String,
    pub position: Position,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Coins,
    Xp,
    LevelUp,
    Item,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Reward {
    pub kind: RewardKind,
    pub amount: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Feed,
    Clean,
    Play,
    PurchaseSuccess,
    PurchaseFailed,
    Info,
    LevelUp,
    QuizCompleted,
    PlaceItem,
    RemoveItem,
    OnboardingComplete,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub message: String,
    pub kind: FeedbackKind,
    pub shown_at: DateTime<Utc>,
    pub dismiss_at: DateTime<Utc>,
}

impl Feedback {
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        now < self.dismiss_at
    }
}

/// Every tunable the engine uses. Partial overrides in the settings file
/// fall back to these defaults field by field.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub hunger_decay_per_hour: f64,
    pub hygiene_decay_per_hour: f64,
    pub happiness_decay_per_hour: f64,
    pub feed_xp: u32,
    pub clean_xp: u32,
    pub play_xp: u32,
    pub play_happiness: f64,
    pub place_happiness: f64,
    pub xp_per_level: u32,
    pub level_up_coins_per_level: u32,
    pub quiz_base_coins: u32,
    pub quiz_coins_per_correct: u32,
    pub quiz_base_xp: u32,
    pub quiz_xp_per_correct: u32,
    pub quiz_weekday: Weekday,
    pub starting_coins: u32,
    pub feedback_ms: i64,
    pub decay_interval_secs: i64, // 30 min typical
    pub save_interval_secs: i64,  // 5 min typical
    pub save_on_change: bool,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            hunger_decay_per_hour: 0.01,
            hygiene_decay_per_hour: 0.008,
            happiness_decay_per_hour: 0.006,
            feed_xp: 5,
            clean_xp: 5,
            play_xp: 10,
            play_happiness: 0.3,
            place_happiness: 0.05,
            xp_per_level: 100,
            level_up_coins_per_level: 50,
            quiz_base_coins: 50,
            quiz_coins_per_correct: 15,
            quiz_base_xp: 25,
            quiz_xp_per_correct: 10,
            quiz_weekday: Weekday::Mon,
            starting_coins: 100,
            feedback_ms: 2500,
            decay_interval_secs: 30 * 60,
            save_interval_secs: 5 * 60,
            save_on_change: true,
        }
    }
}

impl Rules {
    pub fn required_xp(&self, level: u32) -> u32 {
        level.saturating_mul(self.xp_per_level)
    }
}

/// The aggregate the engine owns. Persisted piecewise, one key per field
/// group; `feedback` and `rewards` are transient.
#[derive(Clone, Debug)]
pub struct GameState {
    pub pet: Pet,
    pub inventory: Vec<InventoryEntry>,
    pub placed_items: Vec<PlacedItem>,
    pub quiz: Option<Quiz>,
    pub onboarding: bool,
    /// When decay last ran; drives the decay schedule across restarts.
    pub last_decay: DateTime<Utc>,
    pub feedback: Option<Feedback>,
    pub rewards: Vec<Reward>,
}

impl GameState {
    pub fn new(now: DateTime<Utc>, catalog: &Catalog, rules: &Rules) -> Self {
        Self {
            pet: Pet::new_default(now, rules),
            inventory: catalog.starter_inventory(),
            placed_items: Vec::new(),
            quiz: None,
            onboarding: true,
            last_decay: now,
            feedback: None,
            rewards: Vec::new(),
        }
    }

    pub(crate) fn notify(
        &mut self,
        kind: FeedbackKind,
        message: String,
        now: DateTime<Utc>,
        rules: &Rules,
    ) {
        self.feedback = Some(Feedback {
            message,
            kind,
            shown_at: now,
            dismiss_at: now + ChronoDuration::milliseconds(rules.feedback_ms.max(0)),
        });
    }

    pub(crate) fn push_reward(&mut self, kind: RewardKind, amount: u32, now: DateTime<Utc>) {
        self.rewards.push(Reward {
            kind,
            amount,
            timestamp: now,
        });
    }

    pub fn clear_rewards(&mut self) {
        self.rewards.clear();
    }

    /// Drops the feedback once its deadline has passed. Returns true if it did.
    pub fn dismiss_expired_feedback(&mut self, now: DateTime<Utc>) -> bool {
        match &self.feedback {
            Some(f) if !f.is_visible(now) => {
                self.feedback = None;
                true
            }
            _ => false,
        }
    }

    pub fn complete_onboarding(&mut self, name: &str, now: DateTime<Utc>, rules: &Rules) -> bool {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.pet.name = trimmed.to_string();
        self.onboarding = false;
        self.notify(
            FeedbackKind::OnboardingComplete,
            format!("Welcome to Manul Manor, {}!", trimmed),
            now,
            rules,
        );
        true
    }
}
