use crate::catalog::{food_effect, FoodTier, Item, BASIC_FOOD_EFFECT};
use crate::model::{advance, clamp_stat, FeedbackKind, GameState, Position, RewardKind, Rules};
use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerAction {
    Feed(Option<String>),
    Clean,
    Play,
    Purchase(String),
    Place(String, Position),
    Remove(String),
    Wear(String),
    Unwear(String),
    Answer { question: usize, option: usize },
    CheckQuiz,
    ClearRewards,
    Adopt(String),
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let ms = (to - from).num_milliseconds().max(0);
    ms as f64 / 3_600_000.0
}

impl GameState {
    /// Feeds the pet. `None` means the free basic food. Returns false (and
    /// changes nothing) when a paid food has run out.
    pub fn feed(&mut self, food: Option<&Item>, now: DateTime<Utc>, rules: &Rules) -> bool {
        let (effect, food_name) = match food {
            None => (BASIC_FOOD_EFFECT, "Grasshoppers".to_string()),
            Some(item) => {
                if !item.is_basic_food() && !self.consume(item) {
                    return false;
                }
                (food_effect(&item.id), item.name.clone())
            }
        };

        self.pet.hunger = clamp_stat(self.pet.hunger + effect.hunger);
        self.pet.happiness = clamp_stat(self.pet.happiness + effect.happiness);
        advance(&mut self.pet.last_fed, now);

        let name = self.pet.display_name().to_string();
        let message = match effect.tier {
            FoodTier::Super => format!("{} is ecstatic about the {}!", name, food_name),
            FoodTier::Premium => format!("{} absolutely loves the {}!", name, food_name),
            FoodTier::Good => format!("Yum! {} really enjoys the {}!", name, food_name),
            FoodTier::Basic if self.pet.hunger >= 0.9 => format!("{} is full!", name),
            FoodTier::Basic => format!("{} eats the {}", name, food_name),
        };
        self.notify(FeedbackKind::Feed, message, now, rules);

        self.add_xp(rules.feed_xp, now, rules);
        true
    }

    pub fn clean(&mut self, now: DateTime<Utc>, rules: &Rules) {
        let previous = self.pet.hygiene;
        self.pet.hygiene = 1.0;
        advance(&mut self.pet.last_cleaned, now);

        let name = self.pet.display_name().to_string();
        let message = if 1.0 - previous > 0.3 {
            format!("{} feels fresh and clean!", name)
        } else if previous > 0.8 {
            format!("{} was already quite clean", name)
        } else {
            format!("{} is now clean and happy", name)
        };
        self.notify(FeedbackKind::Clean, message, now, rules);

        self.add_xp(rules.clean_xp, now, rules);
    }

    pub fn play(&mut self, now: DateTime<Utc>, rules: &Rules) {
        let previous = self.pet.happiness;
        self.pet.happiness = clamp_stat(self.pet.happiness + rules.play_happiness);
        advance(&mut self.pet.last_interaction, now);

        let name = self.pet.display_name().to_string();
        let message = if self.pet.happiness - previous > 0.25 {
            format!("{} is having so much fun!", name)
        } else if self.pet.happiness >= 0.9 {
            format!("{} is very happy!", name)
        } else {
            format!("{} enjoyed playing with you", name)
        };
        self.notify(FeedbackKind::Play, message, now, rules);

        self.add_xp(rules.play_xp, now, rules);
    }

    /// One decay step. The amount removed depends only on the hours elapsed
    /// since the matching care timestamp, which decay itself never moves.
    pub fn decay_tick(&mut self, now: DateTime<Utc>, rules: &Rules) {
        let p = &mut self.pet;

        let hunger_decay =
            p.hunger.min(hours_between(p.last_fed, now) * rules.hunger_decay_per_hour);
        let hygiene_decay =
            p.hygiene.min(hours_between(p.last_cleaned, now) * rules.hygiene_decay_per_hour);
        let happiness_decay = p
            .happiness
            .min(hours_between(p.last_interaction, now) * rules.happiness_decay_per_hour);

        p.hunger = clamp_stat(p.hunger - hunger_decay);
        p.hygiene = clamp_stat(p.hygiene - hygiene_decay);
        p.happiness = clamp_stat(p.happiness - happiness_decay);

        advance(&mut self.last_decay, now);
    }

    /// Grants XP and resolves every level-up it causes.
    pub fn add_xp(&mut self, amount: u32, now: DateTime<Utc>, rules: &Rules) {
        self.pet.xp = self.pet.xp.saturating_add(amount);

        loop {
            let needed = rules.required_xp(self.pet.level);
            if needed == 0 || self.pet.xp < needed {
                break;
            }
            self.pet.xp -= needed;
            self.pet.level += 1;

            let bonus = rules
                .level_up_coins_per_level
                .saturating_mul(self.pet.level);
            self.pet.coins = self.pet.coins.saturating_add(bonus);

            self.push_reward(RewardKind::LevelUp, self.pet.level, now);
            self.push_reward(RewardKind::Coins, bonus, now);

            let message = format!(
                "Level Up! {} is now level {}. Earned {} coins!",
                self.pet.display_name(),
                self.pet.level,
                bonus
            );
            self.notify(FeedbackKind::LevelUp, message, now, rules);
        }
    }
}
