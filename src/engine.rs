//! The service object UIs talk to.
//!
//! `Engine` owns the game aggregate together with its collaborators (store,
//! clock, catalog) and wraps every rule in `sim`, `inventory` and `quiz` with
//! the same epilogue: publish what changed, then persist.

use crate::catalog::{Catalog, Item};
use crate::clock::Clock;
use crate::error::StoreError;
use crate::events::{Change, EngineEvent, EventBus};
use crate::inventory::{PurchaseOutcome, ShopStatus};
use crate::model::{
    Feedback, GameState, InventoryEntry, Mood, Pet, PlacedItem, Position, Reward, RewardKind,
    Rules,
};
use crate::quiz::{Quiz, QuizError};
use crate::sim::PlayerAction;
use crate::storage::{load_state, save_state, Store};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// Read-only view handed to observers.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub pet: Pet,
    pub mood: Mood,
    pub inventory: Vec<InventoryEntry>,
    pub placed_items: Vec<PlacedItem>,
    pub quiz: Option<Quiz>,
    pub feedback: Option<Feedback>,
    pub rewards: Vec<Reward>,
    pub onboarding: bool,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq)]
pub enum Outcome {
    Applied,
    Ignored,
    Purchase(PurchaseOutcome),
    Answer(Result<bool, QuizError>),
}

/// Periodic work, due times only. Whoever owns the engine calls
/// [`Engine::pump`]; stopping the schedule means no longer calling it.
#[derive(Clone, Debug)]
pub struct Schedule {
    decay_every: ChronoDuration,
    save_every: ChronoDuration,
    next_decay: DateTime<Utc>,
    next_save: DateTime<Utc>,
}

impl Schedule {
    pub fn new(now: DateTime<Utc>, last_decay: DateTime<Utc>, rules: &Rules) -> Self {
        let decay_every = ChronoDuration::seconds(rules.decay_interval_secs.max(1));
        let save_every = ChronoDuration::seconds(rules.save_interval_secs.max(1));
        Self {
            decay_every,
            save_every,
            next_decay: last_decay.min(now) + decay_every,
            next_save: now + save_every,
        }
    }

    pub fn next_decay(&self) -> DateTime<Utc> {
        self.next_decay
    }

    pub fn next_save(&self) -> DateTime<Utc> {
        self.next_save
    }

    /// Missed periods collapse into one run; decay is a function of elapsed
    /// time, not of how many ticks fired.
    fn take_decay(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.next_decay {
            return false;
        }
        self.next_decay = now + self.decay_every;
        true
    }

    fn take_save(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.next_save {
            return false;
        }
        self.next_save = now + self.save_every;
        true
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpReport {
    pub decayed: bool,
    pub new_quiz: bool,
    pub feedback_cleared: bool,
    pub saved: bool,
}

struct Mark {
    feedback: Option<Feedback>,
    rewards: usize,
}

pub struct Engine<S: Store, C: Clock> {
    state: GameState,
    catalog: Arc<Catalog>,
    rules: Rules,
    store: S,
    clock: C,
    bus: EventBus,
    schedule: Schedule,
}

impl<S: Store, C: Clock> Engine<S, C> {
    pub fn load(store: S, clock: C, catalog: Arc<Catalog>, rules: Rules) -> Self {
        let now = clock.now();
        let state = load_state(&store, &catalog, &rules, now);
        tracing::info!(
            pet = %state.pet.id,
            level = state.pet.level,
            onboarding = state.onboarding,
            "loaded game state"
        );

        let schedule = Schedule::new(now, state.last_decay, &rules);
        let mut engine = Self {
            state,
            catalog,
            rules,
            store,
            clock,
            bus: EventBus::new(),
            schedule,
        };
        if engine.check_weekly() {
            tracing::info!("generated weekly quiz at startup");
        }
        engine
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        self.bus.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        let now = self.clock.now();
        Snapshot {
            pet: self.state.pet.clone(),
            mood: self.state.pet.mood(),
            inventory: self.state.inventory.clone(),
            placed_items: self.state.placed_items.clone(),
            quiz: self.state.quiz.clone(),
            feedback: self
                .state
                .feedback
                .clone()
                .filter(|f| f.is_visible(now)),
            rewards: self.state.rewards.clone(),
            onboarding: self.state.onboarding,
            taken_at: now,
        }
    }

    fn mark(&self) -> Mark {
        Mark {
            feedback: self.state.feedback.clone(),
            rewards: self.state.rewards.len(),
        }
    }

    fn commit(&mut self, mark: Mark, changes: &[Change]) {
        for change in changes {
            self.bus.publish(EngineEvent::StateChanged(*change));
        }
        if self.state.feedback != mark.feedback {
            if let Some(f) = self.state.feedback.clone() {
                tracing::debug!(kind = ?f.kind, "{}", f.message);
                self.bus.publish(EngineEvent::Feedback(f));
            }
        }
        if self.state.rewards.len() > mark.rewards {
            self.bus.publish(EngineEvent::StateChanged(Change::Rewards));
            for reward in self.state.rewards[mark.rewards..].to_vec() {
                self.bus.publish(EngineEvent::Reward(reward));
            }
        }
        if self.rules.save_on_change {
            self.persist();
        }
    }

    fn persist(&mut self) {
        if let Err(e) = save_state(&mut self.store, &self.state) {
            tracing::warn!("save failed: {}", e);
        }
    }

    /// Saves unconditionally, surfacing the error.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        save_state(&mut self.store, &self.state)
    }

    fn with_item<R>(&mut self, id: &str, f: impl FnOnce(&mut Self, &Item) -> R) -> Option<R> {
        let catalog = Arc::clone(&self.catalog);
        let Some(item) = catalog.get(id) else {
            tracing::debug!("unknown item id {}", id);
            return None;
        };
        Some(f(self, item))
    }

    /// Unknown ids are served as the basic food.
    pub fn feed(&mut self, food_id: Option<&str>) -> bool {
        let now = self.clock.now();
        let mark = self.mark();
        let catalog = Arc::clone(&self.catalog);
        let food: Option<&Item> = match food_id {
            Some(id) => {
                let found = catalog.get(id);
                if found.is_none() {
                    tracing::debug!("unknown food {}, serving basic food", id);
                }
                found
            }
            None => None,
        };

        let fed = self.state.feed(food, now, &self.rules);
        if fed {
            self.commit(mark, &[Change::Pet, Change::Inventory]);
        } else {
            tracing::debug!("feed skipped, {} is out of stock", food_id.unwrap_or("food"));
        }
        fed
    }

    pub fn clean(&mut self) {
        let now = self.clock.now();
        let mark = self.mark();
        self.state.clean(now, &self.rules);
        self.commit(mark, &[Change::Pet]);
    }

    pub fn play(&mut self) {
        let now = self.clock.now();
        let mark = self.mark();
        self.state.play(now, &self.rules);
        self.commit(mark, &[Change::Pet]);
    }

    pub fn decay_tick(&mut self) {
        let now = self.clock.now();
        let mark = self.mark();
        self.state.decay_tick(now, &self.rules);
        tracing::debug!(
            hunger = self.state.pet.hunger,
            hygiene = self.state.pet.hygiene,
            happiness = self.state.pet.happiness,
            "decay tick"
        );
        self.commit(mark, &[Change::Pet]);
    }

    pub fn add_xp(&mut self, amount: u32) {
        let now = self.clock.now();
        let mark = self.mark();
        self.state.add_xp(amount, now, &self.rules);
        self.commit(mark, &[Change::Pet]);
    }

    pub fn clear_rewards(&mut self) {
        if self.state.rewards.is_empty() {
            return;
        }
        self.state.clear_rewards();
        self.bus.publish(EngineEvent::StateChanged(Change::Rewards));
    }

    pub fn complete_onboarding(&mut self, name: &str) -> bool {
        let now = self.clock.now();
        let mark = self.mark();
        let done = self.state.complete_onboarding(name, now, &self.rules);
        if done {
            tracing::info!("adopted {}", self.state.pet.name);
            self.commit(mark, &[Change::Pet, Change::Onboarding]);
        }
        done
    }

    pub fn purchase(&mut self, item_id: &str) -> Option<PurchaseOutcome> {
        self.with_item(item_id, |e, item| {
            let now = e.clock.now();
            let mark = e.mark();
            let outcome = e.state.purchase(item, now, &e.rules);
            tracing::info!(item = %item.id, ?outcome, coins = e.state.pet.coins, "purchase");
            if outcome == PurchaseOutcome::Purchased {
                e.commit(mark, &[Change::Pet, Change::Inventory]);
            } else {
                e.commit(mark, &[]);
            }
            outcome
        })
    }

    pub fn consume(&mut self, item_id: &str) -> bool {
        self.with_item(item_id, |e, item| {
            let mark = e.mark();
            let used = e.state.consume(item);
            if used {
                e.commit(mark, &[Change::Inventory]);
            }
            used
        })
        .unwrap_or(false)
    }

    pub fn add_items(&mut self, item_id: &str, quantity: u32) -> bool {
        self.with_item(item_id, |e, item| {
            if !item.is_consumable() || quantity == 0 {
                return false;
            }
            let now = e.clock.now();
            let mark = e.mark();
            e.state.add_items(item, quantity);
            e.state.push_reward(RewardKind::Item, quantity, now);
            e.commit(mark, &[Change::Inventory]);
            true
        })
        .unwrap_or(false)
    }

    pub fn quantity(&self, item_id: &str) -> u32 {
        self.state.quantity(item_id)
    }

    pub fn can_use(&self, item_id: &str) -> bool {
        self.catalog
            .get(item_id)
            .map(|item| self.state.can_use(item))
            .unwrap_or(false)
    }

    pub fn shop(&self) -> Vec<(&Item, ShopStatus)> {
        self.catalog
            .items()
            .iter()
            .map(|item| (item, self.state.shop_status(item)))
            .collect()
    }

    pub fn place(&mut self, item_id: &str, position: Position) -> bool {
        self.with_item(item_id, |e, item| {
            let now = e.clock.now();
            let mark = e.mark();
            let placed = e.state.place(item, position, now, &e.rules);
            if placed {
                e.commit(mark, &[Change::Placement, Change::Pet]);
            }
            placed
        })
        .unwrap_or(false)
    }

    pub fn remove_placed(&mut self, item_id: &str) -> bool {
        self.with_item(item_id, |e, item| {
            let now = e.clock.now();
            let mark = e.mark();
            let removed = e.state.remove_placed(item, now, &e.rules);
            if removed {
                e.commit(mark, &[Change::Placement]);
            }
            removed
        })
        .unwrap_or(false)
    }

    pub fn wear(&mut self, item_id: &str) -> bool {
        self.with_item(item_id, |e, item| {
            let mark = e.mark();
            let catalog = Arc::clone(&e.catalog);
            let worn = e.state.wear(item, &catalog);
            if worn {
                e.commit(mark, &[Change::Pet]);
            }
            worn
        })
        .unwrap_or(false)
    }

    pub fn unwear(&mut self, item_id: &str) -> bool {
        self.with_item(item_id, |e, item| {
            let mark = e.mark();
            let removed = e.state.unwear(item);
            if removed {
                e.commit(mark, &[Change::Pet]);
            }
            removed
        })
        .unwrap_or(false)
    }

    pub fn check_weekly(&mut self) -> bool {
        let now = self.clock.now();
        let today = self.clock.weekday(now);
        let mark = self.mark();
        let generated = self.state.check_weekly(now, today, &self.rules);
        if generated {
            tracing::info!("new weekly quiz");
            self.commit(mark, &[Change::Quiz]);
        }
        generated
    }

    pub fn submit_answer(&mut self, question: usize, option: usize) -> Result<bool, QuizError> {
        let now = self.clock.now();
        let mark = self.mark();
        let result = self.state.submit_answer(question, option, now, &self.rules);
        match &result {
            Ok(correct) => {
                tracing::debug!(question, option, correct, "quiz answer");
                self.commit(mark, &[Change::Quiz, Change::Pet]);
            }
            Err(e) => tracing::debug!("answer rejected: {}", e),
        }
        result
    }

    pub fn apply(&mut self, action: PlayerAction) -> Outcome {
        fn applied(b: bool) -> Outcome {
            if b {
                Outcome::Applied
            } else {
                Outcome::Ignored
            }
        }

        match action {
            PlayerAction::Feed(food) => applied(self.feed(food.as_deref())),
            PlayerAction::Clean => {
                self.clean();
                Outcome::Applied
            }
            PlayerAction::Play => {
                self.play();
                Outcome::Applied
            }
            PlayerAction::Purchase(id) => match self.purchase(&id) {
                Some(outcome) => Outcome::Purchase(outcome),
                None => Outcome::Ignored,
            },
            PlayerAction::Place(id, pos) => applied(self.place(&id, pos)),
            PlayerAction::Remove(id) => applied(self.remove_placed(&id)),
            PlayerAction::Wear(id) => applied(self.wear(&id)),
            PlayerAction::Unwear(id) => applied(self.unwear(&id)),
            PlayerAction::Answer { question, option } => {
                Outcome::Answer(self.submit_answer(question, option))
            }
            PlayerAction::CheckQuiz => applied(self.check_weekly()),
            PlayerAction::ClearRewards => {
                self.clear_rewards();
                Outcome::Applied
            }
            PlayerAction::Adopt(name) => applied(self.complete_onboarding(&name)),
        }
    }

    /// Runs whatever periodic work is due at the clock's current time.
    pub fn pump(&mut self) -> PumpReport {
        let now = self.clock.now();
        let mut report = PumpReport::default();

        if self.schedule.take_decay(now) {
            self.decay_tick();
            report.decayed = true;
        }

        report.new_quiz = self.check_weekly();

        if self.state.dismiss_expired_feedback(now) {
            self.bus.publish(EngineEvent::StateChanged(Change::Feedback));
            report.feedback_cleared = true;
        }

        if self.schedule.take_save(now) {
            self.persist();
            report.saved = true;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::{MemoryStore, PET_KEY};
    use chrono::TimeZone;

    // A Tuesday, so no quiz appears unless a test asks for one.
    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap()
    }

    fn engine() -> (Engine<MemoryStore, FixedClock>, FixedClock) {
        let clock = FixedClock::new(t0());
        let e = Engine::load(
            MemoryStore::new(),
            clock.clone(),
            Arc::new(Catalog::builtin()),
            Rules::default(),
        );
        (e, clock)
    }

    #[test]
    fn mutations_publish_and_persist() {
        let (mut e, _) = engine();
        let rx = e.subscribe();
        e.play();
        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert!(events.contains(&EngineEvent::StateChanged(Change::Pet)));
        assert!(events
            .iter()
            .any(|ev| matches!(ev, EngineEvent::Feedback(_))));
        assert!(e.store().contains(PET_KEY));
    }

    #[test]
    fn ignored_operations_publish_nothing() {
        let (mut e, _) = engine();
        let rx = e.subscribe();
        assert!(!e.feed(Some("food_pika")));
        assert!(!e.wear("toy_ball"));
        assert!(!e.place("nonexistent", Position::default()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unknown_food_is_basic_food() {
        let (mut e, _) = engine();
        let hunger = e.state().pet.hunger;
        assert!(e.feed(Some("food_unicorn")));
        assert!((e.state().pet.hunger - (hunger + 0.2).min(1.0)).abs() < 1e-9);
    }

    #[test]
    fn unowned_items_cannot_be_worn_or_placed() {
        let (mut e, _) = engine();
        let rx = e.subscribe();
        assert!(!e.wear("hat_beanie"));
        assert!(!e.place("furniture_bed", Position::new(1.0, 1.0)));
        assert!(!e.remove_placed("furniture_bed"));
        assert!(e.state().pet.worn_items.is_empty());
        assert!(e.state().placed_items.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn rejected_purchase_emits_feedback_only() {
        let (mut e, _) = engine();
        let rx = e.subscribe();
        assert_eq!(
            e.purchase("furniture_bed"),
            Some(PurchaseOutcome::LevelLocked)
        );
        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], EngineEvent::Feedback(_)));
        assert_eq!(e.purchase("no_such_item"), None);
    }

    #[test]
    fn level_up_publishes_rewards() {
        let (mut e, _) = engine();
        let rx = e.subscribe();
        e.add_xp(100);
        let rewards: Vec<Reward> = rx
            .try_iter()
            .filter_map(|ev| match ev {
                EngineEvent::Reward(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(rewards.len(), 2);
        assert_eq!(rewards[0].kind, RewardKind::LevelUp);
        assert_eq!(rewards[1].amount, 100);

        e.clear_rewards();
        assert!(e.snapshot().rewards.is_empty());
    }

    #[test]
    fn add_items_records_item_reward() {
        let (mut e, _) = engine();
        assert!(e.add_items("food_fish", 3));
        assert_eq!(e.quantity("food_fish"), 3);
        assert!(e.can_use("food_fish"));
        assert_eq!(e.state().rewards.last().map(|r| r.kind), Some(RewardKind::Item));
        assert!(!e.add_items("hat_beanie", 1));
    }

    #[test]
    fn pump_runs_due_work_only() {
        let (mut e, clock) = engine();
        e.play();
        assert_eq!(e.pump(), PumpReport::default());

        clock.advance(ChronoDuration::seconds(3));
        let report = e.pump();
        assert!(report.feedback_cleared);
        assert!(!report.decayed);

        clock.advance(ChronoDuration::minutes(30));
        let report = e.pump();
        assert!(report.decayed);
        assert!(report.saved);
        assert!(e.state().pet.happiness < 1.0 || e.state().pet.hunger < 0.8);
    }

    #[test]
    fn pump_generates_quiz_on_monday() {
        let (mut e, clock) = engine();
        assert!(e.state().quiz.is_none());
        clock.advance(ChronoDuration::days(6));
        let report = e.pump();
        assert!(report.new_quiz);
        assert!(e.state().quiz.is_some());
    }

    #[test]
    fn snapshot_hides_expired_feedback() {
        let (mut e, clock) = engine();
        e.clean();
        assert!(e.snapshot().feedback.is_some());
        clock.advance(ChronoDuration::seconds(5));
        assert!(e.snapshot().feedback.is_none());
    }

    #[test]
    fn apply_dispatches_actions() {
        let (mut e, _) = engine();
        assert_eq!(e.apply(PlayerAction::Adopt("Manny".to_string())), Outcome::Applied);
        assert_eq!(e.state().pet.name, "Manny");
        assert_eq!(
            e.apply(PlayerAction::Purchase("food_pika".to_string())),
            Outcome::Purchase(PurchaseOutcome::Purchased)
        );
        assert_eq!(
            e.apply(PlayerAction::Answer { question: 0, option: 0 }),
            Outcome::Answer(Err(QuizError::NoActiveQuiz))
        );
        assert_eq!(e.apply(PlayerAction::Wear("toy_ball".to_string())), Outcome::Ignored);
    }

    #[test]
    fn save_on_change_can_be_disabled() {
        let clock = FixedClock::new(t0());
        let rules = Rules {
            save_on_change: false,
            ..Rules::default()
        };
        let mut e = Engine::load(
            MemoryStore::new(),
            clock,
            Arc::new(Catalog::builtin()),
            rules,
        );
        e.play();
        assert!(!e.store().contains(PET_KEY));
        e.flush().unwrap();
        assert!(e.store().contains(PET_KEY));
    }
}
