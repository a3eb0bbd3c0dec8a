//! Key/value persistence for the game aggregate.
//!
//! Each part of the state lives under its own key as a JSON blob. Reads never
//! fail: missing or undecodable blobs fall back to fresh defaults so a corrupt
//! save can't block startup.

use crate::catalog::Catalog;
use crate::config::atomic_rename;
use crate::error::StoreError;
use crate::model::{GameState, InventoryEntry, Pet, PlacedItem, Rules};
use crate::quiz::Quiz;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const PET_KEY: &str = "manul_data";
pub const INVENTORY_KEY: &str = "inventory_data";
pub const PLACED_ITEMS_KEY: &str = "placed_items_data";
pub const QUIZ_KEY: &str = "quiz_data";
pub const ONBOARDING_KEY: &str = "has_completed_onboarding";
pub const LAST_DECAY_KEY: &str = "last_decay_at";

pub trait Store {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&mut self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.contains_key(key)
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.get(key).cloned()
    }

    fn set(&mut self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.blobs.insert(key.to_string(), bytes);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.blobs.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key, replaced atomically on write.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.path_for(key)).ok()
    }

    fn set(&mut self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let io = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(io)?;
        atomic_rename(&tmp, &path).map_err(io)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

fn read<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Option<T> {
    let bytes = store.get(key)?;
    match serde_json::from_slice(&bytes) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("discarding undecodable {}: {}", key, e);
            None
        }
    }
}

fn write<T: Serialize>(store: &mut dyn Store, key: &'static str, value: &T) -> Result<(), StoreError> {
    let bytes =
        serde_json::to_vec(value).map_err(|source| StoreError::Encode { key, source })?;
    store.set(key, bytes)
}

pub fn load_state(
    store: &dyn Store,
    catalog: &Catalog,
    rules: &Rules,
    now: DateTime<Utc>,
) -> GameState {
    let mut state = GameState::new(now, catalog, rules);

    if let Some(pet) = read::<Pet>(store, PET_KEY) {
        state.pet = pet;
    }
    if let Some(inventory) = read::<Vec<InventoryEntry>>(store, INVENTORY_KEY) {
        state.inventory = inventory;
    }
    if let Some(placed) = read::<Vec<PlacedItem>>(store, PLACED_ITEMS_KEY) {
        state.placed_items = placed;
    }
    state.quiz = read::<Quiz>(store, QUIZ_KEY);
    if let Some(at) = read::<DateTime<Utc>>(store, LAST_DECAY_KEY) {
        state.last_decay = at;
    }

    state.onboarding = match read::<bool>(store, ONBOARDING_KEY) {
        Some(completed) => !completed,
        None => state.pet.name.is_empty(),
    };

    state
}

/// Writes every key, carrying on past failures. Returns the first error.
pub fn save_state(store: &mut dyn Store, state: &GameState) -> Result<(), StoreError> {
    let results = [
        write(store, PET_KEY, &state.pet),
        write(store, INVENTORY_KEY, &state.inventory),
        write(store, PLACED_ITEMS_KEY, &state.placed_items),
        match &state.quiz {
            Some(quiz) => write(store, QUIZ_KEY, quiz),
            None => store.remove(QUIZ_KEY),
        },
        write(store, ONBOARDING_KEY, &!state.onboarding),
        write(store, LAST_DECAY_KEY, &state.last_decay),
    ];
    results.into_iter().collect::<Result<Vec<()>, _>>().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
    }

    #[test]
    fn empty_store_yields_fresh_state() {
        let store = MemoryStore::new();
        let st = load_state(&store, &Catalog::builtin(), &Rules::default(), t0());
        assert!(st.onboarding);
        assert_eq!(st.inventory.len(), 2);
        assert!(st.placed_items.is_empty());
        assert!(st.quiz.is_none());
    }

    #[test]
    fn corrupt_blobs_fall_back_per_key() {
        let cat = Catalog::builtin();
        let rules = Rules::default();
        let mut store = MemoryStore::new();
        let mut st = GameState::new(t0(), &cat, &rules);
        st.pet.name = "Manny".to_string();
        st.onboarding = false;
        save_state(&mut store, &st).unwrap();
        store.set(INVENTORY_KEY, b"[oops".to_vec()).unwrap();

        let loaded = load_state(&store, &cat, &rules, t0());
        assert_eq!(loaded.pet, st.pet);
        assert_eq!(loaded.inventory, cat.starter_inventory());
        assert!(!loaded.onboarding);
    }

    #[test]
    fn save_then_load_preserves_state() {
        let cat = Catalog::builtin();
        let rules = Rules::default();
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("store"));

        let mut st = GameState::new(t0(), &cat, &rules);
        st.last_decay = t0() - chrono::Duration::minutes(45);
        st.pet.name = "Manny".to_string();
        st.pet.worn_items.insert("hat_beanie".to_string());
        st.placed_items.push(PlacedItem {
            item_id: "decoration_plant".to_string(),
            position: Position::new(1.5, 2.5),
        });
        st.quiz = Some(Quiz::generate_weekly(t0()));
        st.onboarding = false;
        save_state(&mut store, &st).unwrap();

        assert!(dir.path().join("store").join("manul_data.json").exists());

        let loaded = load_state(&store, &cat, &rules, t0());
        assert_eq!(loaded.pet, st.pet);
        assert_eq!(loaded.placed_items, st.placed_items);
        assert_eq!(loaded.quiz, st.quiz);
        assert_eq!(loaded.last_decay, st.last_decay);
        assert!(!loaded.onboarding);
    }

    #[test]
    fn clearing_quiz_removes_key() {
        let cat = Catalog::builtin();
        let rules = Rules::default();
        let mut store = MemoryStore::new();
        let mut st = GameState::new(t0(), &cat, &rules);
        st.quiz = Some(Quiz::generate_weekly(t0()));
        save_state(&mut store, &st).unwrap();
        assert!(store.contains(QUIZ_KEY));

        st.quiz = None;
        save_state(&mut store, &st).unwrap();
        assert!(!store.contains(QUIZ_KEY));
    }

    #[test]
    fn named_pet_without_flag_is_not_onboarding() {
        let cat = Catalog::builtin();
        let rules = Rules::default();
        let mut store = MemoryStore::new();
        let mut pet = Pet::new_default(t0(), &rules);
        pet.name = "Manny".to_string();
        store.set(PET_KEY, serde_json::to_vec(&pet).unwrap()).unwrap();
        let st = load_state(&store, &cat, &rules, t0());
        assert!(!st.onboarding);
    }

    #[test]
    fn file_store_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        assert!(store.remove("nothing_here").is_ok());
        assert!(store.get("nothing_here").is_none());
    }
}
