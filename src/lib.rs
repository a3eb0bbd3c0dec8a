//! Manul Manor: a virtual Pallas's cat engine.
//!
//! [`engine::Engine`] is the entry point for front ends. The game rules live
//! as `GameState` methods spread over `sim`, `inventory` and `quiz`.

pub mod app;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod input;
pub mod inventory;
pub mod model;
pub mod quiz;
pub mod sim;
pub mod storage;

pub use catalog::{Catalog, Item, ItemCategory};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{Engine, Outcome, PumpReport, Snapshot};
pub use events::{Change, EngineEvent};
pub use model::{GameState, Mood, Pet, Rules};
pub use storage::{FileStore, MemoryStore, Store};
