use crate::model::{Feedback, Reward};
use std::sync::mpsc::{channel, Receiver, Sender};

/// Which part of the aggregate an operation touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
    Pet,
    Inventory,
    Placement,
    Quiz,
    Rewards,
    Feedback,
    Onboarding,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    StateChanged(Change),
    Feedback(Feedback),
    Reward(Reward),
}

/// Fan-out to any number of channel subscribers. Dropped receivers are
/// pruned on the next publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Sender<EngineEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
