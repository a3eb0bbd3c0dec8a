use crate::model::Position;
use crate::sim::PlayerAction;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "manulmanor")]
#[command(about = "Look after a Pallas's cat from the terminal")]
pub struct Cli {
    /// Directory holding the save files. Overrides the settings file.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// JSON item catalog to use instead of the built-in one.
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show the pet, its mood and any pending feedback
    Status {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Name your manul and finish onboarding
    Adopt { name: String },
    /// Feed basic food, or a food item from the inventory
    Feed { food: Option<String> },
    Clean,
    Play,
    /// List the catalog with prices and lock state
    Shop,
    Buy { id: String },
    /// Put a furniture or decoration item at (x, y)
    Place {
        id: String,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    Remove { id: String },
    Wear { id: String },
    Unwear { id: String },
    /// Show this week's quiz
    Quiz,
    /// Answer a quiz question (both numbers start at 1)
    Answer {
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        question: u64,
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        option: u64,
    },
    /// Run whatever periodic work is due right now
    Tick,
    /// Keep running, pumping the schedule and printing status
    Watch {
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
        /// Stop after this many rounds; runs until interrupted when unset
        #[arg(long)]
        iterations: Option<u64>,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Status { json: false }
    }
}

/// The engine action a command performs, if any. Read-only commands map to
/// `None`.
pub fn map_command_to_action(cmd: &Command) -> Option<PlayerAction> {
    match cmd {
        Command::Adopt { name } => Some(PlayerAction::Adopt(name.clone())),
        Command::Feed { food } => Some(PlayerAction::Feed(food.clone())),
        Command::Clean => Some(PlayerAction::Clean),
        Command::Play => Some(PlayerAction::Play),
        Command::Buy { id } => Some(PlayerAction::Purchase(id.clone())),
        Command::Place { id, x, y } => Some(PlayerAction::Place(id.clone(), Position::new(*x, *y))),
        Command::Remove { id } => Some(PlayerAction::Remove(id.clone())),
        Command::Wear { id } => Some(PlayerAction::Wear(id.clone())),
        Command::Unwear { id } => Some(PlayerAction::Unwear(id.clone())),
        Command::Answer { question, option } => Some(PlayerAction::Answer {
            question: (*question - 1) as usize,
            option: (*option - 1) as usize,
        }),
        Command::Status { .. }
        | Command::Shop
        | Command::Quiz
        | Command::Tick
        | Command::Watch { .. } => None,
    }
}
