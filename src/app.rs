use crate::catalog::{Catalog, ItemCategory};
use crate::clock::{Clock, SystemClock};
use crate::config::{load_settings, project_paths, save_settings_atomic, Paths, Settings};
use crate::engine::{Engine, Outcome, Snapshot};
use crate::events::EngineEvent;
use crate::input::{map_command_to_action, Cli, Command};
use crate::model::{Feedback, Reward, RewardKind, Rules};
use crate::quiz::{Quiz, QuizStatus};
use crate::storage::{FileStore, Store};
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub(crate) struct App {
    engine: Engine<FileStore, SystemClock>,
    paths: Paths,
}

impl App {
    fn init(cli: &Cli) -> Result<Self> {
        let paths = project_paths()?;
        let settings = load_settings(&paths.settings_path);
        init_tracing(&settings.log_filter);

        if !paths.settings_path.exists() {
            if let Err(e) = save_settings_atomic(&paths.settings_path, &settings) {
                tracing::warn!("could not write default settings: {:#}", e);
            }
        }

        let mut paths = paths.with_settings(&settings);
        if let Some(dir) = &cli.data_dir {
            paths.store_dir = dir.clone();
        }

        let catalog = load_catalog(cli, &settings)?;
        tracing::debug!(store = %paths.store_dir.display(), items = catalog.items().len(), "starting");

        let mut engine = Engine::load(
            FileStore::new(paths.store_dir.clone()),
            SystemClock,
            Arc::new(catalog),
            settings.rules.clone(),
        );

        // decay owed since the last run
        let report = engine.pump();
        if report.decayed {
            tracing::info!("caught up on decay since last run");
        }

        Ok(Self { engine, paths })
    }

    fn run(&mut self, command: Command) -> Result<()> {
        let outcome = if let Command::Watch {
            interval_secs,
            iterations,
        } = command
        {
            self.watch(Duration::from_secs(interval_secs.max(1)), iterations);
            None
        } else {
            let (out, outcome) = execute(&mut self.engine, &command)?;
            print!("{}", out);
            outcome
        };

        self.engine.flush().with_context(|| {
            format!("failed to save game to {}", self.paths.store_dir.display())
        })?;

        if let Some(Outcome::Answer(Err(e))) = outcome {
            return Err(e).context("answer was not accepted");
        }
        Ok(())
    }

    fn status(&self) -> String {
        status_text(&self.engine.snapshot(), self.engine.catalog(), self.engine.rules())
    }

    fn watch(&mut self, interval: Duration, iterations: Option<u64>) {
        let events = self.engine.subscribe();
        print!("{}", self.status());

        let mut round = 0u64;
        while iterations.map_or(true, |n| round < n) {
            std::thread::sleep(interval);
            round += 1;

            let report = self.engine.pump();
            for ev in events.try_iter() {
                match ev {
                    EngineEvent::Feedback(f) => println!("* {}", f.message),
                    EngineEvent::Reward(r) => println!("+ {}", reward_line(&r)),
                    EngineEvent::StateChanged(_) => {}
                }
            }
            self.engine.clear_rewards();
            if report.decayed || report.new_quiz {
                print!("{}", self.status());
            }
        }
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_catalog(cli: &Cli, settings: &Settings) -> Result<Catalog> {
    match cli.catalog.as_ref().or(settings.catalog_path.as_ref()) {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("failed to load item catalog {}", path.display())),
        None => Ok(Catalog::builtin()),
    }
}

/// Applies one command and renders what it did: the outcome, any rewards it
/// earned, then the command's view.
pub(crate) fn execute<S: Store, C: Clock>(
    engine: &mut Engine<S, C>,
    command: &Command,
) -> Result<(String, Option<Outcome>)> {
    let rewards_before = engine.state().rewards.len();
    let outcome = map_command_to_action(command).map(|action| engine.apply(action));

    let mut out = String::new();
    if let Some(outcome) = &outcome {
        out.push_str(&describe_outcome(engine, command, outcome));
    }
    out.push_str(&rewards_text(engine.state().rewards.get(rewards_before..).unwrap_or(&[])));
    // Rewards only live for this process, and they have been shown.
    engine.clear_rewards();

    let view = match command {
        Command::Status { json: true } => {
            let mut s = serde_json::to_string_pretty(&engine.snapshot())?;
            s.push('\n');
            s
        }
        Command::Shop | Command::Buy { .. } => shop_text(engine),
        Command::Quiz | Command::Answer { .. } => {
            quiz_text(engine.state().quiz.as_ref(), engine.rules().quiz_weekday)
        }
        Command::Tick => {
            let report = engine.pump();
            format!(
                "decayed: {}  new quiz: {}  saved: {}\n{}",
                report.decayed,
                report.new_quiz,
                report.saved,
                status_text(&engine.snapshot(), engine.catalog(), engine.rules())
            )
        }
        _ => status_text(&engine.snapshot(), engine.catalog(), engine.rules()),
    };
    out.push_str(&view);
    Ok((out, outcome))
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut app = App::init(&cli)?;
    app.run(cli.command.unwrap_or_default())
}

/* -----------------------------
   Text output
------------------------------ */

const BAR_WIDTH: usize = 10;

pub(crate) fn stat_bar(value: f64) -> String {
    let filled = ((value.clamp(0.0, 1.0) * BAR_WIDTH as f64).round()) as usize;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        (value.clamp(0.0, 1.0) * 100.0).round() as u32
    )
}

fn feedback_line(f: &Feedback) -> String {
    format!("> {}\n", f.message)
}

/// Explains commands that changed nothing, or changed something without
/// leaving feedback behind.
pub(crate) fn describe_outcome<S: Store, C: Clock>(
    engine: &Engine<S, C>,
    command: &Command,
    outcome: &Outcome,
) -> String {
    let snapshot = engine.snapshot();
    let catalog = engine.catalog();
    let name = snapshot.pet.display_name().to_string();
    let item_name = |id: &str| {
        catalog
            .get(id)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| id.to_string())
    };

    match (command, outcome) {
        (Command::Wear { id }, Outcome::Applied) => {
            format!("{} is now wearing the {}.\n", name, item_name(id))
        }
        (Command::Unwear { id }, Outcome::Applied) => {
            format!("{} took off the {}.\n", name, item_name(id))
        }
        (Command::Unwear { id }, Outcome::Ignored) => {
            format!("{} isn't wearing {}.\n", name, item_name(id))
        }
        (Command::Remove { id }, Outcome::Ignored) if catalog.get(id).is_some() => {
            format!("The {} isn't placed.\n", item_name(id))
        }
        (Command::Wear { id }, Outcome::Ignored) | (Command::Place { id, .. }, Outcome::Ignored)
            if catalog.get(id).is_some() =>
        {
            let owned = engine
                .catalog()
                .get(id)
                .map(|item| engine.state().can_use(item))
                .unwrap_or(false);
            if owned {
                format!("The {} can't be used that way.\n", item_name(id))
            } else {
                format!("You don't own the {}.\n", item_name(id))
            }
        }
        (Command::Feed { food: Some(id) }, Outcome::Ignored) => {
            format!("You don't have any {} left.\n", item_name(id))
        }
        (Command::Adopt { .. }, Outcome::Ignored) => "Your manul needs a name.\n".to_string(),
        (Command::Answer { .. }, Outcome::Answer(Ok(correct))) => {
            let mut s = String::new();
            if let Some(f) = &snapshot.feedback {
                s.push_str(&feedback_line(f));
            }
            s.push_str(if *correct { "Correct!\n" } else { "Not quite.\n" });
            s
        }
        (Command::Answer { .. }, Outcome::Answer(Err(_))) => String::new(),
        (
            Command::Buy { id }
            | Command::Wear { id }
            | Command::Place { id, .. }
            | Command::Remove { id },
            Outcome::Ignored,
        ) => format!("There is no item called {}.\n", id),
        _ => snapshot.feedback.as_ref().map(feedback_line).unwrap_or_default(),
    }
}

pub(crate) fn status_text(snapshot: &Snapshot, catalog: &Catalog, rules: &Rules) -> String {
    let pet = &snapshot.pet;
    let mut s = String::new();

    if snapshot.onboarding {
        s.push_str("A manul is waiting for you. Run `manulmanor adopt <name>` to welcome it home.\n");
    }

    let _ = writeln!(
        s,
        "{} (level {}, {}/{} xp), feeling {}",
        pet.display_name(),
        pet.level,
        pet.xp,
        rules.required_xp(pet.level),
        snapshot.mood.label()
    );
    let _ = writeln!(s, "  hunger    {}", stat_bar(pet.hunger));
    let _ = writeln!(s, "  hygiene   {}", stat_bar(pet.hygiene));
    let _ = writeln!(s, "  happiness {}", stat_bar(pet.happiness));
    let _ = writeln!(s, "  coins     {}", pet.coins);

    if !pet.worn_items.is_empty() {
        let worn: Vec<String> = pet
            .worn_items
            .iter()
            .map(|id| catalog.get(id).map(|i| i.name.clone()).unwrap_or_else(|| id.clone()))
            .collect();
        let _ = writeln!(s, "  wearing   {}", worn.join(", "));
    }

    let mut lines = Vec::new();
    for entry in &snapshot.inventory {
        let Some(item) = catalog.get(&entry.item_id) else {
            continue;
        };
        if item.is_consumable() {
            if entry.quantity > 0 {
                lines.push(format!("{} x{}", item.name, entry.quantity));
            } else if item.is_basic_food() {
                lines.push(format!("{} (free)", item.name));
            }
        } else if entry.purchased {
            lines.push(item.name.clone());
        }
    }
    if !lines.is_empty() {
        let _ = writeln!(s, "  owns      {}", lines.join(", "));
    }

    for placed in &snapshot.placed_items {
        let label = catalog
            .get(&placed.item_id)
            .map(|i| i.name.as_str())
            .unwrap_or(placed.item_id.as_str());
        let _ = writeln!(
            s,
            "  room      {} at ({:.1}, {:.1})",
            label, placed.position.x, placed.position.y
        );
    }

    if let Some(quiz) = &snapshot.quiz {
        if !quiz.is_completed {
            let answered = quiz.answers.iter().filter(|a| a.is_some()).count();
            let _ = writeln!(
                s,
                "  quiz      {} ({}/{} answered)",
                quiz.title,
                answered,
                quiz.questions.len()
            );
        }
    }
    s
}

pub(crate) fn shop_text<S: Store, C: Clock>(engine: &Engine<S, C>) -> String {
    let state = engine.state();
    let mut s = format!("Coins: {}\n", state.pet.coins);

    for category in ItemCategory::ALL {
        let rows: Vec<_> = engine
            .shop()
            .into_iter()
            .filter(|(item, _)| item.category == category)
            .collect();
        if rows.is_empty() {
            continue;
        }
        let _ = writeln!(s, "{}", category.display_name());
        for (item, status) in rows {
            let tag = if status.owned {
                "owned".to_string()
            } else if status.locked {
                format!("level {}", item.unlock_level)
            } else if item.is_consumable() && status.quantity > 0 {
                format!("have {}", status.quantity)
            } else if !status.affordable {
                "can't afford".to_string()
            } else {
                String::new()
            };
            let _ = writeln!(
                s,
                "  {:<24} {:>5}c  {:<14} {}",
                item.id, item.price, tag, item.name
            );
        }

        let owned: Vec<&str> = state
            .owned_in(category, engine.catalog())
            .filter(|(entry, item)| entry.purchased && !item.is_consumable())
            .map(|(_, item)| item.name.as_str())
            .collect();
        if category.is_placeable() && !owned.is_empty() {
            let _ = writeln!(s, "  placeable now: {}", owned.join(", "));
        }
    }
    s
}

pub(crate) fn quiz_text(quiz: Option<&Quiz>, weekday: chrono::Weekday) -> String {
    let Some(quiz) = quiz else {
        return format!("No quiz yet. A new one arrives every {}.\n", weekday);
    };

    let mut s = format!(
        "{} ({})\n",
        quiz.title,
        quiz.date.with_timezone(&Local).format("%Y-%m-%d")
    );
    for (qi, question) in quiz.questions.iter().enumerate() {
        let _ = writeln!(s, "{}. {}", qi + 1, question.prompt);
        let answer = quiz.answer(qi);
        for (oi, option) in question.options.iter().enumerate() {
            let marker = match answer {
                Some(_) if oi == question.correct_index => "*",
                Some(a) if a == oi => "x",
                _ => " ",
            };
            let _ = writeln!(s, "   {} {}) {}", marker, oi + 1, option);
        }
        if answer.is_some() {
            let _ = writeln!(s, "     {}", question.explanation);
        }
    }
    match quiz.status() {
        QuizStatus::Completed => {
            let _ = writeln!(s, "Score: {}/{}", quiz.score, quiz.max_score());
        }
        QuizStatus::InProgress | QuizStatus::Generated => {
            s.push_str("Answer with `manulmanor answer <question> <option>`.\n");
        }
    }
    s
}

fn reward_line(r: &Reward) -> String {
    match r.kind {
        RewardKind::Coins => format!("{} coins", r.amount),
        RewardKind::Xp => format!("{} XP", r.amount),
        RewardKind::LevelUp => format!("reached level {}", r.amount),
        RewardKind::Item => format!("{} item(s)", r.amount),
    }
}

pub(crate) fn rewards_text(rewards: &[Reward]) -> String {
    rewards
        .iter()
        .map(|r| format!("+ {}\n", reward_line(r)))
        .collect()
}
