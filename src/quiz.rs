use crate::model::{FeedbackKind, GameState, RewardKind, Rules};
use chrono::{DateTime, Datelike, Utc, Weekday};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const QUESTIONS_PER_QUIZ: usize = 3;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
}

impl Question {
    pub fn correct_answer(&self) -> Option<&str> {
        self.options.get(self.correct_index).map(String::as_str)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuizStatus {
    Generated,
    InProgress,
    Completed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub date: DateTime<Utc>,
    pub questions: Vec<Question>,
    pub is_completed: bool,
    pub score: u32,
    /// Submitted option per question index.
    #[serde(default)]
    pub answers: Vec<Option<usize>>,
}

impl Quiz {
    /// Same ISO week, same questions.
    pub fn generate_weekly(now: DateTime<Utc>) -> Self {
        let week = now.iso_week();
        let seed = (week.year() as u64) * 100 + week.week() as u64;
        let mut rng = StdRng::seed_from_u64(seed);

        let pool = question_pool();
        let questions: Vec<Question> = pool
            .choose_multiple(&mut rng, QUESTIONS_PER_QUIZ)
            .cloned()
            .collect();

        Self {
            id: Uuid::new_v4(),
            title: format!("Manul Monday: Week {}", week.week()),
            date: now,
            answers: vec![None; questions.len()],
            questions,
            is_completed: false,
            score: 0,
        }
    }

    pub fn max_score(&self) -> u32 {
        self.questions.len() as u32
    }

    pub fn answer(&self, index: usize) -> Option<usize> {
        self.answers.get(index).copied().flatten()
    }

    pub fn status(&self) -> QuizStatus {
        if self.is_completed {
            QuizStatus::Completed
        } else if self.answers.iter().any(Option::is_some) {
            QuizStatus::InProgress
        } else {
            QuizStatus::Generated
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("no quiz is active")]
    NoActiveQuiz,
    #[error("question {index} is out of range (quiz has {len})")]
    QuestionOutOfRange { index: usize, len: usize },
    #[error("quiz is already completed")]
    Completed,
    #[error("question {index} was already answered")]
    AlreadyAnswered { index: usize },
}

impl GameState {
    /// Replaces a missing or finished quiz on the quiz weekday.
    pub fn check_weekly(&mut self, now: DateTime<Utc>, today: Weekday, rules: &Rules) -> bool {
        if today != rules.quiz_weekday {
            return false;
        }
        let due = match &self.quiz {
            None => true,
            Some(q) => q.is_completed,
        };
        if due {
            self.quiz = Some(Quiz::generate_weekly(now));
        }
        due
    }

    /// Returns whether the answer was correct. Answering the last question
    /// completes the quiz and pays out.
    pub fn submit_answer(
        &mut self,
        question: usize,
        option: usize,
        now: DateTime<Utc>,
        rules: &Rules,
    ) -> Result<bool, QuizError> {
        let quiz = self.quiz.as_mut().ok_or(QuizError::NoActiveQuiz)?;
        let len = quiz.questions.len();
        if question >= len {
            return Err(QuizError::QuestionOutOfRange { index: question, len });
        }
        if quiz.is_completed {
            return Err(QuizError::Completed);
        }
        if quiz.answer(question).is_some() {
            return Err(QuizError::AlreadyAnswered { index: question });
        }

        if quiz.answers.len() < len {
            quiz.answers.resize(len, None);
        }
        quiz.answers[question] = Some(option);

        let correct = quiz.questions[question].correct_index == option;
        if correct {
            quiz.score += 1;
        }

        if question == len - 1 {
            quiz.is_completed = true;
            let score = quiz.score;

            let coins = rules
                .quiz_base_coins
                .saturating_add(score.saturating_mul(rules.quiz_coins_per_correct));
            let xp = rules
                .quiz_base_xp
                .saturating_add(score.saturating_mul(rules.quiz_xp_per_correct));

            self.push_reward(RewardKind::Coins, coins, now);
            self.push_reward(RewardKind::Xp, xp, now);
            self.pet.coins = self.pet.coins.saturating_add(coins);
            self.add_xp(xp, now, rules);

            self.notify(
                FeedbackKind::QuizCompleted,
                format!("Quiz completed! Earned {} coins and {} XP", coins, xp),
                now,
                rules,
            );
        }

        Ok(correct)
    }
}

fn q(prompt: &str, options: [&str; 4], correct_index: usize, explanation: &str) -> Question {
    Question {
        prompt: prompt.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_index,
        explanation: explanation.to_string(),
    }
}

fn question_pool() -> Vec<Question> {
    vec![
        q(
            "Where do Pallas cats (manuls) primarily live?",
            ["Tropical rainforests", "Central Asian steppes", "Arctic tundra", "African savannas"],
            1,
            "Pallas cats live in the cold, rocky steppes of Central Asia, including Mongolia, China, and parts of Russia.",
        ),
        q(
            "Why do Pallas cats have such thick fur?",
            ["For camouflage", "To survive freezing temperatures", "To appear larger to predators", "For underwater swimming"],
            1,
            "Their extremely dense fur helps them survive harsh, cold environments where temperatures drop well below freezing.",
        ),
        q(
            "What conservation status are Pallas cats currently listed as?",
            ["Least Concern", "Near Threatened", "Endangered", "Critically Endangered"],
            1,
            "Pallas cats have been listed as Near Threatened on the IUCN Red List because of habitat loss and hunting.",
        ),
        q(
            "What shape are a Pallas cat's pupils?",
            ["Vertical slits", "Round", "Horizontal bars", "Square"],
            1,
            "Unlike most small cats, manuls have round pupils that stay round as they contract.",
        ),
        q(
            "What makes up most of a Pallas cat's diet?",
            ["Fish", "Pikas and small rodents", "Fruit", "Large deer"],
            1,
            "Pikas, voles and other small mammals are the manul's main prey.",
        ),
        q(
            "When are Pallas cats most active?",
            ["Only at midday", "At dawn and dusk", "Only in summer", "Never, they sleep all day"],
            1,
            "Manuls are mostly crepuscular, hunting in the low light of early morning and evening.",
        ),
        q(
            "Who first described the Pallas cat?",
            ["Charles Darwin", "Peter Simon Pallas", "Carl Linnaeus", "Alfred Russel Wallace"],
            1,
            "The German naturalist Peter Simon Pallas described the species in 1776, giving it its English name.",
        ),
        q(
            "Where do Pallas cats usually shelter?",
            ["Rock crevices and old marmot burrows", "Tree canopies", "Floating nests", "Open sand dunes"],
            0,
            "Manuls den in rocky outcrops and abandoned burrows dug by marmots and other animals.",
        ),
        q(
            "Roughly how big is an adult Pallas cat?",
            ["About the size of a mouse", "About the size of a house cat", "About the size of a lynx", "About the size of a leopard"],
            1,
            "Manuls are about the size of a domestic cat; their fluffy coat makes them look bigger.",
        ),
    ]
}
