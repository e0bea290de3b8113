//! Question intent: which answer template a question gets.

use crate::config::RagPrompts;
use serde::{Deserialize, Serialize};

const WORKOUT_PHRASES: &[&str] = &[
    "workout plan",
    "exercise routine",
    "training plan",
    "workout routine",
];

const MEAL_PHRASES: &[&str] = &["meal plan", "diet plan", "what should i eat"];

/// What kind of answer a question is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    WorkoutPlan,
    MealPlan,
    #[default]
    General,
}

impl Intent {
    /// Classify a question by case-insensitive phrase match.
    ///
    /// Workout phrases are checked before meal phrases.
    pub fn classify(question: &str) -> Self {
        let question = question.to_lowercase();
        if WORKOUT_PHRASES.iter().any(|p| question.contains(p)) {
            Intent::WorkoutPlan
        } else if MEAL_PHRASES.iter().any(|p| question.contains(p)) {
            Intent::MealPlan
        } else {
            Intent::General
        }
    }

    /// The template for this intent.
    pub fn template<'a>(&self, prompts: &'a RagPrompts) -> &'a str {
        match self {
            Intent::WorkoutPlan => &prompts.workout_plan,
            Intent::MealPlan => &prompts.meal_plan,
            Intent::General => &prompts.concise_answer,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::WorkoutPlan => write!(f, "workout_plan"),
            Intent::MealPlan => write!(f, "meal_plan"),
            Intent::General => write!(f, "general"),
        }
    }
}
