use clap::{Parser, Subcommand};
use std::str::FromStr;

use crate::config::{BASE_URL_ENV_VAR, ORDERING_ENV_VAR, TIMEOUT_ENV_VAR, USER_ID_ENV_VAR};
use crate::editor::{IngredientKey, RecomputeOrdering};
use crate::plan::{WeeklyPlan, Weekday};

#[derive(Parser, Debug)]
#[command(author, version, about = "View and edit a user's weekly nutrition plan", long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides PLAN_API_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// User whose plan is edited (overrides PLAN_USER_ID)
    #[arg(long, global = true)]
    pub user_id: Option<String>,

    /// Per-request timeout in seconds (overrides PLAN_REQUEST_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// last-completed or latest-issued (overrides PLAN_RECOMPUTE_ORDERING)
    #[arg(long, global = true)]
    pub ordering: Option<RecomputeOrdering>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and print the weekly plan
    Show {
        /// List the ingredients of every recipe
        #[arg(long)]
        expand: bool,
    },
    /// Change ingredient quantities, then save the plan
    Edit {
        /// DAY/MEAL/INGREDIENT=QUANTITY, e.g. "lunedì/pranzo/riso=150,5"
        #[arg(required = true)]
        edits: Vec<EditSpec>,

        /// Print the result without saving
        #[arg(long)]
        dry_run: bool,

        /// List the ingredients of every recipe
        #[arg(long)]
        expand: bool,
    },
}

impl Cli {
    /// Command-line value for a configuration variable, if one was given.
    pub fn override_for(&self, name: &str) -> Option<String> {
        match name {
            BASE_URL_ENV_VAR => self.base_url.clone(),
            USER_ID_ENV_VAR => self.user_id.clone(),
            TIMEOUT_ENV_VAR => self.timeout_secs.map(|t| t.to_string()),
            ORDERING_ENV_VAR => self.ordering.map(|o| o.to_string()),
            _ => None,
        }
    }
}

/// One quantity edit addressed by names rather than indices.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSpec {
    pub day: String,
    pub meal: String,
    /// Ingredient name, or its zero-based position in the meal.
    pub ingredient: String,
    /// Raw text, parsed the same way as a typed field.
    pub quantity: String,
}

impl FromStr for EditSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, quantity) = s
            .split_once('=')
            .ok_or_else(|| format!("missing '=' in edit '{}'", s))?;
        let parts: Vec<&str> = path.split('/').map(str::trim).collect();
        match parts.as_slice() {
            [day, meal, ingredient] if !day.is_empty() && !meal.is_empty() && !ingredient.is_empty() => {
                Ok(EditSpec {
                    day: day.to_string(),
                    meal: meal.to_string(),
                    ingredient: ingredient.to_string(),
                    quantity: quantity.trim().to_string(),
                })
            }
            _ => Err(format!("expected DAY/MEAL/INGREDIENT=QUANTITY, got '{}'", s)),
        }
    }
}

impl EditSpec {
    /// Find the ingredient this edit targets in `plan`.
    pub fn resolve(&self, plan: &WeeklyPlan) -> Result<IngredientKey, String> {
        let wanted_weekday = Weekday::from_name(&self.day);
        let day_index = plan
            .days
            .iter()
            .position(|d| {
                d.day_name.to_lowercase() == self.day.to_lowercase()
                    || (wanted_weekday.is_some() && d.weekday() == wanted_weekday)
            })
            .ok_or_else(|| format!("no day '{}' in the plan", self.day))?;

        let day = &plan.days[day_index];
        let meal_index = day
            .meals
            .iter()
            .position(|m| m.meal_name.to_lowercase() == self.meal.to_lowercase())
            .ok_or_else(|| format!("no meal '{}' on {}", self.meal, day.day_name))?;

        let meal = &day.meals[meal_index];
        let ingredient_index = match self.ingredient.parse::<usize>() {
            Ok(i) if i < meal.ingredients.len() => i,
            _ => meal
                .ingredients
                .iter()
                .position(|l| l.ingredient_name.to_lowercase() == self.ingredient.to_lowercase())
                .ok_or_else(|| {
                    format!(
                        "no ingredient '{}' in {} on {}",
                        self.ingredient, meal.meal_name, day.day_name
                    )
                })?,
        };

        Ok(IngredientKey::new(day_index, meal_index, ingredient_index))
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
