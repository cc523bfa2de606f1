use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::Add;

/// Macro totals for a meal, a day or the whole week.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct MacroSet {
    pub kcal: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl MacroSet {
    pub fn new(kcal: f64, protein_g: f64, carbs_g: f64, fat_g: f64) -> Self {
        Self {
            kcal,
            protein_g,
            carbs_g,
            fat_g,
        }
    }

    /// Negative values coming off the wire are clamped to zero.
    pub fn clamped(self) -> Self {
        Self {
            kcal: self.kcal.max(0.0),
            protein_g: self.protein_g.max(0.0),
            carbs_g: self.carbs_g.max(0.0),
            fat_g: self.fat_g.max(0.0),
        }
    }
}

impl Add for MacroSet {
    type Output = MacroSet;

    fn add(self, rhs: MacroSet) -> MacroSet {
        MacroSet {
            kcal: self.kcal + rhs.kcal,
            protein_g: self.protein_g + rhs.protein_g,
            carbs_g: self.carbs_g + rhs.carbs_g,
            fat_g: self.fat_g + rhs.fat_g,
        }
    }
}

impl Sum for MacroSet {
    fn sum<I: Iterator<Item = MacroSet>>(iter: I) -> Self {
        iter.fold(MacroSet::default(), Add::add)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IngredientLine {
    pub ingredient_name: String,
    pub quantity_g: f64,
    pub unit: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MealEntry {
    /// Backend key of the meal slot, e.g. "pranzo".
    pub meal_name: String,
    pub recipe_name: String,
    pub recipe_id: Option<i64>,
    pub macro_totals: MacroSet,
    pub ingredients: Vec<IngredientLine>,
}

impl MealEntry {
    /// Only meals bound to a recipe are ever sent for recompute.
    pub fn is_recompute_eligible(&self) -> bool {
        self.recipe_id.is_some()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DayPlan {
    /// Backend key of the day, e.g. "lunedì". Written back verbatim on save.
    pub day_name: String,
    pub meals: Vec<MealEntry>,
}

impl DayPlan {
    pub fn weekday(&self) -> Option<Weekday> {
        Weekday::from_name(&self.day_name)
    }

    pub fn totals(&self) -> MacroSet {
        self.meals.iter().map(|m| m.macro_totals).sum()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct WeeklyPlan {
    pub days: Vec<DayPlan>,
}

impl WeeklyPlan {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn meal(&self, day: usize, meal: usize) -> Option<&MealEntry> {
        self.days.get(day).and_then(|d| d.meals.get(meal))
    }

    pub fn meal_mut(&mut self, day: usize, meal: usize) -> Option<&mut MealEntry> {
        self.days.get_mut(day).and_then(|d| d.meals.get_mut(meal))
    }

    pub fn daily_totals(&self) -> Vec<MacroSet> {
        self.days.iter().map(DayPlan::totals).collect()
    }

    pub fn weekly_totals(&self) -> MacroSet {
        self.days.iter().map(DayPlan::totals).sum()
    }
}

/// Canonical weekday ordering used to sort the backend's day-keyed map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

pub const CANONICAL_ORDER: [Weekday; 7] = [
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
    Weekday::Saturday,
    Weekday::Sunday,
];

impl Weekday {
    /// Accepts the backend's Italian names (with or without the accent) and
    /// English names, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "lunedì" | "lunedi" | "monday" => Some(Weekday::Monday),
            "martedì" | "martedi" | "tuesday" => Some(Weekday::Tuesday),
            "mercoledì" | "mercoledi" | "wednesday" => Some(Weekday::Wednesday),
            "giovedì" | "giovedi" | "thursday" => Some(Weekday::Thursday),
            "venerdì" | "venerdi" | "friday" => Some(Weekday::Friday),
            "sabato" | "saturday" => Some(Weekday::Saturday),
            "domenica" | "sunday" => Some(Weekday::Sunday),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// "pranzo" -> "Pranzo". Used for display only.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
