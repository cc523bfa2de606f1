//! Conversion between the backend's day-keyed, meal-keyed map and the
//! ordered `WeeklyPlan` the editor works on.

use serde_json::{json, Map, Value};

use super::model::{DayPlan, IngredientLine, MacroSet, MealEntry, WeeklyPlan, Weekday};
use crate::api_connection::endpoints::{RawIngredient, RawMacros, RawMeal, WeeklyPlanEnvelope};

impl From<RawMacros> for MacroSet {
    fn from(raw: RawMacros) -> Self {
        MacroSet::new(raw.kcal, raw.proteine, raw.carboidrati, raw.lipidi).clamped()
    }
}

impl From<RawIngredient> for IngredientLine {
    fn from(raw: RawIngredient) -> Self {
        IngredientLine {
            ingredient_name: raw.nome_ingrediente,
            quantity_g: raw.quantita_g.max(0.0),
            unit: raw.unita_di_misura,
        }
    }
}

impl From<&IngredientLine> for RawIngredient {
    fn from(line: &IngredientLine) -> Self {
        RawIngredient {
            nome_ingrediente: line.ingredient_name.clone(),
            quantita_g: line.quantity_g,
            unita_di_misura: line.unit.clone(),
        }
    }
}

/// Normalize a full `GET` response body.
pub fn normalize(envelope: WeeklyPlanEnvelope) -> WeeklyPlan {
    match envelope.piano_settimanale.piano_settimanale {
        Some(days) => normalize_days(&days),
        None => WeeklyPlan::default(),
    }
}

/// Days come out Monday to Sunday; names that are not weekdays follow in the
/// order the backend sent them. Meals that lack `ricetta`, `riproporzionata`
/// or its `macro_riproporzionate` block are skipped.
pub fn normalize_days(raw_days: &Map<String, Value>) -> WeeklyPlan {
    let mut known: Vec<(Weekday, DayPlan)> = Vec::new();
    let mut unknown: Vec<DayPlan> = Vec::new();

    for (day_name, day_value) in raw_days {
        let Some(raw_meals) = day_value.as_object() else {
            tracing::debug!(day = %day_name, "skipping day without meals object");
            continue;
        };

        let meals = raw_meals
            .iter()
            .filter_map(|(meal_name, meal_value)| normalize_meal(day_name, meal_name, meal_value))
            .collect();

        let day = DayPlan {
            day_name: day_name.clone(),
            meals,
        };
        match Weekday::from_name(day_name) {
            Some(weekday) => known.push((weekday, day)),
            None => unknown.push(day),
        }
    }

    // Stable sort keeps encounter order for duplicate spellings of one day.
    known.sort_by_key(|(weekday, _)| *weekday);

    WeeklyPlan {
        days: known.into_iter().map(|(_, day)| day).chain(unknown).collect(),
    }
}

fn normalize_meal(day_name: &str, meal_name: &str, value: &Value) -> Option<MealEntry> {
    let raw: RawMeal = match serde_json::from_value(value.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(day = %day_name, meal = %meal_name, error = %e, "skipping incomplete meal");
            return None;
        }
    };

    let Some(macros) = raw.riproporzionata.macro_riproporzionate else {
        tracing::debug!(day = %day_name, meal = %meal_name, "skipping meal without macros");
        return None;
    };

    Some(MealEntry {
        meal_name: meal_name.to_string(),
        recipe_name: raw.ricetta.nome,
        recipe_id: raw.ricetta.ricetta_id,
        macro_totals: MacroSet::from(macros),
        ingredients: raw
            .riproporzionata
            .ingredienti_riproporzionati
            .into_iter()
            .map(IngredientLine::from)
            .collect(),
    })
}

/// Inverse of `normalize_days`, minus the macro totals (those are derived by
/// the backend and never sent back).
pub fn denormalize(plan: &WeeklyPlan) -> Map<String, Value> {
    let mut days = Map::new();
    for day in &plan.days {
        let mut meals = Map::new();
        for meal in &day.meals {
            let ingredients: Vec<RawIngredient> =
                meal.ingredients.iter().map(RawIngredient::from).collect();
            let mut recipe = json!({ "nome": meal.recipe_name });
            if let Some(recipe_id) = meal.recipe_id {
                recipe["ricetta_id"] = json!(recipe_id);
            }
            meals.insert(
                meal.meal_name.clone(),
                json!({
                    "ricetta": recipe,
                    "riproporzionata": {
                        "ingredienti_riproporzionati": ingredients,
                    },
                }),
            );
        }
        days.insert(day.day_name.clone(), Value::Object(meals));
    }
    days
}
