use crate::editor::state::{IngredientKey, LoadStatus, MealKey, PlanStore, SaveStatus};
use crate::plan::{capitalize, format_quantity, MacroSet, MealEntry};

const PENDING: &str = "...";

fn macro_columns(macros: &MacroSet) -> String {
    format!(
        "{:>8.1} {:>8.1} {:>8.1} {:>8.1}",
        macros.kcal, macros.protein_g, macros.carbs_g, macros.fat_g
    )
}

fn pending_columns() -> String {
    format!("{:>8} {:>8} {:>8} {:>8}", PENDING, PENDING, PENDING, PENDING)
}

fn meal_row(meal: &MealEntry, recomputing: bool) -> String {
    let (quantity, figures) = if recomputing {
        (PENDING.to_string(), pending_columns())
    } else {
        ("1 portion".to_string(), macro_columns(&meal.macro_totals))
    };
    format!(
        "  {:<12} {:<28} {:<10} {}",
        capitalize(&meal.meal_name),
        meal.recipe_name,
        quantity,
        figures
    )
}

/// Text rendering of the edited plan: days, meals, expanded ingredient
/// lists, daily and weekly totals, then the save state.
pub fn render_plan(store: &PlanStore) -> String {
    match store.load_status() {
        LoadStatus::Idle => return "No weekly plan loaded.".to_string(),
        LoadStatus::Loading => return "Loading weekly plan...".to_string(),
        LoadStatus::Failed(message) => return format!("Error: {}", message),
        LoadStatus::Ready => {}
    }

    let plan = match store.edited() {
        Some(plan) if !plan.is_empty() => plan,
        _ => return "No weekly plan found.".to_string(),
    };

    let mut lines = Vec::new();
    lines.push(format!(
        "  {:<12} {:<28} {:<10} {:>8} {:>8} {:>8} {:>8}",
        "Meal", "Recipe", "Quantity", "Kcal", "Prot g", "Carb g", "Fat g"
    ));

    for (d, day) in plan.days.iter().enumerate() {
        lines.push(format!("== {} ==", capitalize(&day.day_name)));

        for (m, meal) in day.meals.iter().enumerate() {
            let key = MealKey::new(d, m);
            lines.push(meal_row(meal, store.is_recomputing(key)));

            if let Some(error) = store.meal_error(key) {
                lines.push(format!("      ! macros not updated: {}", error));
            }

            if meal.recipe_id.is_some() && store.is_expanded(key) {
                for (i, line) in meal.ingredients.iter().enumerate() {
                    let text = store
                        .input_buffer(IngredientKey::new(d, m, i))
                        .map(str::to_string)
                        .unwrap_or_else(|| format_quantity(line.quantity_g));
                    lines.push(format!(
                        "      - {:<24} [{:>8}] {}",
                        line.ingredient_name, text, line.unit
                    ));
                }
            }
        }

        lines.push(format!(
            "  {:<12} {:<28} {:<10} {}",
            "",
            "DAY TOTAL",
            "",
            macro_columns(&day.totals())
        ));
    }

    lines.push(format!(
        "  {:<12} {:<28} {:<10} {}",
        "",
        "WEEK TOTAL",
        "",
        macro_columns(&plan.weekly_totals())
    ));

    let status = if store.is_saving() {
        "Saving...".to_string()
    } else {
        match store.save_status() {
            SaveStatus::Saved => "Changes saved.".to_string(),
            SaveStatus::Failed(message) => format!("Save failed, try again: {}", message),
            SaveStatus::Idle if store.is_dirty() => "Unsaved changes.".to_string(),
            SaveStatus::Idle => "No unsaved changes.".to_string(),
        }
    };
    lines.push(status);

    lines.join("\n")
}
