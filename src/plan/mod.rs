pub mod model;
pub mod normalize;
pub mod quantity;

pub use model::{
    capitalize, DayPlan, IngredientLine, MacroSet, MealEntry, WeeklyPlan, Weekday,
    CANONICAL_ORDER,
};
pub use normalize::{denormalize, normalize, normalize_days};
pub use quantity::{format_quantity, parse_quantity};
