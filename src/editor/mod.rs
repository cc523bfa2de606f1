pub mod session;
pub mod state;

pub use session::PlanEditor;
pub use state::{
    Action, Effect, IngredientKey, LoadStatus, MealKey, PlanStore, RecomputeOrdering,
    RecomputeRequest, RecomputeTicket, Rejection, SaveStatus,
};
