use tokio::sync::{Mutex, MutexGuard};

use super::state::{
    Action, Effect, IngredientKey, MealKey, PlanStore, RecomputeOrdering, RecomputeRequest,
    Rejection,
};
use crate::api_connection::endpoints::{
    RawIngredient, RecalculateMacrosRequest, SaveWeeklyPlanRequest,
};
use crate::api_connection::PlanBackend;
use crate::error::{EditorError, Result};
use crate::plan::{denormalize, normalize, MacroSet};
use crate::render::render_plan;

/// Drives a [`PlanStore`] against a [`PlanBackend`] for one user.
///
/// All methods take `&self`: several edits can be awaited together and their
/// recompute calls overlap. The store lock is never held across an await.
pub struct PlanEditor<B> {
    backend: B,
    user_id: String,
    store: Mutex<PlanStore>,
}

impl<B: PlanBackend> PlanEditor<B> {
    pub fn new(backend: B, user_id: impl Into<String>, ordering: RecomputeOrdering) -> Self {
        Self {
            backend,
            user_id: user_id.into(),
            store: Mutex::new(PlanStore::new(ordering)),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Read access to the current state, e.g. for rendering.
    pub async fn store(&self) -> MutexGuard<'_, PlanStore> {
        self.store.lock().await
    }

    async fn dispatch(&self, action: Action) -> Effect {
        self.store.lock().await.apply(action)
    }

    /// Fetch and normalize the user's weekly plan, replacing both copies.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn load_plan(&self) -> Result<()> {
        self.dispatch(Action::LoadStarted).await;

        match self.backend.fetch_weekly_plan(&self.user_id).await {
            Ok(envelope) => {
                let plan = normalize(envelope);
                tracing::info!(days = plan.days.len(), "weekly plan loaded");
                self.dispatch(Action::LoadSucceeded(plan)).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load weekly plan");
                self.dispatch(Action::LoadFailed(e.to_string())).await;
                Err(e.into())
            }
        }
    }

    /// Apply a typed quantity and refresh the meal's macros from the backend.
    ///
    /// Only bad indices (or no plan) are returned as errors. A failed
    /// recompute is recorded on the meal and leaves its macros as they were.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn on_quantity_edit(
        &self,
        day: usize,
        meal: usize,
        ingredient: usize,
        raw: &str,
    ) -> Result<()> {
        let key = IngredientKey::new(day, meal, ingredient);
        let effect = self
            .dispatch(Action::QuantityEdited {
                key,
                raw: raw.to_string(),
            })
            .await;

        match effect {
            Effect::Recompute(request) => {
                self.run_recompute(request).await;
                Ok(())
            }
            Effect::None | Effect::Save(_) => Ok(()),
            Effect::Rejected(Rejection::NotLoaded) => Err(EditorError::NotLoaded),
            Effect::Rejected(_) => Err(EditorError::InvalidIndex {
                day,
                meal,
                ingredient,
            }),
        }
    }

    async fn run_recompute(&self, request: RecomputeRequest) {
        let ticket = request.ticket;
        let body = RecalculateMacrosRequest {
            ricetta_id: request.recipe_id,
            ingredienti_riproporzionati: request
                .ingredients
                .iter()
                .map(RawIngredient::from)
                .collect(),
        };

        let action = match self.backend.recalculate_macros(&body).await {
            Ok(response) => {
                let macros = MacroSet::from(response.macro_riproporzionate);
                tracing::debug!(
                    day = ticket.meal.day,
                    meal = ticket.meal.meal,
                    seq = ticket.seq,
                    kcal = macros.kcal,
                    "macros recomputed"
                );
                Action::RecomputeSucceeded { ticket, macros }
            }
            Err(e) => {
                tracing::warn!(
                    day = ticket.meal.day,
                    meal = ticket.meal.meal,
                    seq = ticket.seq,
                    error = %e,
                    "macro recompute failed, keeping previous totals"
                );
                Action::RecomputeFailed {
                    ticket,
                    error: e.to_string(),
                }
            }
        };
        self.dispatch(action).await;
    }

    /// Push the edited plan to the backend. Rejected without any request
    /// unless there are unsaved changes and nothing else is in flight.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn save_plan(&self) -> Result<()> {
        let plan = match self.dispatch(Action::SaveRequested).await {
            Effect::Save(plan) => plan,
            Effect::Rejected(rejection) => {
                tracing::debug!(%rejection, "save not started");
                return Err(EditorError::SaveRejected(rejection));
            }
            Effect::None | Effect::Recompute(_) => return Ok(()),
        };

        let request = SaveWeeklyPlanRequest {
            piano_settimanale: denormalize(&plan),
        };

        match self.backend.save_weekly_plan(&self.user_id, &request).await {
            Ok(()) => {
                tracing::info!("weekly plan saved");
                self.dispatch(Action::SaveSucceeded).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to save weekly plan");
                self.dispatch(Action::SaveFailed(e.to_string())).await;
                Err(e.into())
            }
        }
    }

    pub async fn toggle_expanded(&self, day: usize, meal: usize) {
        self.dispatch(Action::ToggleExpanded(MealKey::new(day, meal)))
            .await;
    }

    pub async fn reset_to_snapshot(&self) {
        self.dispatch(Action::ResetToSnapshot).await;
    }

    pub async fn is_dirty(&self) -> bool {
        self.store.lock().await.is_dirty()
    }

    pub async fn render(&self) -> String {
        render_plan(&*self.store.lock().await)
    }
}
