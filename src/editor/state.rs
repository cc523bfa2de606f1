//! Reducer-style store for the weekly plan editor.
//!
//! Every state change goes through [`PlanStore::apply`]. The store never does
//! I/O; when an action needs the backend it hands back an [`Effect`] for the
//! caller to run, and the caller reports the outcome with another action.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::plan::{format_quantity, parse_quantity, IngredientLine, MacroSet, WeeklyPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MealKey {
    pub day: usize,
    pub meal: usize,
}

impl MealKey {
    pub fn new(day: usize, meal: usize) -> Self {
        Self { day, meal }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IngredientKey {
    pub day: usize,
    pub meal: usize,
    pub ingredient: usize,
}

impl IngredientKey {
    pub fn new(day: usize, meal: usize, ingredient: usize) -> Self {
        Self {
            day,
            meal,
            ingredient,
        }
    }

    pub fn meal_key(&self) -> MealKey {
        MealKey::new(self.day, self.meal)
    }
}

/// Which recompute responses are allowed to overwrite a meal's macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecomputeOrdering {
    /// Every response is applied as it arrives; the last one to complete wins.
    #[default]
    LastCompleted,
    /// Only the response to the most recently issued request for a meal is
    /// applied; older ones are dropped.
    LatestIssued,
}

impl FromStr for RecomputeOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "last-completed" | "last_completed" => Ok(RecomputeOrdering::LastCompleted),
            "latest-issued" | "latest_issued" => Ok(RecomputeOrdering::LatestIssued),
            other => Err(format!(
                "unknown recompute ordering '{}' (expected last-completed or latest-issued)",
                other
            )),
        }
    }
}

impl fmt::Display for RecomputeOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecomputeOrdering::LastCompleted => write!(f, "last-completed"),
            RecomputeOrdering::LatestIssued => write!(f, "latest-issued"),
        }
    }
}

/// Identifies one recompute request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecomputeTicket {
    pub meal: MealKey,
    /// Per-store, monotonically increasing.
    pub seq: u64,
    /// Load generation the request was issued under.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeRequest {
    pub ticket: RecomputeTicket,
    pub recipe_id: i64,
    /// The meal's full ingredient list at the time of the edit.
    pub ingredients: Vec<IngredientLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Banner shown next to the save button.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveStatus {
    Idle,
    Saved,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no plan is loaded")]
    NotLoaded,
    #[error("there are no unsaved changes")]
    Clean,
    #[error("a save is already in progress")]
    AlreadySaving,
    #[error("a macro recompute is still in flight")]
    RecomputeInFlight,
    #[error("no ingredient at that position")]
    InvalidIndex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    LoadStarted,
    LoadSucceeded(WeeklyPlan),
    LoadFailed(String),
    QuantityEdited { key: IngredientKey, raw: String },
    RecomputeSucceeded { ticket: RecomputeTicket, macros: MacroSet },
    RecomputeFailed { ticket: RecomputeTicket, error: String },
    SaveRequested,
    SaveSucceeded,
    SaveFailed(String),
    ToggleExpanded(MealKey),
    ResetToSnapshot,
}

/// Follow-up work requested by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    Recompute(RecomputeRequest),
    /// Persist this copy of the plan.
    Save(WeeklyPlan),
    Rejected(Rejection),
}

#[derive(Debug, Clone)]
pub struct PlanStore {
    load: LoadStatus,
    /// Last state known to match the backend.
    snapshot: Option<WeeklyPlan>,
    /// Working copy. Always an independent clone, never shares data with
    /// `snapshot`.
    edited: Option<WeeklyPlan>,
    input_buffers: HashMap<IngredientKey, String>,
    expanded: HashSet<MealKey>,
    /// In-flight recompute count per meal; a meal is recomputing while > 0.
    recomputing: HashMap<MealKey, usize>,
    latest_issued: HashMap<MealKey, u64>,
    meal_errors: HashMap<MealKey, String>,
    next_seq: u64,
    generation: u64,
    /// Copy handed to the backend by the pending save, if any.
    in_flight_save: Option<WeeklyPlan>,
    save_status: SaveStatus,
    ordering: RecomputeOrdering,
}

impl Default for PlanStore {
    fn default() -> Self {
        Self::new(RecomputeOrdering::default())
    }
}

impl PlanStore {
    pub fn new(ordering: RecomputeOrdering) -> Self {
        Self {
            load: LoadStatus::Idle,
            snapshot: None,
            edited: None,
            input_buffers: HashMap::new(),
            expanded: HashSet::new(),
            recomputing: HashMap::new(),
            latest_issued: HashMap::new(),
            meal_errors: HashMap::new(),
            next_seq: 0,
            generation: 0,
            in_flight_save: None,
            save_status: SaveStatus::Idle,
            ordering,
        }
    }

    pub fn apply(&mut self, action: Action) -> Effect {
        match action {
            Action::LoadStarted => {
                self.load = LoadStatus::Loading;
                Effect::None
            }
            Action::LoadSucceeded(plan) => {
                self.clear_session();
                self.snapshot = Some(plan.clone());
                self.edited = Some(plan);
                self.rebuild_input_buffers();
                self.load = LoadStatus::Ready;
                Effect::None
            }
            Action::LoadFailed(message) => {
                self.clear_session();
                self.snapshot = None;
                self.edited = None;
                self.input_buffers.clear();
                self.load = LoadStatus::Failed(message);
                Effect::None
            }
            Action::QuantityEdited { key, raw } => self.edit_quantity(key, raw),
            Action::RecomputeSucceeded { ticket, macros } => {
                if self.finish_recompute(ticket) {
                    if let Some(meal) = self
                        .edited
                        .as_mut()
                        .and_then(|plan| plan.meal_mut(ticket.meal.day, ticket.meal.meal))
                    {
                        meal.macro_totals = macros;
                    }
                    self.meal_errors.remove(&ticket.meal);
                }
                Effect::None
            }
            Action::RecomputeFailed { ticket, error } => {
                if self.finish_recompute(ticket) {
                    self.meal_errors.insert(ticket.meal, error);
                }
                Effect::None
            }
            Action::SaveRequested => match self.save_blocker() {
                Some(rejection) => Effect::Rejected(rejection),
                None => match self.edited.clone() {
                    Some(plan) => {
                        self.in_flight_save = Some(plan.clone());
                        self.save_status = SaveStatus::Idle;
                        Effect::Save(plan)
                    }
                    None => Effect::Rejected(Rejection::NotLoaded),
                },
            },
            Action::SaveSucceeded => {
                // The submitted copy is promoted, so edits made while the
                // request was out stay dirty.
                if let Some(saved) = self.in_flight_save.take() {
                    self.snapshot = Some(saved);
                    self.save_status = SaveStatus::Saved;
                }
                Effect::None
            }
            Action::SaveFailed(message) => {
                if self.in_flight_save.take().is_some() {
                    self.save_status = SaveStatus::Failed(message);
                }
                Effect::None
            }
            Action::ToggleExpanded(key) => {
                let eligible = self
                    .edited
                    .as_ref()
                    .and_then(|plan| plan.meal(key.day, key.meal))
                    .is_some_and(|meal| meal.recipe_id.is_some());
                if eligible && !self.expanded.remove(&key) {
                    self.expanded.insert(key);
                }
                Effect::None
            }
            Action::ResetToSnapshot => {
                self.reset_to_snapshot();
                Effect::None
            }
        }
    }

    fn edit_quantity(&mut self, key: IngredientKey, raw: String) -> Effect {
        let Some(plan) = self.edited.as_mut() else {
            return Effect::Rejected(Rejection::NotLoaded);
        };
        let Some(meal) = plan.meal_mut(key.day, key.meal) else {
            return Effect::Rejected(Rejection::InvalidIndex);
        };
        let Some(line) = meal.ingredients.get_mut(key.ingredient) else {
            return Effect::Rejected(Rejection::InvalidIndex);
        };

        line.quantity_g = parse_quantity(&raw);
        let recipe_id = meal.recipe_id;
        let ingredients = meal.ingredients.clone();

        self.input_buffers.insert(key, raw);
        self.save_status = SaveStatus::Idle;

        let Some(recipe_id) = recipe_id else {
            return Effect::None;
        };

        let meal_key = key.meal_key();
        self.next_seq += 1;
        let ticket = RecomputeTicket {
            meal: meal_key,
            seq: self.next_seq,
            generation: self.generation,
        };
        self.latest_issued.insert(meal_key, ticket.seq);
        *self.recomputing.entry(meal_key).or_insert(0) += 1;

        Effect::Recompute(RecomputeRequest {
            ticket,
            recipe_id,
            ingredients,
        })
    }

    /// Clears the in-flight mark for `ticket` and reports whether its result
    /// should be applied.
    fn finish_recompute(&mut self, ticket: RecomputeTicket) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(seq = ticket.seq, "dropping recompute result from an earlier load");
            return false;
        }

        if let Some(count) = self.recomputing.get_mut(&ticket.meal) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.recomputing.remove(&ticket.meal);
            }
        }
        self.save_status = SaveStatus::Idle;

        match self.ordering {
            RecomputeOrdering::LastCompleted => true,
            RecomputeOrdering::LatestIssued => {
                let latest = self.latest_issued.get(&ticket.meal).copied();
                if latest != Some(ticket.seq) {
                    tracing::debug!(
                        seq = ticket.seq,
                        latest = ?latest,
                        "dropping superseded recompute result"
                    );
                    return false;
                }
                true
            }
        }
    }

    /// Forget all per-session bookkeeping and start a new generation, so any
    /// request still in flight is ignored when it lands.
    fn clear_session(&mut self) {
        self.generation += 1;
        self.expanded.clear();
        self.recomputing.clear();
        self.latest_issued.clear();
        self.meal_errors.clear();
        self.in_flight_save = None;
        self.save_status = SaveStatus::Idle;
    }

    fn rebuild_input_buffers(&mut self) {
        self.input_buffers.clear();
        let Some(plan) = self.edited.as_ref() else {
            return;
        };
        for (d, day) in plan.days.iter().enumerate() {
            for (m, meal) in day.meals.iter().enumerate() {
                for (i, line) in meal.ingredients.iter().enumerate() {
                    self.input_buffers
                        .insert(IngredientKey::new(d, m, i), format_quantity(line.quantity_g));
                }
            }
        }
    }

    /// Throw away local edits. In-flight recomputes are abandoned.
    pub fn reset_to_snapshot(&mut self) {
        let Some(snapshot) = self.snapshot.as_ref() else {
            return;
        };
        self.edited = Some(snapshot.clone());
        self.generation += 1;
        self.recomputing.clear();
        self.latest_issued.clear();
        self.meal_errors.clear();
        self.rebuild_input_buffers();
    }

    pub fn is_dirty(&self) -> bool {
        match (&self.snapshot, &self.edited) {
            (Some(snapshot), Some(edited)) => snapshot != edited,
            _ => false,
        }
    }

    pub fn save_blocker(&self) -> Option<Rejection> {
        if self.edited.is_none() {
            Some(Rejection::NotLoaded)
        } else if self.in_flight_save.is_some() {
            Some(Rejection::AlreadySaving)
        } else if self.any_recomputing() {
            Some(Rejection::RecomputeInFlight)
        } else if !self.is_dirty() {
            Some(Rejection::Clean)
        } else {
            None
        }
    }

    pub fn can_save(&self) -> bool {
        self.save_blocker().is_none()
    }

    pub fn load_status(&self) -> &LoadStatus {
        &self.load
    }

    pub fn snapshot(&self) -> Option<&WeeklyPlan> {
        self.snapshot.as_ref()
    }

    pub fn edited(&self) -> Option<&WeeklyPlan> {
        self.edited.as_ref()
    }

    pub fn is_recomputing(&self, key: MealKey) -> bool {
        self.recomputing.contains_key(&key)
    }

    pub fn any_recomputing(&self) -> bool {
        !self.recomputing.is_empty()
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight_save.is_some()
    }

    pub fn save_status(&self) -> &SaveStatus {
        &self.save_status
    }

    pub fn input_buffer(&self, key: IngredientKey) -> Option<&str> {
        self.input_buffers.get(&key).map(String::as_str)
    }

    pub fn is_expanded(&self, key: MealKey) -> bool {
        self.expanded.contains(&key)
    }

    pub fn meal_error(&self, key: MealKey) -> Option<&str> {
        self.meal_errors.get(&key).map(String::as_str)
    }

    pub fn ordering(&self) -> RecomputeOrdering {
        self.ordering
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
