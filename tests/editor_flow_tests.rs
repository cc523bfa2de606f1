use async_trait::async_trait;
use plan_editor::api_connection::endpoints::{
    RawIngredient, RawMacros, RecalculateMacrosRequest, RecalculateMacrosResponse,
    SaveWeeklyPlanRequest, WeeklyPlanDocument, WeeklyPlanEnvelope,
};
use plan_editor::api_connection::{parse_body, ApiConnectionError, PlanBackend};
use plan_editor::editor::{LoadStatus, MealKey, PlanEditor, RecomputeOrdering, Rejection, SaveStatus};
use plan_editor::EditorError;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

// Deterministic stand-in for the backend's macro math: every gram counts the same.
fn macros_for(ingredients: &[RawIngredient]) -> RawMacros {
    let total: f64 = ingredients.iter().map(|i| i.quantita_g).sum();
    RawMacros {
        kcal: total * 13.0 / 10.0,
        proteine: total / 10.0,
        carboidrati: total * 3.0 / 10.0,
        lipidi: total / 100.0,
    }
}

fn ingredient(name: &str, qty: f64) -> RawIngredient {
    RawIngredient {
        nome_ingrediente: name.to_string(),
        quantita_g: qty,
        unita_di_misura: "g".to_string(),
    }
}

fn meal_json(recipe: &str, recipe_id: Option<i64>, ingredients: Vec<RawIngredient>) -> Value {
    json!({
        "ricetta": { "nome": recipe, "ricetta_id": recipe_id },
        "riproporzionata": {
            "macro_riproporzionate": macros_for(&ingredients),
            "ingredienti_riproporzionati": ingredients,
        }
    })
}

fn sample_days() -> Map<String, Value> {
    json!({
        "domenica": {
            "cena": meal_json("Minestrone", Some(9), vec![ingredient("verdure", 200.0)])
        },
        "lunedì": {
            "pranzo": meal_json("Riso in bianco", Some(7), vec![ingredient("riso", 100.0)]),
            "cena": meal_json("Pasta e ceci", Some(8), vec![ingredient("pasta", 80.0), ingredient("ceci", 60.0)])
        },
        "martedì": {
            "spuntino": meal_json("Frutta", None, vec![ingredient("mela", 150.0)])
        },
        "giovedì": {
            "pranzo": { "ricetta": { "nome": "Incompleta", "ricetta_id": 3 } }
        }
    })
    .as_object()
    .cloned()
    .unwrap()
}

/// In-memory backend that answers immediately.
#[derive(Default)]
struct FakeBackend {
    days: Mutex<Map<String, Value>>,
    fetch_fails: AtomicBool,
    fetch_malformed: AtomicBool,
    recalc_fails: AtomicBool,
    save_fails: AtomicBool,
    recalc_calls: Mutex<Vec<RecalculateMacrosRequest>>,
    saves: Mutex<Vec<SaveWeeklyPlanRequest>>,
    fetch_count: AtomicUsize,
}

impl FakeBackend {
    fn with_days(days: Map<String, Value>) -> Self {
        let backend = FakeBackend::default();
        *backend.days.lock().unwrap() = days;
        backend
    }

    fn envelope(&self) -> WeeklyPlanEnvelope {
        WeeklyPlanEnvelope {
            piano_settimanale: WeeklyPlanDocument {
                piano_settimanale: Some(self.days.lock().unwrap().clone()),
            },
        }
    }
}

#[async_trait]
impl PlanBackend for FakeBackend {
    async fn fetch_weekly_plan(&self, _user_id: &str) -> Result<WeeklyPlanEnvelope, ApiConnectionError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.fetch_fails.load(Ordering::SeqCst) {
            return Err(ApiConnectionError::Http {
                status: StatusCode::NOT_FOUND,
                message: "Piano non trovato".to_string(),
            });
        }
        if self.fetch_malformed.load(Ordering::SeqCst) {
            return parse_body(r#"{"piani": {"lunedì": {}}}"#);
        }
        Ok(self.envelope())
    }

    async fn recalculate_macros(
        &self,
        request: &RecalculateMacrosRequest,
    ) -> Result<RecalculateMacrosResponse, ApiConnectionError> {
        self.recalc_calls.lock().unwrap().push(request.clone());
        if self.recalc_fails.load(Ordering::SeqCst) {
            return Err(ApiConnectionError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "boom".to_string(),
            });
        }
        Ok(RecalculateMacrosResponse {
            macro_riproporzionate: macros_for(&request.ingredienti_riproporzionati),
        })
    }

    async fn save_weekly_plan(
        &self,
        _user_id: &str,
        request: &SaveWeeklyPlanRequest,
    ) -> Result<(), ApiConnectionError> {
        if self.save_fails.load(Ordering::SeqCst) {
            return Err(ApiConnectionError::Http {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "try later".to_string(),
            });
        }
        self.saves.lock().unwrap().push(request.clone());

        // Store it the way the server would, with macros derived again.
        let mut stored = request.piano_settimanale.clone();
        for meals in stored.values_mut() {
            for meal in meals.as_object_mut().unwrap().values_mut() {
                let scaled = meal.get_mut("riproporzionata").unwrap();
                let ingredients: Vec<RawIngredient> =
                    serde_json::from_value(scaled["ingredienti_riproporzionati"].clone()).unwrap();
                scaled["macro_riproporzionate"] = serde_json::to_value(macros_for(&ingredients)).unwrap();
            }
        }
        *self.days.lock().unwrap() = stored;
        Ok(())
    }
}

type Reply = Result<RecalculateMacrosResponse, ApiConnectionError>;

/// Backend whose recompute calls wait until the test releases them.
struct GatedBackend {
    base: FakeBackend,
    pending: Mutex<Vec<(RecalculateMacrosRequest, oneshot::Sender<Reply>)>>,
}

impl GatedBackend {
    fn new() -> Self {
        GatedBackend {
            base: FakeBackend::with_days(sample_days()),
            pending: Mutex::new(Vec::new()),
        }
    }

    fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    async fn wait_for_pending(&self, n: usize) {
        while self.pending_len() < n {
            tokio::task::yield_now().await;
        }
    }

    /// Release the pending request matching `pick` with the fake macro math.
    fn release<F: Fn(&RecalculateMacrosRequest) -> bool>(&self, pick: F) {
        let mut pending = self.pending.lock().unwrap();
        let index = pending.iter().position(|(req, _)| pick(req)).expect("no matching request");
        let (request, tx) = pending.remove(index);
        let _ = tx.send(Ok(RecalculateMacrosResponse {
            macro_riproporzionate: macros_for(&request.ingredienti_riproporzionati),
        }));
    }

    fn fail<F: Fn(&RecalculateMacrosRequest) -> bool>(&self, pick: F) {
        let mut pending = self.pending.lock().unwrap();
        let index = pending.iter().position(|(req, _)| pick(req)).expect("no matching request");
        let (_, tx) = pending.remove(index);
        let _ = tx.send(Err(ApiConnectionError::Parse("missing macro_riproporzionate".to_string())));
    }
}

#[async_trait]
impl PlanBackend for GatedBackend {
    async fn fetch_weekly_plan(&self, user_id: &str) -> Result<WeeklyPlanEnvelope, ApiConnectionError> {
        self.base.fetch_weekly_plan(user_id).await
    }

    async fn recalculate_macros(
        &self,
        request: &RecalculateMacrosRequest,
    ) -> Result<RecalculateMacrosResponse, ApiConnectionError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push((request.clone(), tx));
        rx.await
            .unwrap_or_else(|_| Err(ApiConnectionError::Parse("request abandoned".to_string())))
    }

    async fn save_weekly_plan(
        &self,
        user_id: &str,
        request: &SaveWeeklyPlanRequest,
    ) -> Result<(), ApiConnectionError> {
        self.base.save_weekly_plan(user_id, request).await
    }
}

fn first_qty(request: &RecalculateMacrosRequest) -> f64 {
    request.ingredienti_riproporzionati[0].quantita_g
}

async fn loaded_editor() -> PlanEditor<FakeBackend> {
    let editor = PlanEditor::new(
        FakeBackend::with_days(sample_days()),
        "5c5c0250-34fb-489d-8f1f-f0d96daa05d8",
        RecomputeOrdering::LastCompleted,
    );
    editor.load_plan().await.unwrap();
    editor
}

async fn loaded_gated(ordering: RecomputeOrdering) -> Arc<PlanEditor<GatedBackend>> {
    let editor = Arc::new(PlanEditor::new(GatedBackend::new(), "u-1", ordering));
    editor.load_plan().await.unwrap();
    editor
}

#[tokio::test]
async fn test_load_orders_days_and_drops_incomplete_meals() {
    let editor = loaded_editor().await;
    let store = editor.store().await;
    assert_eq!(store.load_status(), &LoadStatus::Ready);

    let plan = store.edited().unwrap();
    let days: Vec<&str> = plan.days.iter().map(|d| d.day_name.as_str()).collect();
    assert_eq!(days, vec!["lunedì", "martedì", "giovedì", "domenica"]);
    assert!(plan.days[2].meals.is_empty());

    let lunch = &plan.days[0].meals[0];
    assert_eq!(lunch.meal_name, "pranzo");
    assert_eq!(lunch.recipe_id, Some(7));
    assert_eq!(lunch.macro_totals.kcal, 130.0);
    assert_eq!(store.snapshot(), store.edited());
    assert!(!store.is_dirty());
}

#[tokio::test]
async fn test_malformed_payload_fails_load() {
    let editor = loaded_editor().await;
    editor.backend().fetch_malformed.store(true, Ordering::SeqCst);

    let err = editor.load_plan().await.unwrap_err();
    assert!(matches!(err, EditorError::Api(ApiConnectionError::Parse(_))));

    let store = editor.store().await;
    assert!(matches!(store.load_status(), LoadStatus::Failed(_)));
    assert!(store.snapshot().is_none());
    assert!(store.edited().is_none());
}

#[tokio::test]
async fn test_load_failure_clears_plan() {
    let editor = loaded_editor().await;
    editor.backend().fetch_fails.store(true, Ordering::SeqCst);

    let err = editor.load_plan().await.unwrap_err();
    assert!(matches!(
        err,
        EditorError::Api(ApiConnectionError::Http { status, .. }) if status == StatusCode::NOT_FOUND
    ));

    let store = editor.store().await;
    assert!(matches!(store.load_status(), LoadStatus::Failed(msg) if msg.contains("Piano non trovato")));
    assert!(store.snapshot().is_none());
    assert!(store.edited().is_none());
    drop(store);

    assert!(editor.render().await.starts_with("Error:"));
    assert!(matches!(
        editor.on_quantity_edit(0, 0, 0, "10").await,
        Err(EditorError::NotLoaded)
    ));
}

#[tokio::test]
async fn test_quantity_edit_recomputes_only_that_meal() {
    let editor = loaded_editor().await;
    editor.on_quantity_edit(0, 0, 0, "150").await.unwrap();

    let calls = editor.backend().recalc_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].ricetta_id, 7);
    assert_eq!(calls[0].ingredienti_riproporzionati, vec![ingredient("riso", 150.0)]);

    let store = editor.store().await;
    let plan = store.edited().unwrap();
    let lunch = &plan.days[0].meals[0];
    assert_eq!(lunch.ingredients[0].quantity_g, 150.0);
    assert_eq!(lunch.macro_totals.kcal, 195.0);
    assert_eq!(plan.days[0].meals[1], store.snapshot().unwrap().days[0].meals[1]);
    assert!(store.is_dirty());
    assert!(store.can_save());
    assert_eq!(store.save_status(), &SaveStatus::Idle);
}

#[tokio::test]
async fn test_recompute_sends_full_ingredient_list() {
    let editor = loaded_editor().await;
    editor.on_quantity_edit(0, 1, 1, "75,5").await.unwrap();

    let calls = editor.backend().recalc_calls.lock().unwrap().clone();
    assert_eq!(calls[0].ricetta_id, 8);
    assert_eq!(
        calls[0].ingredienti_riproporzionati,
        vec![ingredient("pasta", 80.0), ingredient("ceci", 75.5)]
    );
}

#[tokio::test]
async fn test_garbage_quantity_becomes_zero() {
    let editor = loaded_editor().await;
    editor.on_quantity_edit(0, 0, 0, "abc").await.unwrap();

    let store = editor.store().await;
    let lunch = &store.edited().unwrap().days[0].meals[0];
    assert_eq!(lunch.ingredients[0].quantity_g, 0.0);
    assert_eq!(lunch.macro_totals.kcal, 0.0);
    assert_eq!(
        store.input_buffer(plan_editor::editor::IngredientKey::new(0, 0, 0)),
        Some("abc")
    );
}

#[tokio::test]
async fn test_meal_without_recipe_skips_recompute() {
    let editor = loaded_editor().await;
    editor.on_quantity_edit(1, 0, 0, "200").await.unwrap();

    assert!(editor.backend().recalc_calls.lock().unwrap().is_empty());
    let store = editor.store().await;
    let snack = &store.edited().unwrap().days[1].meals[0];
    assert_eq!(snack.ingredients[0].quantity_g, 200.0);
    assert!(store.is_dirty());
}

#[tokio::test]
async fn test_failed_recompute_keeps_quantity() {
    let editor = loaded_editor().await;
    editor.backend().recalc_fails.store(true, Ordering::SeqCst);

    editor.on_quantity_edit(0, 0, 0, "150").await.unwrap();

    let store = editor.store().await;
    let lunch = &store.edited().unwrap().days[0].meals[0];
    assert_eq!(lunch.ingredients[0].quantity_g, 150.0);
    assert_eq!(lunch.macro_totals.kcal, 130.0);
    assert!(!store.is_recomputing(MealKey::new(0, 0)));
    assert!(store.meal_error(MealKey::new(0, 0)).unwrap().contains("boom"));
    assert_eq!(store.save_status(), &SaveStatus::Idle);
}

#[tokio::test]
async fn test_invalid_index_is_reported() {
    let editor = loaded_editor().await;
    let err = editor.on_quantity_edit(0, 0, 5, "10").await.unwrap_err();
    assert!(matches!(
        err,
        EditorError::InvalidIndex {
            day: 0,
            meal: 0,
            ingredient: 5
        }
    ));
    assert!(!editor.is_dirty().await);
}

#[tokio::test]
async fn test_save_promotes_edited_copy() {
    let editor = loaded_editor().await;
    editor.on_quantity_edit(0, 0, 0, "150").await.unwrap();
    assert!(editor.is_dirty().await);

    editor.save_plan().await.unwrap();

    let store = editor.store().await;
    assert!(!store.is_dirty());
    assert_eq!(store.snapshot(), store.edited());
    assert_eq!(store.save_status(), &SaveStatus::Saved);

    let saves = editor.backend().saves.lock().unwrap().clone();
    assert_eq!(saves.len(), 1);
    let body = serde_json::to_value(&saves[0]).unwrap();
    let lunch = &body["piano_settimanale"]["lunedì"]["pranzo"];
    assert_eq!(lunch["ricetta"], json!({ "nome": "Riso in bianco", "ricetta_id": 7 }));
    assert_eq!(
        lunch["riproporzionata"]["ingredienti_riproporzionati"][0]["quantita_g"],
        json!(150.0)
    );
    assert!(lunch["riproporzionata"].get("macro_riproporzionate").is_none());
}

#[tokio::test]
async fn test_save_rejected_when_clean() {
    let editor = loaded_editor().await;
    let err = editor.save_plan().await.unwrap_err();
    assert!(matches!(err, EditorError::SaveRejected(Rejection::Clean)));
    assert!(editor.backend().saves.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_save_leaves_both_copies_untouched() {
    let editor = loaded_editor().await;
    editor.on_quantity_edit(0, 0, 0, "150").await.unwrap();
    editor.backend().save_fails.store(true, Ordering::SeqCst);

    let (snapshot_before, edited_before) = {
        let store = editor.store().await;
        (store.snapshot().cloned(), store.edited().cloned())
    };

    assert!(editor.save_plan().await.is_err());

    {
        let store = editor.store().await;
        assert_eq!(store.snapshot().cloned(), snapshot_before);
        assert_eq!(store.edited().cloned(), edited_before);
        assert!(matches!(store.save_status(), SaveStatus::Failed(msg) if msg.contains("try later")));
        assert!(store.is_dirty());
    }

    // Retry once the backend is back.
    editor.backend().save_fails.store(false, Ordering::SeqCst);
    editor.save_plan().await.unwrap();
    assert!(!editor.is_dirty().await);
}

#[tokio::test]
async fn test_save_and_reload_round_trip() {
    let editor = loaded_editor().await;
    editor.on_quantity_edit(0, 1, 0, "90").await.unwrap();
    editor.on_quantity_edit(3, 0, 0, "250").await.unwrap();
    editor.save_plan().await.unwrap();

    let saved_snapshot = editor.store().await.snapshot().cloned().unwrap();

    editor.load_plan().await.unwrap();
    assert_eq!(editor.backend().fetch_count.load(Ordering::SeqCst), 2);

    let store = editor.store().await;
    assert_eq!(store.snapshot(), Some(&saved_snapshot));
    assert!(!store.is_dirty());
}

#[tokio::test]
async fn test_two_quick_edits_last_completed_response_wins() {
    let editor = loaded_gated(RecomputeOrdering::LastCompleted).await;

    let first = tokio::spawn({
        let editor = editor.clone();
        async move { editor.on_quantity_edit(0, 0, 0, "150").await }
    });
    editor.backend().wait_for_pending(1).await;

    {
        // Quantity is applied before the backend answers.
        let store = editor.store().await;
        let lunch = &store.edited().unwrap().days[0].meals[0];
        assert_eq!(lunch.ingredients[0].quantity_g, 150.0);
        assert_eq!(lunch.macro_totals.kcal, 130.0);
        assert!(store.is_recomputing(MealKey::new(0, 0)));
    }

    let second = tokio::spawn({
        let editor = editor.clone();
        async move { editor.on_quantity_edit(0, 0, 0, "175").await }
    });
    editor.backend().wait_for_pending(2).await;

    // The later request finishes first.
    editor.backend().release(|r| first_qty(r) == 175.0);
    second.await.unwrap().unwrap();
    assert!(editor.store().await.is_recomputing(MealKey::new(0, 0)));

    editor.backend().release(|r| first_qty(r) == 150.0);
    first.await.unwrap().unwrap();

    let store = editor.store().await;
    let lunch = &store.edited().unwrap().days[0].meals[0];
    assert_eq!(lunch.ingredients[0].quantity_g, 175.0);
    assert_eq!(lunch.macro_totals.kcal, 195.0);
    assert!(!store.any_recomputing());
}

#[tokio::test]
async fn test_two_quick_edits_latest_issued_drops_stale_response() {
    let editor = loaded_gated(RecomputeOrdering::LatestIssued).await;

    let first = tokio::spawn({
        let editor = editor.clone();
        async move { editor.on_quantity_edit(0, 0, 0, "150").await }
    });
    editor.backend().wait_for_pending(1).await;
    let second = tokio::spawn({
        let editor = editor.clone();
        async move { editor.on_quantity_edit(0, 0, 0, "175").await }
    });
    editor.backend().wait_for_pending(2).await;

    editor.backend().release(|r| first_qty(r) == 175.0);
    second.await.unwrap().unwrap();
    editor.backend().release(|r| first_qty(r) == 150.0);
    first.await.unwrap().unwrap();

    let store = editor.store().await;
    let lunch = &store.edited().unwrap().days[0].meals[0];
    assert_eq!(lunch.ingredients[0].quantity_g, 175.0);
    assert_eq!(lunch.macro_totals.kcal, 227.5);
}

#[tokio::test]
async fn test_concurrent_meals_stay_independent() {
    let editor = loaded_gated(RecomputeOrdering::LastCompleted).await;

    let lunch_edit = tokio::spawn({
        let editor = editor.clone();
        async move { editor.on_quantity_edit(0, 0, 0, "150").await }
    });
    editor.backend().wait_for_pending(1).await;

    // The other meal is still editable while lunch is recomputing.
    let dinner_edit = tokio::spawn({
        let editor = editor.clone();
        async move { editor.on_quantity_edit(0, 1, 0, "100").await }
    });
    editor.backend().wait_for_pending(2).await;

    editor.backend().release(|r| r.ricetta_id == 8);
    dinner_edit.await.unwrap().unwrap();

    {
        let store = editor.store().await;
        let plan = store.edited().unwrap();
        assert!(store.is_recomputing(MealKey::new(0, 0)));
        assert!(!store.is_recomputing(MealKey::new(0, 1)));
        assert_eq!(plan.days[0].meals[0].macro_totals.kcal, 130.0);
        assert_eq!(plan.days[0].meals[1].macro_totals.kcal, 208.0);
    }

    editor.backend().fail(|r| r.ricetta_id == 7);
    lunch_edit.await.unwrap().unwrap();

    let store = editor.store().await;
    let plan = store.edited().unwrap();
    assert_eq!(plan.days[0].meals[0].macro_totals.kcal, 130.0);
    assert_eq!(plan.days[0].meals[0].ingredients[0].quantity_g, 150.0);
    assert_eq!(plan.days[0].meals[1].macro_totals.kcal, 208.0);
    assert!(store.meal_error(MealKey::new(0, 0)).is_some());
    assert!(store.meal_error(MealKey::new(0, 1)).is_none());
    assert!(!store.any_recomputing());
}

#[tokio::test]
async fn test_save_blocked_while_recompute_in_flight() {
    let editor = loaded_gated(RecomputeOrdering::LastCompleted).await;

    let edit = tokio::spawn({
        let editor = editor.clone();
        async move { editor.on_quantity_edit(0, 0, 0, "150").await }
    });
    editor.backend().wait_for_pending(1).await;

    let err = editor.save_plan().await.unwrap_err();
    assert!(matches!(err, EditorError::SaveRejected(Rejection::RecomputeInFlight)));
    assert!(editor.backend().base.saves.lock().unwrap().is_empty());

    editor.backend().release(|_| true);
    edit.await.unwrap().unwrap();

    editor.save_plan().await.unwrap();
    assert_eq!(editor.backend().base.saves.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reload_discards_in_flight_recompute() {
    let editor = loaded_gated(RecomputeOrdering::LastCompleted).await;

    let edit = tokio::spawn({
        let editor = editor.clone();
        async move { editor.on_quantity_edit(0, 0, 0, "150").await }
    });
    editor.backend().wait_for_pending(1).await;

    editor.load_plan().await.unwrap();
    assert!(!editor.store().await.any_recomputing());

    editor.backend().release(|_| true);
    edit.await.unwrap().unwrap();

    let store = editor.store().await;
    assert_eq!(store.edited().unwrap().days[0].meals[0].macro_totals.kcal, 130.0);
    assert!(!store.is_dirty());
}
