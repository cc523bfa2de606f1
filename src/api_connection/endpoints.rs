use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const WEEKLY_PLAN_PATH: &str = "/api/piani-nutrizionali/piani/piano-settimanale";
pub const RECALCULATE_MACROS_PATH: &str = "/api/ricette/recalculate-macros";

pub fn weekly_plan_url(base_url: &str, user_id: &str) -> String {
    format!(
        "{}{}/{}",
        base_url.trim_end_matches('/'),
        WEEKLY_PLAN_PATH,
        user_id
    )
}

pub fn recalculate_macros_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), RECALCULATE_MACROS_PATH)
}

fn zero_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn empty_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of `GET .../piano-settimanale/{user_id}`. The plan sits two levels
/// down under the same key.
#[derive(Debug, Deserialize, Clone)]
pub struct WeeklyPlanEnvelope {
    pub piano_settimanale: WeeklyPlanDocument,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WeeklyPlanDocument {
    /// Day name -> meal name -> meal. Kept untyped so that one malformed
    /// meal does not fail the whole payload.
    #[serde(default)]
    pub piano_settimanale: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RawMeal {
    pub ricetta: RawRecipe,
    pub riproporzionata: RawScaledRecipe,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RawRecipe {
    #[serde(default, deserialize_with = "empty_if_null")]
    pub nome: String,
    #[serde(default)]
    pub ricetta_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RawScaledRecipe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macro_riproporzionate: Option<RawMacros>,
    #[serde(default)]
    pub ingredienti_riproporzionati: Vec<RawIngredient>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct RawMacros {
    #[serde(default, deserialize_with = "zero_if_null")]
    pub kcal: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub proteine: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub carboidrati: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub lipidi: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RawIngredient {
    #[serde(default, deserialize_with = "empty_if_null")]
    pub nome_ingrediente: String,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub quantita_g: f64,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub unita_di_misura: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct RecalculateMacrosRequest {
    pub ricetta_id: i64,
    pub ingredienti_riproporzionati: Vec<RawIngredient>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecalculateMacrosResponse {
    pub macro_riproporzionate: RawMacros,
}

/// Body of `PUT .../piano-settimanale/{user_id}`.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SaveWeeklyPlanRequest {
    pub piano_settimanale: Map<String, Value>,
}
