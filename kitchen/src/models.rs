use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

pub type RecipeId = i64;
pub type UserId = String;

/// Stable identity of an ingredient within one recipe.
///
/// Steps refer to ingredients through these keys rather than through list positions,
/// so reordering the ingredient list never changes what a step points at.
/// Keys are allocated by [`crate::form::RecipeForm`] and only ever grow while a form is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngredientKey(pub u32);

impl std::fmt::Display for IngredientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimerType {
    Prep,
    Cook,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
pub enum TimeCalculationMode {
    #[default]
    #[serde(rename = "manual")]
    #[strum(serialize = "manual")]
    Manual,
    #[serde(rename = "auto-timers")]
    #[strum(serialize = "auto-timers")]
    AutoTimers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub key: IngredientKey,
    /// Reference into the shared ingredient catalogue, when the name was picked from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredient_id: Option<i64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub description: String,
    #[serde(default)]
    pub ingredient_keys: Vec<IngredientKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_type: Option<TimerType>,
}

impl RecipeStep {
    /// Countdown length in seconds, zero when the step has no timer.
    pub fn timer_seconds(&self) -> u32 {
        self.timer_minutes.unwrap_or(0).saturating_mul(60)
    }
}

/// Everything about a recipe the owner can edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeContent {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub prep_time_minutes: u32,
    #[serde(default)]
    pub cook_time_minutes: u32,
    #[serde(default = "default_servings")]
    pub servings: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub steps: Vec<RecipeStep>,
    #[serde(default)]
    pub cooking_methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub time_calculation_mode: TimeCalculationMode,
}

fn default_servings() -> u32 {
    4
}

impl Default for RecipeContent {
    fn default() -> Self {
        Self {
            title: String::new(),
            category: String::new(),
            prep_time_minutes: 0,
            cook_time_minutes: 0,
            servings: default_servings(),
            image_url: None,
            ingredients: vec![],
            steps: vec![],
            cooking_methods: vec![],
            notes: None,
            time_calculation_mode: TimeCalculationMode::Manual,
        }
    }
}

impl RecipeContent {
    pub fn ingredient(&self, key: IngredientKey) -> Option<&RecipeIngredient> {
        self.ingredients.iter().find(|i| i.key == key)
    }

    pub fn total_time_minutes(&self) -> u32 {
        self.prep_time_minutes.saturating_add(self.cook_time_minutes)
    }
}

/// A stored recipe. Owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub owner: UserId,
    #[serde(flatten)]
    pub content: RecipeContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The identity a signed-in user is known by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub email: String,
}
