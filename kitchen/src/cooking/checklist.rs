use std::collections::BTreeSet;

use itertools::Itertools;
use serde::Serialize;

use crate::models::{IngredientKey, RecipeContent, RecipeStep};

/// One ingredient line as shown next to a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecklistItem {
    pub key: IngredientKey,
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub checked: bool,
}

/// Ingredients ticked off during one cooking session.
///
/// The set spans the whole session rather than a single step, so an ingredient checked on
/// one step shows up checked on every other step that uses it.
#[derive(Debug, Clone, Default)]
pub struct IngredientChecklist {
    checked: BTreeSet<IngredientKey>,
}

impl IngredientChecklist {
    /// Flip membership of `key`. Returns whether it is now checked.
    pub fn toggle(&mut self, key: IngredientKey) -> bool {
        if self.checked.remove(&key) {
            false
        } else {
            self.checked.insert(key);
            true
        }
    }

    pub fn is_checked(&self, key: IngredientKey) -> bool {
        self.checked.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.checked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checked.is_empty()
    }

    /// The ingredients `step` uses, in the step's order, with their checked state.
    pub fn view(&self, recipe: &RecipeContent, step: &RecipeStep) -> Vec<ChecklistItem> {
        step.ingredient_keys
            .iter()
            .unique()
            .filter_map(|key| recipe.ingredient(*key))
            .map(|ingredient| ChecklistItem {
                key: ingredient.key,
                name: ingredient.name.clone(),
                quantity: ingredient.quantity,
                unit: ingredient.unit.clone(),
                checked: self.is_checked(ingredient.key),
            })
            .collect()
    }
}
