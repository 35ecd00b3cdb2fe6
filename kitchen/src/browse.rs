use itertools::Itertools;
use serde::{Deserialize, Deserializer};

use crate::models::Recipe;

/// Filters for browsing one owner's recipes. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecipeFilter {
    /// Free text, matched against title, notes and ingredient names.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cooking_method: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub max_total_minutes: Option<u32>,
}

impl RecipeFilter {
    pub fn matches(&self, recipe: &Recipe) -> bool {
        let content = &recipe.content;
        if let Some(query) = non_blank(&self.query) {
            let query = query.to_lowercase();
            let hit = content.title.to_lowercase().contains(&query)
                || content
                    .notes
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(&query))
                || content
                    .ingredients
                    .iter()
                    .any(|i| i.name.to_lowercase().contains(&query));
            if !hit {
                return false;
            }
        }
        if let Some(category) = non_blank(&self.category) {
            if !content.category.trim().eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(method) = non_blank(&self.cooking_method) {
            if !content
                .cooking_methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(method))
            {
                return false;
            }
        }
        if let Some(max) = self.max_total_minutes {
            if content.total_time_minutes() > max {
                return false;
            }
        }
        true
    }

    /// Keep the matching recipes, most recently updated first.
    pub fn apply(&self, recipes: Vec<Recipe>) -> Vec<Recipe> {
        recipes
            .into_iter()
            .filter(|r| self.matches(r))
            .sorted_by(|a, b| b.updated_at.cmp(&a.updated_at))
            .collect()
    }
}

/// HTML forms submit untouched number inputs as empty strings.
fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// The distinct categories in use, alphabetically, compared case-insensitively.
pub fn categories(recipes: &[Recipe]) -> Vec<String> {
    recipes
        .iter()
        .map(|r| r.content.category.trim())
        .filter(|c| !c.is_empty())
        .unique_by(|c| c.to_lowercase())
        .sorted_by_key(|c| c.to_lowercase())
        .map(str::to_string)
        .collect()
}
