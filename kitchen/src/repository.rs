use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Recipe, RecipeContent, RecipeId};

/// Recipe storage, always scoped to one owner.
///
/// Implementations must never return or modify another owner's recipes: a recipe that
/// exists but belongs to someone else behaves exactly like a missing one.
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    async fn list(&self, owner: &str) -> Result<Vec<Recipe>>;

    async fn get(&self, owner: &str, id: RecipeId) -> Result<Option<Recipe>>;

    async fn insert(&self, owner: &str, content: &RecipeContent) -> Result<RecipeId>;

    /// Returns false when there is no such recipe for this owner.
    async fn update(&self, owner: &str, id: RecipeId, content: &RecipeContent) -> Result<bool>;

    /// Returns false when there is no such recipe for this owner.
    async fn delete(&self, owner: &str, id: RecipeId) -> Result<bool>;
}

#[cfg(test)]
pub(crate) use memory::MemoryRecipeRepository;

#[cfg(test)]
mod memory {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub(crate) struct MemoryRecipeRepository {
        recipes: Mutex<Vec<Recipe>>,
    }

    impl MemoryRecipeRepository {
        pub(crate) fn len(&self) -> usize {
            self.recipes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RecipeRepository for MemoryRecipeRepository {
        async fn list(&self, owner: &str) -> Result<Vec<Recipe>> {
            let recipes = self.recipes.lock().unwrap();
            Ok(recipes.iter().filter(|r| r.owner == owner).cloned().collect())
        }

        async fn get(&self, owner: &str, id: RecipeId) -> Result<Option<Recipe>> {
            let recipes = self.recipes.lock().unwrap();
            Ok(recipes
                .iter()
                .find(|r| r.owner == owner && r.id == id)
                .cloned())
        }

        async fn insert(&self, owner: &str, content: &RecipeContent) -> Result<RecipeId> {
            let mut recipes = self.recipes.lock().unwrap();
            let id = recipes.iter().map(|r| r.id).max().unwrap_or(0) + 1;
            let now = chrono::Utc::now();
            recipes.push(Recipe {
                id,
                owner: owner.to_string(),
                content: content.clone(),
                created_at: now,
                updated_at: now,
            });
            Ok(id)
        }

        async fn update(&self, owner: &str, id: RecipeId, content: &RecipeContent) -> Result<bool> {
            let mut recipes = self.recipes.lock().unwrap();
            match recipes.iter_mut().find(|r| r.owner == owner && r.id == id) {
                Some(recipe) => {
                    recipe.content = content.clone();
                    recipe.updated_at = chrono::Utc::now();
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn delete(&self, owner: &str, id: RecipeId) -> Result<bool> {
            let mut recipes = self.recipes.lock().unwrap();
            let before = recipes.len();
            recipes.retain(|r| !(r.owner == owner && r.id == id));
            Ok(recipes.len() != before)
        }
    }
}
