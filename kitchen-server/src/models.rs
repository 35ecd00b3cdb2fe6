use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kitchen::{
    lookup::{normalize_name, rank_matches},
    models::{Recipe, RecipeContent, RecipeId, TimeCalculationMode},
    repository::RecipeRepository,
};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::database::{json_column, Database, FromRow};

impl FromRow for Recipe {
    /// Create a recipe from an sql row, provided by rusqlite, using named columns.
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let mode: String = row.get("time_calculation_mode")?;
        let time_calculation_mode = mode.parse::<TimeCalculationMode>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Self {
            id: row.get("recipe_id")?,
            owner: row.get("owner_id")?,
            content: RecipeContent {
                title: row.get("title")?,
                category: row.get("category")?,
                prep_time_minutes: row.get("prep_time_minutes")?,
                cook_time_minutes: row.get("cook_time_minutes")?,
                servings: row.get("servings")?,
                image_url: row.get("image_url")?,
                ingredients: json_column(row, "ingredients")?,
                steps: json_column(row, "steps")?,
                cooking_methods: json_column(row, "cooking_methods")?,
                notes: row.get("notes")?,
                time_calculation_mode,
            },
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// The JSON-encoded columns of a recipe: ingredients, steps and cooking methods.
fn json_columns(content: &RecipeContent) -> Result<(String, String, String)> {
    Ok((
        serde_json::to_string(&content.ingredients)?,
        serde_json::to_string(&content.steps)?,
        serde_json::to_string(&content.cooking_methods)?,
    ))
}

/// Every query is scoped by owner, so one user's recipes are invisible to everyone else.
#[async_trait]
impl RecipeRepository for Database {
    async fn list(&self, owner: &str) -> Result<Vec<Recipe>> {
        self.collect_rows(
            "SELECT * FROM Recipe WHERE owner_id = ? ORDER BY updated_at DESC",
            params![owner],
        )
    }

    async fn get(&self, owner: &str, id: RecipeId) -> Result<Option<Recipe>> {
        Ok(self
            .collect_rows(
                "SELECT * FROM Recipe WHERE owner_id = ? AND recipe_id = ?",
                params![owner, id],
            )?
            .pop())
    }

    async fn insert(&self, owner: &str, content: &RecipeContent) -> Result<RecipeId> {
        let (ingredients, steps, methods) = json_columns(content)?;
        let mode: &'static str = content.time_calculation_mode.into();
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO Recipe (
                owner_id, title, category, prep_time_minutes, cook_time_minutes, servings,
                image_url, ingredients, steps, cooking_methods, notes, time_calculation_mode,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                owner,
                content.title.trim(),
                content.category.trim(),
                content.prep_time_minutes,
                content.cook_time_minutes,
                content.servings,
                content.image_url,
                ingredients,
                steps,
                methods,
                content.notes,
                mode,
                Utc::now(),
            ],
        )?;
        let recipe_id = conn.last_insert_rowid();
        tracing::info!(recipe_id, owner, "Created recipe");
        Ok(recipe_id)
    }

    async fn update(&self, owner: &str, id: RecipeId, content: &RecipeContent) -> Result<bool> {
        let (ingredients, steps, methods) = json_columns(content)?;
        let mode: &'static str = content.time_calculation_mode.into();
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE Recipe SET
                title = ?3, category = ?4, prep_time_minutes = ?5, cook_time_minutes = ?6,
                servings = ?7, image_url = ?8, ingredients = ?9, steps = ?10,
                cooking_methods = ?11, notes = ?12, time_calculation_mode = ?13, updated_at = ?14
            WHERE owner_id = ?1 AND recipe_id = ?2",
            params![
                owner,
                id,
                content.title.trim(),
                content.category.trim(),
                content.prep_time_minutes,
                content.cook_time_minutes,
                content.servings,
                content.image_url,
                ingredients,
                steps,
                methods,
                content.notes,
                mode,
                Utc::now(),
            ],
        )?;
        Ok(changed == 1)
    }

    async fn delete(&self, owner: &str, id: RecipeId) -> Result<bool> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "DELETE FROM Recipe WHERE owner_id = ? AND recipe_id = ?",
            params![owner, id],
        )?;
        if changed == 1 {
            tracing::info!(recipe_id = id, owner, "Deleted recipe");
        }
        Ok(changed == 1)
    }
}

/// A registered account. The password is only ever stored as a salted digest.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub password_salt: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl FromRow for User {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get("user_id")?,
            email: row.get("email")?,
            password_salt: row.get("password_salt")?,
            password_hash: row.get("password_hash")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl User {
    /// Emails compare case-insensitively.
    pub fn find_by_email(db: &Database, email: &str) -> Result<Option<User>> {
        Ok(db
            .collect_rows("SELECT * FROM User WHERE email = ?", params![email.trim()])?
            .pop())
    }

    /// Add the account. Returns false when the email is already registered.
    pub fn insert(&self, db: &Database) -> Result<bool> {
        let conn = db.pool.get()?;
        let changed = conn.execute(
            "INSERT INTO User (user_id, email, password_salt, password_hash, created_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (email) DO NOTHING",
            params![
                self.user_id,
                self.email.trim(),
                self.password_salt,
                self.password_hash,
                self.created_at,
            ],
        )?;
        Ok(changed == 1)
    }

    /// Remove the account along with every recipe and draft it owns.
    pub fn delete_account(db: &Database, user_id: &str) -> Result<()> {
        let mut conn = db.pool.get()?;
        let tx = conn.transaction()?;
        let drafts = tx.execute("DELETE FROM Draft WHERE user_id = ?", params![user_id])?;
        let recipes = tx.execute("DELETE FROM Recipe WHERE owner_id = ?", params![user_id])?;
        tx.execute("DELETE FROM User WHERE user_id = ?", params![user_id])?;
        tx.commit()?;
        tracing::info!(user_id, recipes, drafts, "Deleted account");
        Ok(())
    }
}

/// An entry in the shared ingredient catalogue.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ingredient {
    pub ingredient_id: i64,
    pub name: String,
    pub category: Option<String>,
}

impl FromRow for Ingredient {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            ingredient_id: row.get("ingredient_id")?,
            name: row.get("name")?,
            category: row.get("category")?,
        })
    }
}

impl Ingredient {
    pub fn list(db: &Database) -> Result<Vec<Ingredient>> {
        db.collect_rows("SELECT * FROM Ingredient ORDER BY name", [])
    }

    /// Best matches first. See [`rank_matches`].
    pub fn search(db: &Database, query: &str, limit: usize) -> Result<Vec<Ingredient>> {
        let all = Self::list(db)?;
        let names = all.iter().map(|i| i.name.as_str()).collect::<Vec<_>>();
        Ok(rank_matches(&names, query, limit)
            .into_iter()
            .filter_map(|name| all.iter().find(|i| i.name == *name).cloned())
            .collect())
    }
}

/// An entry in the shared utensil catalogue.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Utensil {
    pub utensil_id: i64,
    pub name: String,
}

impl FromRow for Utensil {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            utensil_id: row.get("utensil_id")?,
            name: row.get("name")?,
        })
    }
}

impl Utensil {
    pub fn list(db: &Database) -> Result<Vec<Utensil>> {
        db.collect_rows("SELECT * FROM Utensil ORDER BY name", [])
    }

    pub fn search(db: &Database, query: &str, limit: usize) -> Result<Vec<Utensil>> {
        let all = Self::list(db)?;
        let names = all.iter().map(|u| u.name.as_str()).collect::<Vec<_>>();
        Ok(rank_matches(&names, query, limit)
            .into_iter()
            .filter_map(|name| all.iter().find(|u| u.name == *name).cloned())
            .collect())
    }

    /// Add a utensil, or return the existing one with the same name in any letter case.
    pub fn add(db: &Database, name: &str) -> Result<Utensil> {
        let name = normalize_name(name);
        let conn = db.pool.get()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO Utensil (name) VALUES (?)",
            params![name],
        )?;
        if inserted == 1 {
            tracing::info!(%name, "Added utensil");
        }
        let utensil = conn
            .query_row(
                "SELECT * FROM Utensil WHERE name = ?",
                params![name],
                Utensil::from_row,
            )
            .optional()?;
        utensil.ok_or_else(|| anyhow::anyhow!("Utensil {name} vanished after insert"))
    }
}
