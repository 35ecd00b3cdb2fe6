use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    drafts::{DraftKey, DraftStorage, DraftStore},
    models::{
        IngredientKey, RecipeContent, RecipeId, RecipeIngredient, RecipeStep,
        TimeCalculationMode, TimerType,
    },
    repository::RecipeRepository,
    validation::ValidationError,
};

/// Sum step timers into `(prep, cook)` minutes. Steps without a timer type count as prep.
pub fn auto_times(steps: &[RecipeStep]) -> (u32, u32) {
    steps
        .iter()
        .filter_map(|s| s.timer_minutes.map(|m| (m, s.timer_type.unwrap_or(TimerType::Prep))))
        .fold((0, 0), |(prep, cook), (minutes, kind)| match kind {
            TimerType::Prep => (prep.saturating_add(minutes), cook),
            TimerType::Cook => (prep, cook.saturating_add(minutes)),
        })
}

/// The editable state of the recipe form.
///
/// Serializes as plain [`RecipeContent`], which is also the draft snapshot format.
/// In [`TimeCalculationMode::AutoTimers`] the prep and cook times are derived from the
/// step timers after every change to the steps, and the time setters are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecipeContent", into = "RecipeContent")]
pub struct RecipeForm {
    content: RecipeContent,
    next_key: u32,
}

impl Default for RecipeForm {
    fn default() -> Self {
        Self::from_content(RecipeContent::default())
    }
}

impl From<RecipeContent> for RecipeForm {
    fn from(content: RecipeContent) -> Self {
        Self::from_content(content)
    }
}

impl From<RecipeForm> for RecipeContent {
    fn from(form: RecipeForm) -> Self {
        form.content
    }
}

impl RecipeForm {
    pub fn from_content(mut content: RecipeContent) -> Self {
        for step in &mut content.steps {
            dedup_keys(step);
        }
        let next_key = content
            .ingredients
            .iter()
            .map(|i| i.key.0)
            .max()
            .map_or(Some(0), |max| max.checked_add(1));
        let mut form = Self {
            content,
            next_key: next_key.unwrap_or(u32::MAX),
        };
        if next_key.is_none() {
            form.rekey();
        }
        form.recompute_times();
        form
    }

    /// Renumber ingredient keys from zero in list order, keeping step references intact.
    /// References to keys no ingredient carries are dropped.
    fn rekey(&mut self) {
        let renumbered: HashMap<IngredientKey, IngredientKey> = self
            .content
            .ingredients
            .iter_mut()
            .zip(0..)
            .map(|(ingredient, n)| {
                let old = ingredient.key;
                ingredient.key = IngredientKey(n);
                (old, ingredient.key)
            })
            .collect();
        for step in &mut self.content.steps {
            step.ingredient_keys = step
                .ingredient_keys
                .iter()
                .filter_map(|k| renumbered.get(k).copied())
                .collect();
            dedup_keys(step);
        }
        self.next_key = self.content.ingredients.len() as u32;
    }

    /// A fresh ingredient line. Its key is replaced when it is added to a form.
    pub fn blank_ingredient() -> RecipeIngredient {
        RecipeIngredient {
            key: IngredientKey(0),
            ingredient_id: None,
            name: String::new(),
            quantity: None,
            unit: None,
        }
    }

    pub fn content(&self) -> &RecipeContent {
        &self.content
    }

    pub fn into_content(self) -> RecipeContent {
        self.content
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.content.title = title.into();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.content.category = category.into();
    }

    pub fn set_servings(&mut self, servings: u32) {
        self.content.servings = servings;
    }

    pub fn set_image_url(&mut self, image_url: Option<String>) {
        self.content.image_url = image_url.filter(|u| !u.trim().is_empty());
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.content.notes = notes.filter(|n| !n.trim().is_empty());
    }

    /// Returns false when the times are derived from the steps.
    pub fn set_prep_time(&mut self, minutes: u32) -> bool {
        if self.is_auto() {
            return false;
        }
        self.content.prep_time_minutes = minutes;
        true
    }

    /// Returns false when the times are derived from the steps.
    pub fn set_cook_time(&mut self, minutes: u32) -> bool {
        if self.is_auto() {
            return false;
        }
        self.content.cook_time_minutes = minutes;
        true
    }

    pub fn set_time_calculation_mode(&mut self, mode: TimeCalculationMode) {
        self.content.time_calculation_mode = mode;
        self.recompute_times();
    }

    pub fn is_auto(&self) -> bool {
        self.content.time_calculation_mode == TimeCalculationMode::AutoTimers
    }

    /// Append an ingredient, giving it a fresh key.
    pub fn add_ingredient(&mut self, mut ingredient: RecipeIngredient) -> IngredientKey {
        if self.next_key == u32::MAX {
            self.rekey();
        }
        let key = IngredientKey(self.next_key);
        self.next_key = self.next_key.saturating_add(1);
        ingredient.key = key;
        self.content.ingredients.push(ingredient);
        key
    }

    pub fn update_ingredient(
        &mut self,
        key: IngredientKey,
        edit: impl FnOnce(&mut RecipeIngredient),
    ) -> bool {
        match self.content.ingredients.iter_mut().find(|i| i.key == key) {
            Some(ingredient) => {
                edit(ingredient);
                ingredient.key = key;
                true
            }
            None => false,
        }
    }

    /// Remove an ingredient and every step reference to it.
    pub fn remove_ingredient(&mut self, key: IngredientKey) -> Option<RecipeIngredient> {
        let position = self.content.ingredients.iter().position(|i| i.key == key)?;
        for step in &mut self.content.steps {
            step.ingredient_keys.retain(|k| *k != key);
        }
        Some(self.content.ingredients.remove(position))
    }

    pub fn move_ingredient(&mut self, from: usize, to: usize) -> bool {
        move_item(&mut self.content.ingredients, from, to)
    }

    pub fn add_step(&mut self, mut step: RecipeStep) {
        dedup_keys(&mut step);
        self.content.steps.push(step);
        self.recompute_times();
    }

    pub fn update_step(&mut self, index: usize, edit: impl FnOnce(&mut RecipeStep)) -> bool {
        let Some(step) = self.content.steps.get_mut(index) else {
            return false;
        };
        edit(step);
        dedup_keys(step);
        self.recompute_times();
        true
    }

    pub fn remove_step(&mut self, index: usize) -> Option<RecipeStep> {
        if index >= self.content.steps.len() {
            return None;
        }
        let step = self.content.steps.remove(index);
        self.recompute_times();
        Some(step)
    }

    pub fn move_step(&mut self, from: usize, to: usize) -> bool {
        move_item(&mut self.content.steps, from, to)
    }

    /// Select or deselect a cooking method. Returns whether it is now selected.
    pub fn toggle_cooking_method(&mut self, method: &str) -> bool {
        let method = method.trim();
        let methods = &mut self.content.cooking_methods;
        if let Some(position) = methods.iter().position(|m| m.eq_ignore_ascii_case(method)) {
            methods.remove(position);
            false
        } else {
            methods.push(method.to_string());
            true
        }
    }

    /// Append dictated text to the notes.
    pub fn append_notes(&mut self, text: &str) {
        let notes = self.content.notes.take().unwrap_or_default();
        self.content.notes = Some(join_text(&notes, text)).filter(|n| !n.is_empty());
    }

    /// Append dictated text to a step description.
    pub fn append_step_description(&mut self, index: usize, text: &str) -> bool {
        self.update_step(index, |step| {
            step.description = join_text(&step.description, text);
        })
    }

    /// Refresh derived times. A no-op in manual mode.
    pub fn recompute_times(&mut self) {
        if self.is_auto() {
            let (prep, cook) = auto_times(&self.content.steps);
            self.content.prep_time_minutes = prep;
            self.content.cook_time_minutes = cook;
        }
    }

    /// Checks run before submitting. Nothing is sent anywhere if this fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if self.content.cooking_methods.is_empty() {
            return Err(ValidationError::MissingCookingMethod);
        }
        for (index, step) in self.content.steps.iter().enumerate() {
            if let Some(key) = step
                .ingredient_keys
                .iter()
                .find(|k| self.content.ingredient(**k).is_none())
            {
                return Err(ValidationError::UnknownIngredient {
                    step: index + 1,
                    key: *key,
                });
            }
        }
        Ok(())
    }
}

fn dedup_keys(step: &mut RecipeStep) {
    step.ingredient_keys = step.ingredient_keys.iter().copied().unique().collect();
}

fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

fn join_text(existing: &str, addition: &str) -> String {
    match (existing.trim_end(), addition.trim()) {
        ("", addition) => addition.to_string(),
        (existing, "") => existing.to_string(),
        (existing, addition) => format!("{existing} {addition}"),
    }
}

/// Where a submitted form goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTarget {
    Create,
    Edit(RecipeId),
}

impl SubmitTarget {
    pub fn draft_key(self) -> DraftKey {
        match self {
            SubmitTarget::Create => DraftKey::Create,
            SubmitTarget::Edit(id) => DraftKey::Edit(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(RecipeId),
    Updated,
}

#[derive(thiserror::Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Recipe {0} not found")]
    NotFound(RecipeId),
    #[error("Could not save the recipe: {0:#}")]
    Persistence(anyhow::Error),
}

/// Validate and store a form, then drop its draft.
///
/// On any failure the draft is left alone so the cook can fix things and retry.
pub async fn submit<R, S>(
    form: &RecipeForm,
    owner: &str,
    target: SubmitTarget,
    repository: &R,
    drafts: &DraftStore<S>,
) -> Result<SubmitOutcome, SubmitError>
where
    R: RecipeRepository + ?Sized,
    S: DraftStorage,
{
    form.validate()?;
    let outcome = match target {
        SubmitTarget::Create => repository
            .insert(owner, form.content())
            .await
            .map(SubmitOutcome::Created)
            .map_err(SubmitError::Persistence)?,
        SubmitTarget::Edit(id) => {
            let found = repository
                .update(owner, id, form.content())
                .await
                .map_err(SubmitError::Persistence)?;
            if !found {
                return Err(SubmitError::NotFound(id));
            }
            SubmitOutcome::Updated
        }
    };
    drafts.clear(&target.draft_key());
    tracing::info!(owner, ?outcome, "Recipe saved");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafts::MemoryDraftStorage;
    use crate::repository::MemoryRecipeRepository;

    fn timed(minutes: u32, kind: Option<TimerType>) -> RecipeStep {
        RecipeStep {
            description: "step".into(),
            timer_minutes: Some(minutes),
            timer_type: kind,
            ..Default::default()
        }
    }

    fn valid_form() -> RecipeForm {
        let mut form = RecipeForm::default();
        form.set_title("Pancakes");
        form.toggle_cooking_method("pan");
        form
    }

    #[test]
    fn untyped_timers_count_as_prep() {
        let steps = [
            timed(10, Some(TimerType::Prep)),
            timed(20, Some(TimerType::Cook)),
            timed(5, None),
        ];
        assert_eq!(auto_times(&steps), (15, 20));
    }

    #[test]
    fn huge_timers_saturate() {
        let form: RecipeForm = serde_json::from_str(
            r#"{
                "title": "Forever stew",
                "category": "Stews",
                "time_calculation_mode": "auto-timers",
                "steps": [
                    { "description": "simmer", "timer_minutes": 4294967295, "timer_type": "cook" },
                    { "description": "rest", "timer_minutes": 1, "timer_type": "cook" },
                    { "description": "chop", "timer_minutes": 4294967295 },
                    { "description": "peel", "timer_minutes": 1 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(form.content().cook_time_minutes, u32::MAX);
        assert_eq!(form.content().prep_time_minutes, u32::MAX);
        assert_eq!(form.content().total_time_minutes(), u32::MAX);
    }

    #[test]
    fn largest_key_is_renumbered_on_load() {
        let content = RecipeContent {
            title: "Salad".into(),
            cooking_methods: vec!["toss".into()],
            ingredients: vec![
                RecipeIngredient {
                    key: IngredientKey(u32::MAX),
                    name: "lettuce".into(),
                    ..RecipeForm::blank_ingredient()
                },
                RecipeIngredient {
                    key: IngredientKey(7),
                    name: "oil".into(),
                    ..RecipeForm::blank_ingredient()
                },
            ],
            steps: vec![RecipeStep {
                description: "dress".into(),
                ingredient_keys: vec![IngredientKey(7), IngredientKey(u32::MAX)],
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut form = RecipeForm::from_content(content);
        let keys = form
            .content()
            .ingredients
            .iter()
            .map(|i| i.key)
            .collect::<Vec<_>>();
        assert_eq!(keys, [IngredientKey(0), IngredientKey(1)]);
        assert_eq!(
            form.content().steps[0].ingredient_keys,
            [IngredientKey(1), IngredientKey(0)]
        );
        form.validate().unwrap();

        let vinegar = form.add_ingredient(RecipeIngredient {
            name: "vinegar".into(),
            ..RecipeForm::blank_ingredient()
        });
        assert_eq!(vinegar, IngredientKey(2));
    }

    #[test]
    fn auto_mode_derives_times_and_locks_setters() {
        let mut form = RecipeForm::default();
        assert!(form.set_prep_time(3));
        form.set_time_calculation_mode(TimeCalculationMode::AutoTimers);
        assert_eq!(form.content().prep_time_minutes, 0);
        assert!(!form.set_prep_time(99));
        assert!(!form.set_cook_time(99));

        form.add_step(timed(10, Some(TimerType::Prep)));
        form.add_step(timed(20, Some(TimerType::Cook)));
        form.add_step(timed(5, None));
        assert_eq!(form.content().prep_time_minutes, 15);
        assert_eq!(form.content().cook_time_minutes, 20);

        form.update_step(1, |s| s.timer_minutes = Some(25));
        assert_eq!(form.content().cook_time_minutes, 25);
        form.remove_step(0);
        assert_eq!(form.content().prep_time_minutes, 5);

        form.set_time_calculation_mode(TimeCalculationMode::Manual);
        assert!(form.set_prep_time(42));
        assert_eq!(form.content().prep_time_minutes, 42);
    }

    #[test]
    fn removing_an_ingredient_drops_step_references() {
        let mut form = valid_form();
        let flour = form.add_ingredient(RecipeIngredient {
            name: "flour".into(),
            ..RecipeForm::blank_ingredient()
        });
        let milk = form.add_ingredient(RecipeIngredient {
            name: "milk".into(),
            ..RecipeForm::blank_ingredient()
        });
        form.add_step(RecipeStep {
            description: "whisk".into(),
            ingredient_keys: vec![flour, milk, flour],
            ..Default::default()
        });
        assert_eq!(form.content().steps[0].ingredient_keys, [flour, milk]);

        form.remove_ingredient(flour);
        assert_eq!(form.content().steps[0].ingredient_keys, [milk]);
        form.validate().unwrap();
    }

    #[test]
    fn reordering_ingredients_keeps_references() {
        let mut form = valid_form();
        let eggs = form.add_ingredient(RecipeIngredient {
            name: "eggs".into(),
            ..RecipeForm::blank_ingredient()
        });
        form.add_ingredient(RecipeIngredient {
            name: "sugar".into(),
            ..RecipeForm::blank_ingredient()
        });
        form.add_step(RecipeStep {
            description: "beat".into(),
            ingredient_keys: vec![eggs],
            ..Default::default()
        });
        assert!(form.move_ingredient(0, 1));
        let referenced = form
            .content()
            .ingredient(form.content().steps[0].ingredient_keys[0])
            .unwrap();
        assert_eq!(referenced.name, "eggs");
    }

    #[test]
    fn keys_are_not_reused_after_reload() {
        let mut form = valid_form();
        let a = form.add_ingredient(RecipeForm::blank_ingredient());
        let b = form.add_ingredient(RecipeForm::blank_ingredient());
        form.remove_ingredient(a);
        let mut reloaded: RecipeForm =
            serde_json::from_str(&serde_json::to_string(&form).unwrap()).unwrap();
        let c = reloaded.add_ingredient(RecipeForm::blank_ingredient());
        assert!(c > b);
    }

    #[test]
    fn validation_requires_title_and_method() {
        let mut form = RecipeForm::default();
        assert_eq!(form.validate(), Err(ValidationError::MissingTitle));
        form.set_title("Soup");
        assert_eq!(form.validate(), Err(ValidationError::MissingCookingMethod));
        assert!(form.toggle_cooking_method("simmer"));
        assert_eq!(form.validate(), Ok(()));
        assert!(!form.toggle_cooking_method("SIMMER"));
        assert_eq!(form.validate(), Err(ValidationError::MissingCookingMethod));
    }

    #[test]
    fn dangling_step_reference_fails_validation() {
        let content = RecipeContent {
            title: "Soup".into(),
            cooking_methods: vec!["simmer".into()],
            steps: vec![RecipeStep {
                description: "stir".into(),
                ingredient_keys: vec![IngredientKey(4)],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            RecipeForm::from_content(content).validate(),
            Err(ValidationError::UnknownIngredient {
                step: 1,
                key: IngredientKey(4)
            })
        );
    }

    #[test]
    fn dictated_text_is_appended() {
        let mut form = valid_form();
        form.append_notes("  use ripe bananas ");
        form.append_notes("or frozen ones");
        assert_eq!(
            form.content().notes.as_deref(),
            Some("use ripe bananas or frozen ones")
        );
        form.add_step(RecipeStep::default());
        assert!(form.append_step_description(0, "mash"));
        assert!(!form.append_step_description(3, "mash"));
        assert_eq!(form.content().steps[0].description, "mash");
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_the_repository() {
        let repository = MemoryRecipeRepository::default();
        let drafts = DraftStore::new(MemoryDraftStorage::default());
        let form = RecipeForm::default();
        drafts.save(&DraftKey::Create, &form);

        let result = submit(&form, "cook", SubmitTarget::Create, &repository, &drafts).await;
        assert!(matches!(result, Err(SubmitError::Validation(_))));
        assert_eq!(repository.len(), 0);
        assert!(drafts.load::<RecipeForm>(&DraftKey::Create).is_some());
    }

    #[tokio::test]
    async fn successful_submit_clears_the_draft() {
        let repository = MemoryRecipeRepository::default();
        let drafts = DraftStore::new(MemoryDraftStorage::default());
        let form = valid_form();
        drafts.save(&DraftKey::Create, &form);

        let outcome = submit(&form, "cook", SubmitTarget::Create, &repository, &drafts)
            .await
            .unwrap();
        let SubmitOutcome::Created(id) = outcome else {
            panic!("expected a new recipe, got {outcome:?}");
        };
        assert!(drafts.load::<RecipeForm>(&DraftKey::Create).is_none());

        drafts.save(&DraftKey::Edit(id), &form);
        let outcome = submit(&form, "cook", SubmitTarget::Edit(id), &repository, &drafts)
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Updated);
        assert!(drafts.load::<RecipeForm>(&DraftKey::Edit(id)).is_none());
    }

    #[tokio::test]
    async fn failed_update_keeps_the_draft() {
        let repository = MemoryRecipeRepository::default();
        let drafts = DraftStore::new(MemoryDraftStorage::default());
        let form = valid_form();
        drafts.save(&DraftKey::Edit(99), &form);

        let result = submit(&form, "cook", SubmitTarget::Edit(99), &repository, &drafts).await;
        assert!(matches!(result, Err(SubmitError::NotFound(99))));
        assert!(drafts.load::<RecipeForm>(&DraftKey::Edit(99)).is_some());
    }
}
