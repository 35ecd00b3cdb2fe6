use chrono::{DateTime, Utc};

use crate::{
    dictation::{dictate_into, Dictation, DictationTarget},
    drafts::{DraftAutosaver, DraftStorage, DraftStore},
    form::{self, RecipeForm, SubmitError, SubmitOutcome, SubmitTarget},
    repository::RecipeRepository,
};

/// A recipe form with autosave and restore-or-discard.
///
/// On open, an unexpired draft for the same target replaces the natural starting values
/// (blank for a new recipe, the stored recipe when editing) and the editor is flagged as
/// restored until the cook acknowledges or discards it.
pub struct RecipeEditor<S: DraftStorage + 'static> {
    form: RecipeForm,
    natural: RecipeForm,
    target: SubmitTarget,
    restored_at: Option<DateTime<Utc>>,
    store: DraftStore<S>,
    autosaver: DraftAutosaver<S, RecipeForm>,
}

impl<S: DraftStorage + 'static> RecipeEditor<S> {
    pub fn open(store: DraftStore<S>, target: SubmitTarget, natural: RecipeForm) -> Self {
        let key = target.draft_key();
        let (form, restored_at) = match store.load::<RecipeForm>(&key) {
            Some(draft) => {
                tracing::info!(%key, saved_at = %draft.saved_at, "Restored recipe draft");
                (draft.data, Some(draft.saved_at))
            }
            None => (natural.clone(), None),
        };
        Self {
            form,
            natural,
            target,
            restored_at,
            autosaver: DraftAutosaver::new(store.clone(), key),
            store,
        }
    }

    pub fn form(&self) -> &RecipeForm {
        &self.form
    }

    pub fn target(&self) -> SubmitTarget {
        self.target
    }

    pub fn is_restored(&self) -> bool {
        self.restored_at.is_some()
    }

    /// When the restored draft was saved.
    pub fn restored_at(&self) -> Option<DateTime<Utc>> {
        self.restored_at
    }

    /// Keep the restored values and stop flagging them.
    pub fn acknowledge_restore(&mut self) {
        self.restored_at = None;
    }

    /// Throw the draft away and go back to the natural starting values, all at once.
    pub fn discard_restored(&mut self) {
        self.autosaver.cancel();
        self.store.clear(&self.target.draft_key());
        self.form = self.natural.clone();
        self.restored_at = None;
    }

    /// Change the form and schedule an autosave. Must run inside a tokio runtime.
    pub fn edit<R>(&mut self, change: impl FnOnce(&mut RecipeForm) -> R) -> R {
        let result = change(&mut self.form);
        self.autosaver.schedule(self.form.clone());
        result
    }

    /// Dictate into a field. Dictated text is autosaved like any other edit.
    pub async fn dictate(
        &mut self,
        dictation: Option<&dyn Dictation>,
        target: DictationTarget,
    ) -> anyhow::Result<bool> {
        let changed = dictate_into(&mut self.form, dictation, target).await?;
        if changed {
            self.autosaver.schedule(self.form.clone());
        }
        Ok(changed)
    }

    /// Write any pending autosave now, e.g. when the page goes away.
    pub fn flush(&mut self) {
        self.autosaver.flush();
    }

    /// Submit the form. On failure the latest edits are kept as a draft.
    pub async fn submit<R: RecipeRepository + ?Sized>(
        &mut self,
        owner: &str,
        repository: &R,
    ) -> Result<SubmitOutcome, SubmitError> {
        self.autosaver.flush();
        let outcome = form::submit(&self.form, owner, self.target, repository, &self.store).await?;
        self.restored_at = None;
        if let SubmitOutcome::Created(id) = outcome {
            tracing::debug!(id, "New recipe created from editor");
        }
        Ok(outcome)
    }
}
