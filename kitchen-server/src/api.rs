//! JSON endpoints. Everything here requires a signed-in user and only ever touches
//! that user's data, apart from the shared ingredient and utensil catalogue.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::{cookie::Cookie, CookieJar};
use kitchen::{
    browse::{self, RecipeFilter},
    cooking::{CookingEvent, CookingInput, CookingView},
    dictation::DictationTarget,
    drafts::{Draft, DraftKey, DraftStore},
    editor::RecipeEditor,
    form::{self, RecipeForm, SubmitOutcome, SubmitTarget},
    lookup::normalize_name,
    models::{Recipe, RecipeId},
    preferences::Preferences,
    repository::RecipeRepository,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    app::AppState,
    auth::session::{UserSession, SESSION_COOKIE},
    cooking::{Handled, Started},
    drafts::SqliteDraftStorage,
    editing::{LiveEditor, Opened},
    errors::{WebError, WebResult},
    images::{ImageProvider, ImageResult},
    models::{Ingredient, Utensil},
};

const DEFAULT_LOOKUP_LIMIT: usize = 10;

fn drafts_for(state: &AppState, session: &UserSession) -> DraftStore<SqliteDraftStorage> {
    DraftStore::new(SqliteDraftStorage::new(
        state.db.clone(),
        session.principal.id.clone(),
    ))
}

pub async fn list_recipes(
    State(state): State<AppState>,
    session: UserSession,
    Query(filter): Query<RecipeFilter>,
) -> WebResult<Json<Vec<Recipe>>> {
    let recipes = state.db.list(&session.principal.id).await?;
    Ok(Json(filter.apply(recipes)))
}

pub async fn list_categories(
    State(state): State<AppState>,
    session: UserSession,
) -> WebResult<Json<Vec<String>>> {
    let recipes = state.db.list(&session.principal.id).await?;
    Ok(Json(browse::categories(&recipes)))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    session: UserSession,
    Path(recipe_id): Path<RecipeId>,
) -> WebResult<Json<Recipe>> {
    let recipe = state
        .db
        .get(&session.principal.id, recipe_id)
        .await?
        .ok_or(WebError::NotFound)?;
    Ok(Json(recipe))
}

/// Store a new recipe and drop the "create" draft.
pub async fn create_recipe(
    State(state): State<AppState>,
    session: UserSession,
    Json(form): Json<RecipeForm>,
) -> WebResult<(StatusCode, Json<Value>)> {
    let drafts = drafts_for(&state, &session);
    match form::submit(
        &form,
        &session.principal.id,
        SubmitTarget::Create,
        &state.db,
        &drafts,
    )
    .await?
    {
        SubmitOutcome::Created(id) => Ok((StatusCode::CREATED, Json(json!({ "id": id })))),
        SubmitOutcome::Updated => Err(WebError::Internal(anyhow::anyhow!(
            "Creating a recipe reported an update"
        ))),
    }
}

/// Replace a recipe and drop its edit draft.
pub async fn update_recipe(
    State(state): State<AppState>,
    session: UserSession,
    Path(recipe_id): Path<RecipeId>,
    Json(form): Json<RecipeForm>,
) -> WebResult<StatusCode> {
    let drafts = drafts_for(&state, &session);
    form::submit(
        &form,
        &session.principal.id,
        SubmitTarget::Edit(recipe_id),
        &state.db,
        &drafts,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    session: UserSession,
    Path(recipe_id): Path<RecipeId>,
) -> WebResult<StatusCode> {
    if !state.db.delete(&session.principal.id, recipe_id).await? {
        return Err(WebError::NotFound);
    }
    drafts_for(&state, &session).clear(&DraftKey::Edit(recipe_id));
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

pub async fn list_ingredients(
    State(state): State<AppState>,
    _: UserSession,
) -> WebResult<Json<Vec<Ingredient>>> {
    Ok(Json(Ingredient::list(&state.db)?))
}

pub async fn search_ingredients(
    State(state): State<AppState>,
    _: UserSession,
    Query(lookup): Query<LookupQuery>,
) -> WebResult<Json<Vec<Ingredient>>> {
    let limit = lookup.limit.unwrap_or(DEFAULT_LOOKUP_LIMIT);
    Ok(Json(Ingredient::search(&state.db, &lookup.query, limit)?))
}

pub async fn list_utensils(
    State(state): State<AppState>,
    _: UserSession,
) -> WebResult<Json<Vec<Utensil>>> {
    Ok(Json(Utensil::list(&state.db)?))
}

pub async fn search_utensils(
    State(state): State<AppState>,
    _: UserSession,
    Query(lookup): Query<LookupQuery>,
) -> WebResult<Json<Vec<Utensil>>> {
    let limit = lookup.limit.unwrap_or(DEFAULT_LOOKUP_LIMIT);
    Ok(Json(Utensil::search(&state.db, &lookup.query, limit)?))
}

#[derive(Debug, Deserialize)]
pub struct NewUtensil {
    name: String,
}

/// Adding a utensil that already exists (in any letter case) returns the existing one.
pub async fn add_utensil(
    State(state): State<AppState>,
    _: UserSession,
    Json(utensil): Json<NewUtensil>,
) -> WebResult<Json<Utensil>> {
    if normalize_name(&utensil.name).is_empty() {
        return Err(WebError::Validation("A utensil needs a name".into()));
    }
    Ok(Json(Utensil::add(&state.db, &utensil.name)?))
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    #[serde(default)]
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

pub async fn search_images(
    State(state): State<AppState>,
    _: UserSession,
    Path(provider): Path<String>,
    Query(search): Query<ImageQuery>,
) -> WebResult<Json<Vec<ImageResult>>> {
    let provider = provider
        .parse::<ImageProvider>()
        .map_err(|_| WebError::NotFound)?;
    if search.query.trim().is_empty() {
        return Err(WebError::Validation("Enter something to search for".into()));
    }
    Ok(Json(
        state
            .images
            .search(provider, &search.query, search.limit)
            .await?,
    ))
}

pub async fn get_draft(
    State(state): State<AppState>,
    session: UserSession,
    Path(key): Path<String>,
) -> WebResult<Json<Option<Draft<RecipeForm>>>> {
    let key = key.parse::<DraftKey>()?;
    Ok(Json(drafts_for(&state, &session).load(&key)))
}

pub async fn save_draft(
    State(state): State<AppState>,
    session: UserSession,
    Path(key): Path<String>,
    Json(form): Json<RecipeForm>,
) -> WebResult<StatusCode> {
    let key = key.parse::<DraftKey>()?;
    drafts_for(&state, &session).save(&key, &form);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_draft(
    State(state): State<AppState>,
    session: UserSession,
    Path(key): Path<String>,
) -> WebResult<StatusCode> {
    let key = key.parse::<DraftKey>()?;
    drafts_for(&state, &session).clear(&key);
    Ok(StatusCode::NO_CONTENT)
}

/// Delete the account with its recipes, drafts, sessions and cooking sessions.
pub async fn delete_account(
    State(state): State<AppState>,
    session: UserSession,
    jar: CookieJar,
) -> WebResult<(CookieJar, StatusCode)> {
    state.auth.delete_account(&session.principal.id)?;
    state.cooking.end_all_for(&session.principal.id);
    state.editors.close_all_for(&session.principal.id);
    Ok((
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    ))
}

pub async fn start_cooking(
    State(state): State<AppState>,
    session: UserSession,
    Path(recipe_id): Path<RecipeId>,
) -> WebResult<Json<Started>> {
    let owner = &session.principal.id;
    let recipe = state
        .db
        .get(owner, recipe_id)
        .await?
        .ok_or(WebError::NotFound)?;
    let started = state
        .cooking
        .start(owner, recipe)
        .ok_or_else(|| WebError::Validation("This recipe has no steps to cook".into()))?;
    Ok(Json(started))
}

pub async fn cooking_view(
    State(state): State<AppState>,
    session: UserSession,
    Path(session_id): Path<String>,
) -> WebResult<Json<CookingView>> {
    let view = state
        .cooking
        .view(&session.principal.id, &session_id)
        .await
        .ok_or(WebError::NotFound)?;
    Ok(Json(view))
}

pub async fn cooking_input(
    State(state): State<AppState>,
    session: UserSession,
    Path(session_id): Path<String>,
    Json(input): Json<CookingInput>,
) -> WebResult<Json<Handled>> {
    if input == CookingInput::Tick {
        return Err(WebError::Validation("The server keeps time".into()));
    }
    let handled = state
        .cooking
        .handle(&session.principal.id, &session_id, input)
        .await
        .ok_or(WebError::NotFound)?;
    Ok(Json(handled))
}

pub async fn cooking_events(
    State(state): State<AppState>,
    session: UserSession,
    Path(session_id): Path<String>,
) -> WebResult<Json<Vec<CookingEvent>>> {
    let events = state
        .cooking
        .drain_events(&session.principal.id, &session_id)
        .await
        .ok_or(WebError::NotFound)?;
    Ok(Json(events))
}

pub async fn end_cooking(
    State(state): State<AppState>,
    session: UserSession,
    Path(session_id): Path<String>,
) -> WebResult<StatusCode> {
    if !state.cooking.end(&session.principal.id, &session_id).await {
        return Err(WebError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct OpenEditor {
    /// `create`, or `edit-<recipe id>`.
    target: String,
}

/// Open the create or edit form, restoring an unfinished draft when there is one.
pub async fn open_editor(
    State(state): State<AppState>,
    session: UserSession,
    Json(open): Json<OpenEditor>,
) -> WebResult<Json<Opened>> {
    let owner = &session.principal.id;
    let (target, natural) = match open.target.parse::<DraftKey>()? {
        DraftKey::Create => (SubmitTarget::Create, RecipeForm::default()),
        DraftKey::Edit(id) => {
            let recipe = state.db.get(owner, id).await?.ok_or(WebError::NotFound)?;
            (SubmitTarget::Edit(id), RecipeForm::from_content(recipe.content))
        }
    };
    let editor = RecipeEditor::open(drafts_for(&state, &session), target, natural);
    Ok(Json(state.editors.open(owner, editor)))
}

async fn live_editor(
    state: &AppState,
    session: &UserSession,
    editor_id: &str,
) -> WebResult<Arc<Mutex<LiveEditor>>> {
    state
        .editors
        .find(&session.principal.id, editor_id)
        .await
        .ok_or(WebError::NotFound)
}

/// Replace the form with what the page shows. The draft is written once edits settle.
pub async fn edit_form(
    State(state): State<AppState>,
    session: UserSession,
    Path(editor_id): Path<String>,
    Json(form): Json<RecipeForm>,
) -> WebResult<Json<RecipeForm>> {
    let live = live_editor(&state, &session, &editor_id).await?;
    let mut live = live.lock().await;
    Ok(Json(live.editor.edit(|f| {
        *f = form;
        f.clone()
    })))
}

#[derive(Debug, Deserialize)]
pub struct RestoreChoice {
    keep: bool,
}

/// Keep the restored draft, or throw it away and start over from the stored recipe.
pub async fn resolve_restore(
    State(state): State<AppState>,
    session: UserSession,
    Path(editor_id): Path<String>,
    Json(choice): Json<RestoreChoice>,
) -> WebResult<Json<RecipeForm>> {
    let live = live_editor(&state, &session, &editor_id).await?;
    let mut live = live.lock().await;
    if choice.keep {
        live.editor.acknowledge_restore();
    } else {
        live.editor.discard_restored();
    }
    Ok(Json(live.editor.form().clone()))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum DictateInto {
    Notes,
    Step { index: usize },
}

impl From<DictateInto> for DictationTarget {
    fn from(field: DictateInto) -> Self {
        match field {
            DictateInto::Notes => DictationTarget::Notes,
            DictateInto::Step { index } => DictationTarget::StepDescription(index),
        }
    }
}

/// Dictate into a field. Reports `changed: false` when the server has no dictation.
pub async fn dictate(
    State(state): State<AppState>,
    session: UserSession,
    Path(editor_id): Path<String>,
    Json(field): Json<DictateInto>,
) -> WebResult<Json<Value>> {
    let live = live_editor(&state, &session, &editor_id).await?;
    let mut live = live.lock().await;
    let changed = live
        .editor
        .dictate(state.dictation.as_deref(), field.into())
        .await?;
    Ok(Json(json!({ "changed": changed, "form": live.editor.form() })))
}

/// Save the recipe and close the editor. A rejected form keeps the editor and its draft.
pub async fn submit_editor(
    State(state): State<AppState>,
    session: UserSession,
    Path(editor_id): Path<String>,
) -> WebResult<(StatusCode, Json<Value>)> {
    let owner = &session.principal.id;
    let live = live_editor(&state, &session, &editor_id).await?;
    let (status, id) = {
        let mut live = live.lock().await;
        match live.editor.submit(owner, &state.db).await? {
            SubmitOutcome::Created(id) => (StatusCode::CREATED, id),
            SubmitOutcome::Updated => match live.editor.target() {
                SubmitTarget::Edit(id) => (StatusCode::OK, id),
                SubmitTarget::Create => {
                    return Err(WebError::Internal(anyhow::anyhow!(
                        "Creating a recipe reported an update"
                    )))
                }
            },
        }
    };
    state.editors.close(owner, &editor_id, None).await;
    Ok((status, Json(json!({ "id": id }))))
}

/// Close the editor, optionally with edits the page had not sent yet.
pub async fn close_editor(
    State(state): State<AppState>,
    session: UserSession,
    Path(editor_id): Path<String>,
    Json(last): Json<Option<RecipeForm>>,
) -> WebResult<StatusCode> {
    let owner = &session.principal.id;
    if !state.editors.close(owner, &editor_id, last).await {
        return Err(WebError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_preferences(State(state): State<AppState>) -> Json<Preferences> {
    Json(state.preferences.get())
}

pub async fn set_preferences(
    State(state): State<AppState>,
    _: UserSession,
    Json(preferences): Json<Preferences>,
) -> Json<Preferences> {
    Json(state.preferences.update(|p| *p = preferences))
}
