use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use kitchen::{
    browse::{self, RecipeFilter},
    drafts::DraftKey,
    models::{Recipe, RecipeId},
    repository::RecipeRepository,
};
use minijinja::context;

use crate::{
    app::AppState,
    auth::session::UserSession,
    cache::{CacheQuery, CacheValue},
    errors::{WebError, WebResult},
};

lazy_static::lazy_static! {
    static ref TEMPLATES: minijinja::Environment<'static> = {
        let mut env = minijinja::Environment::new();
        for (name, template) in &[
            ("base.html.jinja", include_str!("../templates/base.html.jinja")),
            ("index.html.jinja", include_str!("../templates/index.html.jinja")),
            ("recipe.html.jinja", include_str!("../templates/recipe.html.jinja")),
            ("cook.html.jinja", include_str!("../templates/cook.html.jinja")),
            ("edit.html.jinja", include_str!("../templates/edit.html.jinja")),
        ] {
            env.add_template(name, template)
                .expect("Failed to register template");
        }
        env
    };
}

fn render(state: &AppState, name: &str, ctx: minijinja::Value) -> WebResult<Html<String>> {
    let theme = state.preferences.get().theme.to_string();
    Ok(Html(TEMPLATES.get_template(name)?.render(context! {
        theme => theme,
        ..ctx
    })?))
}

/// The recipe browser, or the sign-in form for visitors.
pub async fn index(
    State(state): State<AppState>,
    session: Option<UserSession>,
    Query(filter): Query<RecipeFilter>,
) -> WebResult<Html<String>> {
    let Some(session) = session else {
        return render(&state, "index.html.jinja", context! { signed_in => false });
    };
    let recipes = state.db.list(&session.principal.id).await?;
    let categories = browse::categories(&recipes);
    render(
        &state,
        "index.html.jinja",
        context! {
            signed_in => true,
            principal => session.principal,
            categories => categories,
            recipes => filter.apply(recipes),
            query => filter.query,
            category => filter.category,
            cooking_method => filter.cooking_method,
            max_total_minutes => filter.max_total_minutes,
        },
    )
}

async fn owned_recipe(state: &AppState, session: &UserSession, id: RecipeId) -> WebResult<Recipe> {
    state
        .db
        .get(&session.principal.id, id)
        .await?
        .ok_or(WebError::NotFound)
}

/// Markdown notes rendered to HTML, cached per recipe revision.
async fn notes_html(state: &AppState, recipe: &Recipe) -> Option<String> {
    let notes = recipe.content.notes.as_deref()?;
    let key = CacheQuery::NotesHtml {
        recipe_id: recipe.id,
        revision: recipe.updated_at.timestamp_millis(),
    };
    match state.cache.get_value_or_guard_async(&key).await {
        Ok(CacheValue::Html { html }) => Some(html),
        Ok(_) => unreachable!(),
        Err(guard) => {
            let html = markdown::to_html(notes);
            guard
                .insert(CacheValue::Html { html: html.clone() })
                .unwrap_or_default();
            Some(html)
        }
    }
}

pub async fn recipe(
    State(state): State<AppState>,
    session: Option<UserSession>,
    Path(recipe_id): Path<RecipeId>,
) -> WebResult<Response> {
    let Some(session) = session else {
        return Ok(Redirect::to("/").into_response());
    };
    let recipe = owned_recipe(&state, &session, recipe_id).await?;
    let notes = notes_html(&state, &recipe).await;
    let total_minutes = recipe.content.total_time_minutes();
    Ok(render(
        &state,
        "recipe.html.jinja",
        context! {
            recipe => recipe,
            notes_html => notes,
            total_minutes => total_minutes,
        },
    )?
    .into_response())
}

pub async fn cook(
    State(state): State<AppState>,
    session: Option<UserSession>,
    Path(recipe_id): Path<RecipeId>,
) -> WebResult<Response> {
    let Some(session) = session else {
        return Ok(Redirect::to("/").into_response());
    };
    let recipe = owned_recipe(&state, &session, recipe_id).await?;
    Ok(render(
        &state,
        "cook.html.jinja",
        context! {
            recipe_id => recipe.id,
            title => recipe.content.title,
            step_count => recipe.content.steps.len(),
        },
    )?
    .into_response())
}

/// The recipe form for a new recipe.
pub async fn new_recipe(
    State(state): State<AppState>,
    session: Option<UserSession>,
) -> WebResult<Response> {
    if session.is_none() {
        return Ok(Redirect::to("/").into_response());
    }
    Ok(render(
        &state,
        "edit.html.jinja",
        context! {
            target => DraftKey::Create.to_string(),
            heading => "New recipe",
            dictation => state.dictation.is_some(),
        },
    )?
    .into_response())
}

/// The recipe form for an existing recipe.
pub async fn edit_recipe(
    State(state): State<AppState>,
    session: Option<UserSession>,
    Path(recipe_id): Path<RecipeId>,
) -> WebResult<Response> {
    let Some(session) = session else {
        return Ok(Redirect::to("/").into_response());
    };
    let recipe = owned_recipe(&state, &session, recipe_id).await?;
    Ok(render(
        &state,
        "edit.html.jinja",
        context! {
            target => DraftKey::Edit(recipe.id).to_string(),
            heading => format!("Edit {}", recipe.content.title),
            recipe_id => recipe.id,
            dictation => state.dictation.is_some(),
        },
    )?
    .into_response())
}
