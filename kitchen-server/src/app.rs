use axum::{
    extract::{FromRef, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use kitchen::{dictation::Dictation, preferences::PreferencesHandle};
use std::sync::Arc;

use crate::{
    api,
    auth::{route, Authenticator},
    cache::KitchenCache,
    cooking::CookingSessions,
    database::Database,
    editing::EditorSessions,
    errors::{WebError, WebResult},
    images::ImageSearch,
    pages,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: Authenticator,
    pub cooking: CookingSessions,
    pub editors: EditorSessions,
    /// Speech-to-text for the editor, when configured.
    pub dictation: Option<Arc<dyn Dictation>>,
    pub images: ImageSearch,
    pub preferences: PreferencesHandle,
    pub cache: KitchenCache,
}

impl FromRef<AppState> for Authenticator {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // `GET /` goes to the recipe browser
        .route("/", get(pages::index))
        .route("/recipe/new", get(pages::new_recipe))
        .route("/recipe/:recipe_id", get(pages::recipe))
        .route("/recipe/:recipe_id/edit", get(pages::edit_recipe))
        .route("/recipe/:recipe_id/cook", get(pages::cook))
        .route("/health", get(health))
        // serve static files from the `./static` directory
        .route("/static/*path", get(serve_static))
        .route("/api/auth/sign-up", post(route::sign_up))
        .route("/api/auth/sign-in", post(route::sign_in))
        .route("/api/auth/sign-out", post(route::sign_out))
        .route("/api/auth/session", get(route::current_session))
        .route("/api/account", axum::routing::delete(api::delete_account))
        .route(
            "/api/recipes",
            get(api::list_recipes).post(api::create_recipe),
        )
        .route("/api/recipes/categories", get(api::list_categories))
        .route(
            "/api/recipes/:recipe_id",
            get(api::get_recipe)
                .put(api::update_recipe)
                .delete(api::delete_recipe),
        )
        .route("/api/recipes/:recipe_id/cook", post(api::start_cooking))
        .route(
            "/api/cook/:session_id",
            get(api::cooking_view)
                .post(api::cooking_input)
                .delete(api::end_cooking),
        )
        .route("/api/cook/:session_id/events", get(api::cooking_events))
        .route("/api/editor", post(api::open_editor))
        .route("/api/editor/:editor_id", axum::routing::put(api::edit_form))
        .route("/api/editor/:editor_id/close", post(api::close_editor))
        .route("/api/editor/:editor_id/restore", post(api::resolve_restore))
        .route("/api/editor/:editor_id/dictate", post(api::dictate))
        .route("/api/editor/:editor_id/submit", post(api::submit_editor))
        .route("/api/ingredients", get(api::list_ingredients))
        .route("/api/ingredients/search", get(api::search_ingredients))
        .route(
            "/api/utensils",
            get(api::list_utensils).post(api::add_utensil),
        )
        .route("/api/utensils/search", get(api::search_utensils))
        .route("/api/images/:provider/search", get(api::search_images))
        .route(
            "/api/drafts/:key",
            get(api::get_draft)
                .put(api::save_draft)
                .delete(api::clear_draft),
        )
        .route(
            "/api/preferences",
            get(api::get_preferences).put(api::set_preferences),
        )
        .layer(
            tower_http::compression::CompressionLayer::new()
                .quality(tower_http::CompressionLevel::Fastest),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

// Just reply that everything is okay
async fn health() -> StatusCode {
    StatusCode::OK
}

/// Serve static files from in memory using `include_dir!`
async fn serve_static(Path(path): Path<String>) -> WebResult<impl IntoResponse> {
    let dir = include_dir::include_dir!("$CARGO_MANIFEST_DIR/static");
    let bytes = dir.get_file(&path).ok_or(WebError::NotFound)?.contents();
    let header = (
        "Content-Type",
        match path.split('.').last() {
            Some("css") => "text/css",
            Some("js") => "text/javascript",
            Some("svg") => "image/svg+xml",
            _ => "application/octet-stream",
        },
    );
    Ok(([header], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::new_cache, config::ImagesConfig, database::testing::temp_database};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app() -> (Router, tempfile::TempDir, tempfile::TempDir) {
        let (db, db_dir) = temp_database().await;
        let prefs_dir = tempfile::tempdir().unwrap();
        let cache = new_cache();
        let state = AppState {
            auth: Authenticator::ephemeral(db.clone(), 10),
            images: ImageSearch::from_config(&ImagesConfig::default(), cache.clone()),
            preferences: PreferencesHandle::load(prefs_dir.path().join("preferences.json")),
            cooking: CookingSessions::default(),
            editors: EditorSessions::default(),
            dictation: None,
            db,
            cache,
        };
        (router(state), db_dir, prefs_dir)
    }

    fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Register a fresh account and return its session cookie.
    async fn sign_up(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/sign-up",
                None,
                json!({
                    "email": "cook@example.com",
                    "password": "secret1",
                    "password_confirmation": "secret1",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("session_id="));
        cookie
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _db, _prefs) = test_app().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn recipes_require_a_session() {
        let (app, _db, _prefs) = test_app().await;
        let response = app
            .oneshot(Request::get("/api/recipes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn sign_up_then_create_and_cook_a_recipe() {
        let (app, _db, _prefs) = test_app().await;

        let cookie = sign_up(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/recipes",
                Some(&cookie),
                json!({
                    "title": "Tomato soup",
                    "category": "Soups",
                    "cooking_methods": ["simmer"],
                    "ingredients": [{ "key": 0, "name": "Tomatoes", "quantity": 6.0 }],
                    "steps": [
                        { "description": "Chop the tomatoes", "ingredient_keys": [0] },
                        { "description": "Simmer", "timer_minutes": 20, "timer_type": "cook" }
                    ],
                    "time_calculation_mode": "auto-timers",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(json_request("GET", &format!("/api/recipes/{id}"), Some(&cookie), json!(null)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let recipe = body_json(response).await;
        assert_eq!(recipe["title"], "Tomato soup");
        assert_eq!(recipe["cook_time_minutes"], 20);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/recipes/{id}/cook"),
                Some(&cookie),
                json!(null),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let started = body_json(response).await;
        assert_eq!(started["view"]["step_index"], 0);
        let session_id = started["session_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/cook/{session_id}"),
                Some(&cookie),
                json!({ "action": "tick" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/cook/{session_id}"),
                Some(&cookie),
                json!({ "action": "advance" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let handled = body_json(response).await;
        assert_eq!(handled["view"]["step_index"], 1);
        assert_eq!(handled["view"]["timer"]["remaining_seconds"], 1200);
        assert_eq!(
            handled["events"],
            json!([{ "event": "step_changed", "from": 0, "to": 1 }])
        );
    }

    #[tokio::test]
    async fn editor_restores_drafts_and_saves_recipes() {
        let (app, _db, _prefs) = test_app().await;
        let cookie = sign_up(&app).await;
        let send = |method: &str, uri: &str, body: Value| {
            app.clone()
                .oneshot(json_request(method, uri, Some(&cookie), body))
        };

        let response = send("POST", "/api/editor", json!({ "target": "create" }))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let opened = body_json(response).await;
        assert!(opened["restored_at"].is_null());
        let editor_id = opened["editor_id"].as_str().unwrap().to_string();

        let response = send(
            "PUT",
            &format!("/api/editor/{editor_id}"),
            json!({
                "title": "Bread",
                "category": "Baking",
                "cooking_methods": ["bake"],
                "steps": [{ "description": "Prove", "timer_minutes": 60 }],
                "time_calculation_mode": "auto-timers",
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["prep_time_minutes"], 60);

        let response = send("POST", &format!("/api/editor/{editor_id}/close"), json!(null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // The unfinished form comes back on the next visit.
        let response = send("POST", "/api/editor", json!({ "target": "create" }))
            .await
            .unwrap();
        let opened = body_json(response).await;
        assert!(opened["restored_at"].is_string());
        assert_eq!(opened["form"]["title"], "Bread");
        let editor_id = opened["editor_id"].as_str().unwrap().to_string();

        let response = send(
            "POST",
            &format!("/api/editor/{editor_id}/restore"),
            json!({ "keep": true }),
        )
        .await
        .unwrap();
        assert_eq!(body_json(response).await["title"], "Bread");

        let response = send(
            "POST",
            &format!("/api/editor/{editor_id}/dictate"),
            json!({ "field": "notes" }),
        )
        .await
        .unwrap();
        assert_eq!(body_json(response).await["changed"], false);

        let response = send("POST", &format!("/api/editor/{editor_id}/submit"), json!(null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_i64().unwrap();

        let response = send("GET", "/api/drafts/create", json!(null)).await.unwrap();
        assert!(body_json(response).await.is_null());
        let response = send("POST", &format!("/api/editor/{editor_id}/submit"), json!(null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send("POST", "/api/editor", json!({ "target": format!("edit-{id}") }))
            .await
            .unwrap();
        let opened = body_json(response).await;
        assert!(opened["restored_at"].is_null());
        assert_eq!(opened["form"]["title"], "Bread");

        let response = send("POST", "/api/editor", json!({ "target": "edit-999" }))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
