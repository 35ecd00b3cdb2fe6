use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use kitchen::models::Principal;
use serde::Deserialize;

use crate::errors::WebResult;

use super::{
    session::{UserSession, SESSION_COOKIE},
    Authenticator,
};

#[derive(Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Deserialize)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

fn with_session_cookie(auth: &Authenticator, jar: CookieJar, session: &UserSession) -> CookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, session.id.clone()))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(auth.secure_cookies);
    jar.add(cookie)
}

pub async fn sign_up(
    State(auth): State<Authenticator>,
    jar: CookieJar,
    Json(form): Json<SignUp>,
) -> WebResult<(CookieJar, Json<Principal>)> {
    let session = auth.sign_up(&form.email, &form.password, &form.password_confirmation)?;
    Ok((
        with_session_cookie(&auth, jar, &session),
        Json(session.principal),
    ))
}

pub async fn sign_in(
    State(auth): State<Authenticator>,
    jar: CookieJar,
    Json(form): Json<SignIn>,
) -> WebResult<(CookieJar, Json<Principal>)> {
    let session = auth.sign_in(&form.email, &form.password)?;
    Ok((
        with_session_cookie(&auth, jar, &session),
        Json(session.principal),
    ))
}

pub async fn sign_out(
    State(auth): State<Authenticator>,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    // Clear the session/cookie to log the user out
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        auth.sign_out(cookie.value());
    }
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}

pub async fn current_session(session: UserSession) -> Json<Principal> {
    Json(session.principal)
}
