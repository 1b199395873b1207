use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{password, session, users};
use crate::blog::validation::validate_registration;
use crate::error::{AppError, AppResult, FieldError};
use crate::extractors::CurrentUser;
use crate::routes::json_body;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize, Default)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// -- Handlers --

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Response> {
    let req = json_body(payload)?;
    let username = req.username.unwrap_or_default();
    let email = req.email.unwrap_or_default();
    let password = req.password.unwrap_or_default();

    validate_registration(&username, &email, &password).map_err(AppError::Validation)?;

    let hash = password::hash_password(password, state.config.auth.bcrypt_cost).await?;
    let user = users::insert_user(&state.db, username.trim(), &normalize_email(&email), &hash)?;
    let token = session::create_session(&state.db, &user.id, state.config.auth.session_hours)?;

    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "token": token, "user": user })),
    )
        .into_response())
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Response> {
    let req = json_body(payload)?;

    let mut errors = Vec::new();
    let email = req.email.filter(|e| !e.trim().is_empty());
    let password = req.password.filter(|p| !p.is_empty());
    if email.is_none() {
        errors.push(FieldError::new("email", "Email is required"));
    }
    if password.is_none() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::Validation(errors));
    };

    let (user, hash) = users::find_credentials(&state.db, &normalize_email(&email))?
        .ok_or(AppError::InvalidCredentials)?;
    if !password::verify_password(password, hash).await? {
        tracing::info!(user_id = %user.id, "login rejected");
        return Err(AppError::InvalidCredentials);
    }

    let token = session::create_session(&state.db, &user.id, state.config.auth.session_hours)?;
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "token": token, "user": user })),
    )
        .into_response())
}

/// POST /api/auth/logout — delete session and clear the cookie
pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    session::delete_session(&state.db, &user.token)?;

    Ok((
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )],
        Json(json!({ "success": true, "data": {} })),
    )
        .into_response())
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let user = users::find_by_id(&state.db, &user.id)?.ok_or(AppError::Unauthorized)?;
    Ok(Json(json!({ "success": true, "data": user })).into_response())
}
