use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::blog::categories::new_category;
use crate::blog::domain::CategoryId;
use crate::blog::slug::slugify;
use crate::blog::validation::validate_category;
use crate::db::models::Category;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::json_body;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories).post(create_category))
        .route(
            "/api/categories/{id}",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
}

fn category_not_found() -> AppError {
    AppError::NotFound("Category not found".into())
}

async fn find_category(state: &AppState, id_or_slug: &str) -> AppResult<Category> {
    state
        .categories
        .find(id_or_slug)
        .await?
        .ok_or_else(category_not_found)
}

async fn list_categories(State(state): State<AppState>) -> AppResult<Response> {
    let categories = state.categories.list().await?;
    Ok(Json(json!({
        "success": true,
        "count": categories.len(),
        "data": categories,
    }))
    .into_response())
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let category = find_category(&state, &id).await?;
    Ok(Json(json!({ "success": true, "data": category })).into_response())
}

async fn create_category(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> AppResult<Response> {
    user.require_admin()?;
    let req = json_body(payload)?;

    let (name, description) =
        validate_category(req.name, req.description, true).map_err(AppError::Validation)?;
    let name = name.ok_or_else(|| AppError::BadRequest("Category name is required".into()))?;

    let category = new_category(&name, description.as_deref().unwrap_or(""), Utc::now());
    if category.slug.is_empty() {
        return Err(AppError::BadRequest(
            "Category name must contain letters or digits".into(),
        ));
    }
    state.categories.insert(&category).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": category })),
    )
        .into_response())
}

async fn update_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> AppResult<Response> {
    user.require_admin()?;
    let req = json_body(payload)?;

    let (name, description) =
        validate_category(req.name, req.description, false).map_err(AppError::Validation)?;
    let existing = find_category(&state, &id).await?;
    let slug = name.as_deref().map(slugify);
    if slug.as_deref() == Some("") {
        return Err(AppError::BadRequest(
            "Category name must contain letters or digits".into(),
        ));
    }

    state
        .categories
        .update(
            &existing.id,
            name.as_deref(),
            slug.as_deref(),
            description.as_deref(),
        )
        .await?;

    let category = find_category(&state, existing.id.as_str()).await?;
    Ok(Json(json!({ "success": true, "data": category })).into_response())
}

async fn delete_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    user.require_admin()?;

    if !state.categories.delete(&CategoryId::new(id)).await? {
        return Err(category_not_found());
    }
    Ok(Json(json!({ "success": true, "data": {} })).into_response())
}
