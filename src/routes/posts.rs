use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::blog::domain::{CommentId, PostId, PostInput};
use crate::blog::query::ListParams;
use crate::blog::tags::{parse_flag, parse_tags};
use crate::error::{AppError, AppResult, FieldError};
use crate::extractors::CurrentUser;
use crate::routes::json_body;
use crate::state::AppState;
use crate::uploads::ImageUpload;

// --- Request bodies ---

#[derive(Deserialize, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CommentRequest {
    pub content: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ReactionRequest {
    pub emoji: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/search", get(search_posts))
        .route(
            "/api/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/api/posts/{id}/comments", post(add_comment))
        .route(
            "/api/posts/{id}/comments/{comment_id}/reactions",
            post(react_to_comment),
        )
}

// --- Handlers ---

async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Response> {
    let page = state.posts.list(&params).await?;

    Ok(Json(json!({
        "success": true,
        "count": page.posts.len(),
        "total": page.total,
        "page": page.page.number,
        "pages": page.pages(),
        "data": page.posts,
    }))
    .into_response())
}

async fn search_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    let posts = state.posts.search(query.q.as_deref()).await?;

    Ok(Json(json!({
        "success": true,
        "count": posts.len(),
        "data": posts,
    }))
    .into_response())
}

async fn get_post(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let post = state.posts.view(&id).await?;
    Ok(Json(json!({ "success": true, "data": post })).into_response())
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    form: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    let form = form.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let (input, image) = read_post_form(form).await?;

    let post = state.posts.create(&user.requester(), input, image).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": post })),
    )
        .into_response())
}

async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    form: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    let form = form.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let (input, image) = read_post_form(form).await?;

    let post = state
        .posts
        .update(&user.requester(), &PostId::new(id), input, image)
        .await?;
    Ok(Json(json!({ "success": true, "data": post })).into_response())
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    state
        .posts
        .delete(&user.requester(), &PostId::new(id))
        .await?;
    Ok(Json(json!({ "success": true, "data": {} })).into_response())
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> AppResult<Response> {
    let req = json_body(payload)?;
    let post = state
        .posts
        .add_comment(&user.requester(), &PostId::new(id), req.content)
        .await?;
    Ok(Json(json!({ "success": true, "data": post })).into_response())
}

async fn react_to_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, comment_id)): Path<(String, String)>,
    payload: Result<Json<ReactionRequest>, JsonRejection>,
) -> AppResult<Response> {
    let req = json_body(payload)?;
    let post = state
        .posts
        .react(
            &user.requester(),
            &PostId::new(id),
            &CommentId::new(comment_id),
            req.emoji.as_deref(),
        )
        .await?;
    Ok(Json(json!({ "success": true, "data": post })).into_response())
}

// --- Form parsing ---

fn bad_form(e: MultipartError) -> AppError {
    AppError::BadRequest(format!("Malformed form data: {}", e.body_text()))
}

async fn field_text(field: Field<'_>) -> AppResult<String> {
    field.text().await.map_err(bad_form)
}

/// Collect the post fields of a multipart body. Unknown parts are ignored.
async fn read_post_form(mut form: Multipart) -> AppResult<(PostInput, Option<ImageUpload>)> {
    let mut input = PostInput::default();
    let mut image = None;

    while let Some(field) = form.next_field().await.map_err(bad_form)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "title" => input.title = Some(field_text(field).await?),
            "content" => input.content = Some(field_text(field).await?),
            "excerpt" => input.excerpt = Some(field_text(field).await?),
            "category" => input.category = Some(field_text(field).await?),
            "tags" => {
                let raw = field_text(field).await?;
                let tags = parse_tags(&raw).map_err(|e| {
                    AppError::Validation(vec![FieldError::new("tags", e.to_string())])
                })?;
                input.tags = Some(tags.into_inner());
            }
            "isPublished" => input.is_published = Some(parse_flag(&field_text(field).await?)),
            "featuredImage" => match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(bad_form)?;
                    // Browsers send an empty part when no file was picked
                    if !(file_name.is_empty() && bytes.is_empty()) {
                        image = Some(ImageUpload {
                            file_name,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                None => {
                    let value = field_text(field).await?;
                    if !value.trim().is_empty() {
                        input.featured_image = Some(value.trim().to_string());
                    }
                }
            },
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }

    Ok((input, image))
}
