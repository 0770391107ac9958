//! HTTP JSON API.
//!
//! Routes (all JSON):
//!
//! - `GET /health`
//! - `GET /admin`, `GET /admin/{model}`
//! - `GET|POST /users`, `GET|PUT|DELETE /users/{id}`, `GET|PUT /users/{id}/profile`
//! - `GET|POST /users/{id}/items`, `GET /items`, `GET|PUT|DELETE /items/{id}`,
//!   `POST /items/{id}/wash`
//! - `GET|POST /items/{id}/logs`, `DELETE /logs/{id}`
//!
//! When `Settings::auth_token` is set, everything except `/health` requires
//! `Authorization: Bearer <token>` or a `token=<token>` query parameter.
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

use crate::admin::{self, ModelMeta};
use crate::error::{Error, Result, ValidationError};
use crate::models::{
    ItemUpdate, LaundryItem, LaundryLog, NewLaundryItem, NewLaundryLog, NewUser, ProfileUpdate,
    User, UserProfile,
};
use crate::orm::{self, Db};
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub settings: Settings,
}

impl AppState {
    /// Connects to `settings.database_url` and brings the schema up to date.
    pub async fn prepare(settings: Settings) -> Result<Self> {
        let db = Arc::new(Db::connect(&settings.database_url).await?);
        orm::auto_migrate(db.clone()).await?;
        if let Some(dir) = &settings.migrations_dir {
            orm::apply_migration_files(db.clone(), dir).await?;
        }
        Ok(AppState { db, settings })
    }
}

/// [`Error`] rendered as `{"error": ...}` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } | Error::UnknownModel(_) => StatusCode::NOT_FOUND,
            err if err.is_unique_violation() => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self.0 {
            Error::Validation(err) => json!({ "error": err.message, "field": err.field }),
            err if status == StatusCode::INTERNAL_SERVER_ERROR => {
                error!("request failed: {}", err);
                json!({ "error": "internal server error" })
            }
            err => json!({ "error": err.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(Error::BadRequest(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError(Error::BadRequest(rejection.body_text()))
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// `axum::Json` whose rejections render as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
struct ApiJson<T>(T);

/// `axum::extract::Path` whose rejections render as [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
struct ApiPath<T>(T);

/// Builds the API router over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/admin", get(admin_index))
        .route("/admin/{model}", get(admin_rows))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/users/{id}/profile", get(get_profile).put(update_profile))
        .route("/users/{id}/items", get(list_user_items).post(create_item))
        .route("/items", get(list_items))
        .route("/items/{id}", get(get_item).put(update_item).delete(delete_item))
        .route("/items/{id}/wash", post(wash_item))
        .route("/items/{id}/logs", get(list_logs).post(create_log))
        .route("/logs/{id}", delete(delete_log))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
        .route("/health", get(health))
        .fallback(no_route)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Binds `settings.host:settings.port` and serves until the process stops.
pub async fn run(settings: Settings) -> Result<()> {
    let addr = settings.bind_addr();
    let state = AppState::prepare(settings).await?;
    let app = build_router(state);

    let listener = TcpListener::bind(addr.as_str()).await?;
    info!("HTTP Server running on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.settings.auth_token.as_deref() else {
        return next.run(request).await;
    };

    let presented = bearer_token(request.headers())
        .map(str::to_string)
        .or_else(|| query_token(request.uri()));
    if presented.as_deref() == Some(expected) {
        next.run(request).await
    } else {
        (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "missing or invalid token" })),
        )
            .into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Percent-decoded `token` query parameter.
fn query_token(uri: &Uri) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(uri).ok()?.0.token
}

async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    info!(
        "{} {} -> {} in {}ms",
        method,
        path,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}

async fn no_route(uri: Uri) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("no route for {}", uri.path()) })),
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn admin_index() -> Json<Vec<ModelMeta>> {
    Json(admin::registered().iter().map(|entry| entry.meta()).collect())
}

async fn admin_rows(
    State(state): State<AppState>,
    ApiPath(model): ApiPath<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let entry = admin::find(&model).ok_or_else(|| Error::UnknownModel(model.clone()))?;
    let rows = (entry.rows)(state.db.clone()).await?;
    Ok(Json(json!({ "model": entry.meta(), "rows": rows })))
}

async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(User::all(&state.db).await?))
}

async fn create_user(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = User::create(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<User>> {
    Ok(Json(User::get(&state.db, id).await?))
}

async fn update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<NewUser>,
) -> ApiResult<Json<User>> {
    let mut user = User::get(&state.db, id).await?;
    user.username = update.username;
    user.email = update.email;
    user.is_staff = update.is_staff;
    Ok(Json(user.save(&state.db).await?))
}

async fn delete_user(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<StatusCode> {
    User::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_profile(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<Json<UserProfile>> {
    User::get(&state.db, user_id).await?;
    Ok(Json(UserProfile::for_user(&state.db, user_id).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<UserProfile>> {
    User::get(&state.db, user_id).await?;
    Ok(Json(UserProfile::update(&state.db, user_id, update).await?))
}

async fn list_user_items(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<LaundryItem>>> {
    User::get(&state.db, user_id).await?;
    Ok(Json(LaundryItem::for_user(&state.db, user_id).await?))
}

async fn create_item(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(new): ApiJson<NewLaundryItem>,
) -> ApiResult<(StatusCode, Json<LaundryItem>)> {
    let item = LaundryItem::create(&state.db, user_id, new).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn list_items(State(state): State<AppState>) -> ApiResult<Json<Vec<LaundryItem>>> {
    Ok(Json(LaundryItem::all(&state.db).await?))
}

async fn get_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<LaundryItem>> {
    Ok(Json(LaundryItem::get(&state.db, id).await?))
}

async fn update_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<ItemUpdate>,
) -> ApiResult<Json<LaundryItem>> {
    Ok(Json(LaundryItem::update(&state.db, id, update).await?))
}

async fn delete_item(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<StatusCode> {
    LaundryItem::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct WashRequest {
    #[serde(default = "default_washed")]
    washed: bool,
}

fn default_washed() -> bool {
    true
}

async fn wash_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    body: Bytes,
) -> ApiResult<Json<LaundryItem>> {
    let washed = if body.is_empty() {
        true
    } else {
        serde_json::from_slice::<WashRequest>(&body)
            .map_err(|err| Error::Validation(ValidationError::new("washed", err.to_string())))?
            .washed
    };
    Ok(Json(LaundryItem::set_washed(&state.db, id, washed).await?))
}

async fn list_logs(
    State(state): State<AppState>,
    ApiPath(item_id): ApiPath<i64>,
) -> ApiResult<Json<Vec<LaundryLog>>> {
    LaundryItem::get(&state.db, item_id).await?;
    Ok(Json(LaundryLog::for_item(&state.db, item_id).await?))
}

async fn create_log(
    State(state): State<AppState>,
    ApiPath(item_id): ApiPath<i64>,
    ApiJson(new): ApiJson<NewLaundryLog>,
) -> ApiResult<(StatusCode, Json<LaundryLog>)> {
    let log = LaundryLog::record(&state.db, item_id, new).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

async fn delete_log(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<StatusCode> {
    LaundryLog::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn token_is_read_from_query() {
        assert_eq!(query_token(&uri("/users?a=1&token=abc123")).as_deref(), Some("abc123"));
        assert_eq!(query_token(&uri("/users?a=1")), None);
        assert_eq!(query_token(&uri("/users")), None);
    }

    #[test]
    fn query_token_is_percent_decoded() {
        assert_eq!(
            query_token(&uri("/users?token=s3cr%26t%2B1%25")).as_deref(),
            Some("s3cr&t+1%")
        );
        assert_eq!(query_token(&uri("/users?token=a+b")).as_deref(), Some("a b"));
    }

    #[test]
    fn error_statuses() {
        let not_found = ApiError(Error::not_found("User", 1));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        let invalid = ApiError(Error::Validation(ValidationError::new("item_name", "too long")));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        let bad = ApiError(Error::BadRequest("expected a number".into()));
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        let other = ApiError(Error::Server("boom".into()));
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
