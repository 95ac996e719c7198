use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Extension, Json, Router, middleware};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use docket_core::datetime::parse_date_expr;
use docket_core::error::EntityKind;
use docket_core::task::{self, Category, DEFAULT_CATEGORY_COLOR, Task, TaskDraft};
use docket_core::view::{CategorySelector, Tab, TaskQuery, UNCATEGORIZED_KEY};
use docket_shared::{AuthResponse, CategoryCreate, Credentials, TaskCreate, TaskPatch, TasksQuery};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::auth::{AuthUser, auth_middleware};
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

pub fn router(state: SharedState) -> Router {
    let protected = Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:id", delete(delete_category))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/:id", patch(update_task).delete(delete_task))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .merge(protected)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[instrument(skip_all)]
async fn register(
    State(state): State<SharedState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let Json(creds) = payload.map_err(bad_json)?;
    let auth = state.register(&creds.email, &creds.password).await?;
    Ok((StatusCode::CREATED, Json(auth)))
}

#[instrument(skip_all)]
async fn login(
    State(state): State<SharedState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(creds) = payload.map_err(bad_json)?;
    Ok(Json(state.login(&creds.email, &creds.password).await?))
}

#[instrument(skip_all, fields(user = %user.id))]
async fn list_categories(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Category>>> {
    let categories = state.read(user.id, |model| model.categories().to_vec())?;
    Ok(Json(categories))
}

#[instrument(skip_all, fields(user = %user.id))]
async fn create_category(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CategoryCreate>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let Json(body) = payload.map_err(bad_json)?;
    let color = body
        .color
        .filter(|color| !color.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string());

    let category = state.update(user.id, |model| {
        let id = model
            .create_category(&body.name, &color)
            .ok_or_else(|| ApiError::bad_request("Category name is required"))?;
        model
            .category(id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(EntityKind::Category))
    })?;

    info!(category = %category.id(), "created category");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip_all, fields(user = %user.id, category = %id))]
async fn delete_category(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, EntityKind::Category)?;
    state.update(user.id, |model| Ok(model.delete_category(id)?))?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, fields(user = %user.id))]
async fn list_tasks(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<TasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let query = task_query(&params)?;
    let tz = *state.timezone();
    let tasks = state.read(user.id, |model| {
        query
            .apply(model.tasks(), &tz)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>()
    })?;
    debug!(count = tasks.len(), "listed tasks");
    Ok(Json(tasks))
}

#[instrument(skip_all, fields(user = %user.id))]
async fn create_task(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<TaskCreate>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let Json(body) = payload.map_err(bad_json)?;
    let now = Utc::now();
    let tz = *state.timezone();

    let draft = TaskDraft {
        title: body.title,
        description: body.description,
        category_id: body.category_id,
        reminder_date: parse_optional_instant(body.reminder_date.as_deref(), now, &tz)?,
        due_date: parse_optional_instant(body.due_date.as_deref(), now, &tz)?,
    };

    let task = state.update(user.id, |model| {
        let id = model
            .create_task(draft, now)
            .ok_or_else(|| ApiError::bad_request("Task title is required"))?;
        model
            .task(id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(EntityKind::Task))
    })?;

    info!(task = %task.id(), "created task");
    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip_all, fields(user = %user.id, task = %id))]
async fn update_task(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let id = parse_id(&id, EntityKind::Task)?;
    let Json(body) = payload.map_err(bad_json)?;
    let patch = core_patch(body, Utc::now(), state.timezone())?;

    let task = state.update(user.id, |model| {
        model.edit_fields(id, &patch)?;
        model
            .task(id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(EntityKind::Task))
    })?;
    Ok(Json(task))
}

#[instrument(skip_all, fields(user = %user.id, task = %id))]
async fn delete_task(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, EntityKind::Task)?;
    state.update(user.id, |model| Ok(model.delete_task(id)?))?;
    Ok(StatusCode::NO_CONTENT)
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

/// An id that does not parse cannot name anything, so it is reported the
/// same way as an unknown one.
fn parse_id(raw: &str, kind: EntityKind) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::not_found(kind))
}

fn parse_optional_instant(
    raw: Option<&str>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> ApiResult<Option<DateTime<Utc>>> {
    raw.map(|raw| parse_instant(raw, now, tz)).transpose()
}

fn parse_instant(raw: &str, now: DateTime<Utc>, tz: &Tz) -> ApiResult<DateTime<Utc>> {
    parse_date_expr(raw, now, tz).map_err(|err| ApiError::bad_request(format!("{err:#}")))
}

fn core_patch(body: TaskPatch, now: DateTime<Utc>, tz: &Tz) -> ApiResult<task::TaskPatch> {
    let instant = |slot: Option<Option<String>>| -> ApiResult<Option<Option<DateTime<Utc>>>> {
        slot.map(|value| parse_optional_instant(value.as_deref(), now, tz))
            .transpose()
    };

    Ok(task::TaskPatch {
        title: body.title,
        description: body.description,
        category_id: body.category_id,
        due_date: instant(body.due_date)?,
        reminder_date: instant(body.reminder_date)?,
        completed: body.completed,
        is_starred: body.is_starred,
    })
}

fn task_query(params: &TasksQuery) -> ApiResult<TaskQuery> {
    let category = match params.category.as_deref().map(str::trim) {
        None | Some("") | Some("all") => CategorySelector::All,
        Some(UNCATEGORIZED_KEY) => CategorySelector::Uncategorized,
        Some(raw) => CategorySelector::Category(
            Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("invalid category filter"))?,
        ),
    };

    let due_on = params
        .date
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| ApiError::bad_request("date must be YYYY-MM-DD"))
        })
        .transpose()?;

    Ok(TaskQuery {
        category,
        tab: params.tab.as_deref().map(Tab::from_key).unwrap_or_default(),
        search: params.search.clone(),
        due_on,
        starred_only: params.starred.unwrap_or(false),
    })
}
