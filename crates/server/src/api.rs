//! HTTP API for requisitions and users.
//!
//! Requisition endpoints:
//! - `POST   /requisitions`                   — create a requisition (server computes the total)
//! - `GET    /requisitions?createdBy={id}`    — list requisitions, optionally by creator
//! - `GET    /requisitions/{id}`              — fetch one requisition
//! - `PUT    /requisitions/{id}`              — replace title/description/items while draft|pending
//! - `POST   /requisitions/{id}/transition`   — approve | reject | process | complete
//! - `DELETE /requisitions/{id}`              — remove a draft requisition
//!
//! User endpoints:
//! - `POST /users`        — create a user (password stored as a salted hash)
//! - `GET  /users`        — list user profiles
//! - `POST /users/login`  — resolve email + password to a profile

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use reqflow_core::domain::requisition::{
    NewRequisition, NewRequisitionItem, Requisition, RequisitionId, RequisitionItem,
    RequisitionStatus,
};
use reqflow_core::domain::user::{NewUser, User, UserId};
use reqflow_core::errors::DomainError;
use reqflow_core::lifecycle::{
    LifecycleAuthority, LifecycleError, TransitionAction, TransitionRequest,
};
use reqflow_core::{hash_password, verify_password};
use reqflow_db::{
    DbPool, RepositoryError, RequisitionRepository, SqlRequisitionRepository, SqlUserRepository,
    UserRepository,
};

#[derive(Clone)]
pub struct ApiState {
    requisitions: Arc<SqlRequisitionRepository>,
    users: Arc<SqlUserRepository>,
    authority: LifecycleAuthority,
}

impl ApiState {
    pub fn new(pool: DbPool) -> Self {
        Self {
            requisitions: Arc::new(SqlRequisitionRepository::new(pool.clone())),
            users: Arc::new(SqlUserRepository::new(pool)),
            authority: LifecycleAuthority,
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBody {
    pub action: TransitionAction,
    pub actor: String,
    pub notes: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequisitionBody {
    pub title: String,
    pub description: String,
    pub items: Vec<NewRequisitionItem>,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// A stored record plus the display names the listing pages render.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionView {
    #[serde(flatten)]
    pub requisition: Requisition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(pool: DbPool) -> Router {
    Router::new()
        .route("/requisitions", post(create_requisition).get(list_requisitions))
        .route(
            "/requisitions/{id}",
            get(get_requisition).put(update_requisition).delete(delete_requisition),
        )
        .route("/requisitions/{id}/transition", post(transition_requisition))
        .route("/users", post(create_user).get(list_users))
        .route("/users/login", post(login))
        .with_state(ApiState::new(pool))
}

// ---------------------------------------------------------------------------
// Requisition handlers
// ---------------------------------------------------------------------------

async fn create_requisition(
    State(state): State<ApiState>,
    Json(mut body): Json<NewRequisition>,
) -> ApiResult<(StatusCode, Json<Requisition>)> {
    body.validate().map_err(validation_error)?;

    let creator = UserId(body.created_by.clone());
    if state.users.find_by_id(&creator).await.map_err(db_error)?.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError { error: format!("unknown creator `{}`", creator.0) }),
        ));
    }

    let now = Utc::now();
    let items: Vec<RequisitionItem> = body
        .items
        .iter()
        .map(|item| RequisitionItem {
            id: new_id("ITM"),
            name: item.name.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            estimated_cost: item.estimated_cost,
            justification: item.justification.clone(),
        })
        .collect();

    let record = Requisition {
        id: RequisitionId(new_id("REQ")),
        title: body.title.clone(),
        description: body.description.clone(),
        total_cost: Requisition::computed_total(&items),
        items,
        status: body.entry_status(),
        created_by: creator,
        approved_by: None,
        approved_at: None,
        rejected_by: None,
        rejected_at: None,
        rejection_reason: None,
        processing_notes: None,
        created_at: now,
        updated_at: now,
    };

    state.requisitions.create(&record).await.map_err(db_error)?;

    info!(
        event_name = "requisition.created",
        requisition_id = %record.id.0,
        created_by = %record.created_by.0,
        status = %record.status,
        total_cost = %record.total_cost,
        "requisition created"
    );

    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_requisitions(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<RequisitionView>>> {
    let created_by = query.created_by.map(UserId);
    let records =
        state.requisitions.list(created_by.as_ref()).await.map_err(db_error)?;

    let mut views = Vec::with_capacity(records.len());
    for record in records {
        views.push(with_display_names(&state, record).await?);
    }

    Ok(Json(views))
}

async fn get_requisition(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RequisitionView>> {
    let record = load_requisition(&state, &id).await?;
    Ok(Json(with_display_names(&state, record).await?))
}

async fn transition_requisition(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> ApiResult<Json<RequisitionView>> {
    let mut record = load_requisition(&state, &id).await?;

    let actor_id = UserId(body.actor.trim().to_string());
    let Some(actor) = state.users.find_by_id(&actor_id).await.map_err(db_error)? else {
        warn!(
            event_name = "requisition.transition_unknown_actor",
            requisition_id = %record.id.0,
            actor = %actor_id.0,
            "transition attempted by unknown actor"
        );
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiError { error: format!("actor `{}` is not authorized", actor_id.0) }),
        ));
    };

    let request = TransitionRequest {
        action: body.action,
        actor_id: actor.id.clone(),
        actor_role: actor.role,
        reason: body.reason,
        notes: body.notes,
    };

    let now = Utc::now();
    let outcome = state
        .authority
        .evaluate(&record, &request, now)
        .map_err(|err| lifecycle_error(&record.id, err))?;
    outcome.apply_to(&mut record, now);

    let applied =
        state.requisitions.apply_transition(&record, outcome.from).await.map_err(db_error)?;
    if !applied {
        // The status guard missed: another writer moved the record first.
        let current = load_requisition(&state, &id).await?;
        return Err(lifecycle_error(
            &record.id,
            LifecycleError::IllegalTransition { from: current.status, to: outcome.to },
        ));
    }

    info!(
        event_name = "requisition.transition_applied",
        requisition_id = %record.id.0,
        actor = %actor.id.0,
        action = %outcome.action,
        from = %outcome.from,
        to = %outcome.to,
        "requisition transition applied"
    );

    Ok(Json(with_display_names(&state, record).await?))
}

async fn update_requisition(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRequisitionBody>,
) -> ApiResult<Json<RequisitionView>> {
    let mut record = load_requisition(&state, &id).await?;

    if !matches!(record.status, RequisitionStatus::Draft | RequisitionStatus::Pending) {
        return Err((
            StatusCode::CONFLICT,
            Json(ApiError {
                error: format!(
                    "requisition can no longer be edited (current status {})",
                    record.status
                ),
            }),
        ));
    }

    // Reuse the creation shape for validation; the creator and status are
    // not editable here.
    let mut content = NewRequisition {
        title: body.title,
        description: body.description,
        items: body.items,
        created_by: record.created_by.0.clone(),
        status: None,
    };
    content.validate().map_err(validation_error)?;

    record.title = content.title;
    record.description = content.description;
    record.items = content
        .items
        .iter()
        .map(|item| RequisitionItem {
            id: new_id("ITM"),
            name: item.name.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            estimated_cost: item.estimated_cost,
            justification: item.justification.clone(),
        })
        .collect();
    record.total_cost = Requisition::computed_total(&record.items);
    record.updated_at = Utc::now();

    let updated = state.requisitions.update_content(&record).await.map_err(db_error)?;
    if !updated {
        let current = load_requisition(&state, &id).await?;
        return Err((
            StatusCode::CONFLICT,
            Json(ApiError {
                error: format!(
                    "requisition can no longer be edited (current status {})",
                    current.status
                ),
            }),
        ));
    }

    info!(
        event_name = "requisition.content_updated",
        requisition_id = %record.id.0,
        total_cost = %record.total_cost,
        "requisition content updated"
    );

    Ok(Json(with_display_names(&state, record).await?))
}

async fn delete_requisition(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiMessage>> {
    let record = load_requisition(&state, &id).await?;

    state
        .authority
        .authorize_delete(&record)
        .map_err(|err| lifecycle_error(&record.id, err))?;

    let deleted = state.requisitions.delete(&record.id).await.map_err(db_error)?;
    if !deleted {
        return Err(not_found(&id));
    }

    info!(
        event_name = "requisition.deleted",
        requisition_id = %record.id.0,
        "requisition deleted"
    );

    Ok(Json(ApiMessage {
        success: true,
        message: format!("Requisition {} deleted.", record.id.0),
    }))
}

// ---------------------------------------------------------------------------
// User handlers
// ---------------------------------------------------------------------------

async fn create_user(
    State(state): State<ApiState>,
    Json(mut body): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    body.validate().map_err(validation_error)?;

    let password_hash = hash_password(&body.password).map_err(|err| {
        error!(event_name = "user.hash_failed", error = %err, "password hashing failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError { error: "an internal error occurred".to_string() }),
        )
    })?;

    let now = Utc::now();
    let user = User {
        id: UserId(new_id("USR")),
        username: body.username,
        email: body.email,
        role: body.role,
        department: body.department,
        created_at: now,
        updated_at: now,
    };

    state.users.create(&user, &password_hash).await.map_err(|err| {
        if err.is_unique_violation() {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError { error: "username or email is already taken".to_string() }),
            )
        } else {
            db_error(err)
        }
    })?;

    info!(
        event_name = "user.created",
        user_id = %user.id.0,
        role = %user.role,
        "user created"
    );

    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(State(state): State<ApiState>) -> ApiResult<Json<Vec<User>>> {
    let users = state.users.list().await.map_err(db_error)?;
    Ok(Json(users))
}

async fn login(
    State(state): State<ApiState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<User>> {
    let email = body.email.trim();

    // Unknown email and wrong password produce the same response, so the
    // endpoint cannot be used to enumerate accounts.
    let Some((user, password_hash)) =
        state.users.find_by_email(email).await.map_err(db_error)?
    else {
        return Err(invalid_credentials());
    };

    if verify_password(&body.password, &password_hash).is_err() {
        warn!(
            event_name = "user.login_failed",
            user_id = %user.id.0,
            "login attempt with wrong password"
        );
        return Err(invalid_credentials());
    }

    info!(event_name = "user.login", user_id = %user.id.0, "user logged in");

    Ok(Json(user))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_requisition(state: &ApiState, id: &str) -> ApiResult<Requisition> {
    state
        .requisitions
        .find_by_id(&RequisitionId(id.to_string()))
        .await
        .map_err(db_error)?
        .ok_or_else(|| not_found(id))
}

async fn with_display_names(
    state: &ApiState,
    requisition: Requisition,
) -> ApiResult<RequisitionView> {
    let created_by_name = display_name(state, Some(&requisition.created_by)).await?;
    let approved_by_name = display_name(state, requisition.approved_by.as_ref()).await?;
    let rejected_by_name = display_name(state, requisition.rejected_by.as_ref()).await?;

    Ok(RequisitionView { requisition, created_by_name, approved_by_name, rejected_by_name })
}

async fn display_name(state: &ApiState, id: Option<&UserId>) -> ApiResult<Option<String>> {
    let Some(id) = id else {
        return Ok(None);
    };
    let user = state.users.find_by_id(id).await.map_err(db_error)?;
    Ok(user.map(|user| user.username))
}

fn validation_error(error: DomainError) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError { error: error.to_string() }))
}

fn lifecycle_error(
    id: &RequisitionId,
    error: LifecycleError,
) -> (StatusCode, Json<ApiError>) {
    let status = match &error {
        LifecycleError::Authorization { .. } => StatusCode::FORBIDDEN,
        LifecycleError::IllegalTransition { .. } | LifecycleError::DeleteRestricted { .. } => {
            StatusCode::CONFLICT
        }
        LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
    };

    warn!(
        event_name = "requisition.transition_rejected",
        requisition_id = %id.0,
        error = %error,
        "lifecycle rule rejected the request"
    );

    (status, Json(ApiError { error: error.to_string() }))
}

fn not_found(id: &str) -> (StatusCode, Json<ApiError>) {
    (StatusCode::NOT_FOUND, Json(ApiError { error: format!("requisition `{id}` not found") }))
}

fn invalid_credentials() -> (StatusCode, Json<ApiError>) {
    (StatusCode::UNAUTHORIZED, Json(ApiError { error: "invalid email or password".to_string() }))
}

fn db_error(error: RepositoryError) -> (StatusCode, Json<ApiError>) {
    error!(error = %error, "api database error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError { error: "an internal error occurred".to_string() }),
    )
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..12])
}
