pub mod error;
pub mod lifecycle;
pub mod models;
pub mod store;
pub mod views;

use crate::auth::Actor;
use crate::shared::state::AppState;
use crate::shared::utils::DbConn;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use diesel::Connection;
use error::{ApiError, LifecycleError};
use lifecycle::{AdminPatch, TicketDraft};
use models::{Severity, Ticket, TicketKind, TicketResponse, TicketStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store::{SupportStatistics, TicketFilter};
use uuid::Uuid;
use views::{owner_detail, owner_view, AdminTicketDetail, OwnerTicketDetail, OwnerTicketView};

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    /// "support" (default) or "bug".
    pub kind: Option<String>,
    pub category: String,
    pub subject: String,
    pub message: String,
    pub severity: Option<String>,
    pub steps_to_reproduce: Option<String>,
    pub expected_behavior: Option<String>,
    pub actual_behavior: Option<String>,
    pub system_info: Option<serde_json::Value>,
}

impl CreateTicketRequest {
    fn into_draft(self) -> Result<TicketDraft, LifecycleError> {
        let kind = match self.kind.as_deref() {
            None => TicketKind::Support,
            Some(k) => TicketKind::parse(k).ok_or_else(|| {
                LifecycleError::Validation(format!(
                    "invalid kind '{k}', must be 'support' or 'bug'"
                ))
            })?,
        };
        let severity = match self.severity.as_deref() {
            None => None,
            Some(s) => Some(Severity::parse(s).ok_or_else(|| {
                LifecycleError::Validation(format!(
                    "invalid severity '{s}', must be one of: low, medium, high, critical"
                ))
            })?),
        };
        Ok(TicketDraft {
            kind,
            category: self.category,
            subject: self.subject,
            body: self.message,
            severity,
            steps_to_reproduce: self.steps_to_reproduce,
            expected_behavior: self.expected_behavior,
            actual_behavior: self.actual_behavior,
            system_info: self.system_info,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateResponseRequest {
    pub message: String,
    pub is_internal: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTicketRequest {
    pub assignee_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateRequest {
    pub severity: Option<String>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub severity: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TicketHistory {
    pub tickets: Vec<OwnerTicketView>,
    pub count: i64,
}

fn db(state: &AppState) -> Result<DbConn, ApiError> {
    state.conn.get().map_err(|e| ApiError::Pool(e.to_string()))
}

/// Loads a ticket scoped to the caller: non-admins only ever see their own.
fn find_scoped(conn: &mut DbConn, ticket_id: Uuid, actor: &Actor) -> Result<Ticket, ApiError> {
    let ticket = store::find_ticket(conn, ticket_id)?;
    if !actor.is_admin && !actor.owns(&ticket.owner_id) {
        return Err(LifecycleError::NotFound.into());
    }
    Ok(ticket)
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<OwnerTicketDetail>, ApiError> {
    let draft = req.into_draft()?;
    let (ticket, intents) = lifecycle::create(&actor, draft, Utc::now())?;

    let mut conn = db(&state)?;
    store::insert_ticket(&mut conn, &ticket)?;
    log::info!("created {} ticket {} for user {}", ticket.kind, ticket.id, actor.user_id);

    state.outbox.dispatch(intents);
    Ok(Json(owner_detail(&ticket, &[])))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<OwnerTicketDetail>, ApiError> {
    let mut conn = db(&state)?;
    let ticket = find_scoped(&mut conn, id, &actor)?;
    let responses = store::responses_for_ticket(&mut conn, ticket.id)?;
    Ok(Json(owner_detail(&ticket, &responses)))
}

pub async fn list_my_tickets(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<TicketHistory>, ApiError> {
    let mut conn = db(&state)?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);
    let tickets = store::list_for_owner(&mut conn, &actor.user_id, limit, offset)?;
    let count = store::count_for_owner(&mut conn, &actor.user_id)?;
    Ok(Json(TicketHistory {
        tickets: tickets.iter().map(owner_view).collect(),
        count,
    }))
}

pub async fn change_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<OwnerTicketView>, ApiError> {
    let next = TicketStatus::parse(&req.status).ok_or_else(|| {
        LifecycleError::Validation(format!(
            "invalid status '{}', must be one of: open, in_progress, resolved, closed",
            req.status
        ))
    })?;

    let mut conn = db(&state)?;
    let mut ticket = find_scoped(&mut conn, id, &actor)?;
    let intents = lifecycle::transition(
        &mut ticket,
        next,
        &actor,
        &state.config.lifecycle,
        Utc::now(),
    )?;
    store::update_ticket(&mut conn, &mut ticket)?;
    log::info!("ticket {} moved to {} by {}", ticket.id, next, actor.user_id);

    state.outbox.dispatch(intents);
    Ok(Json(owner_view(&ticket)))
}

pub async fn create_response(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateResponseRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    let is_internal = req.is_internal.unwrap_or(false);

    let mut conn = db(&state)?;
    let mut ticket = find_scoped(&mut conn, id, &actor)?;
    let (response, intents) =
        lifecycle::add_response(&mut ticket, &actor, &req.message, is_internal, Utc::now())?;

    // one atomic unit: the response and the ticket's updated_at move together
    conn.transaction::<_, ApiError, _>(|conn| {
        store::update_ticket(conn, &mut ticket)?;
        store::insert_response(conn, &response)?;
        Ok(())
    })?;

    state.outbox.dispatch(intents);
    Ok(Json(response))
}

pub async fn assign_ticket(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignTicketRequest>,
) -> Result<Json<Ticket>, ApiError> {
    require_admin(&actor)?;
    let mut conn = db(&state)?;
    let mut ticket = store::find_ticket(&mut conn, id)?;
    lifecycle::assign(&mut ticket, &req.assignee_id, &actor, Utc::now())?;
    store::update_ticket(&mut conn, &mut ticket)?;
    Ok(Json(ticket))
}

pub async fn admin_get_ticket(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminTicketDetail>, ApiError> {
    require_admin(&actor)?;
    let mut conn = db(&state)?;
    let ticket = store::find_ticket(&mut conn, id)?;
    let responses = store::responses_for_ticket(&mut conn, ticket.id)?;
    Ok(Json(views::admin_detail(ticket, responses)))
}

pub async fn admin_update_ticket(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateRequest>,
) -> Result<Json<Ticket>, ApiError> {
    let severity = match req.severity.as_deref() {
        None => None,
        Some(s) => Some(Severity::parse(s).ok_or_else(|| {
            LifecycleError::Validation(format!("invalid severity '{s}'"))
        })?),
    };

    let mut conn = db(&state)?;
    let mut ticket = store::find_ticket(&mut conn, id)?;
    lifecycle::admin_update(
        &mut ticket,
        AdminPatch {
            severity,
            admin_notes: req.admin_notes,
        },
        &actor,
        Utc::now(),
    )?;
    store::update_ticket(&mut conn, &mut ticket)?;
    Ok(Json(ticket))
}

pub async fn admin_list_tickets(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    require_admin(&actor)?;
    let mut conn = db(&state)?;
    let tickets = store::list_all(
        &mut conn,
        TicketFilter {
            status: query.status,
            kind: query.kind,
            severity: query.severity,
            limit: query.limit.unwrap_or(50).clamp(1, 200),
            offset: query.offset.unwrap_or(0).max(0),
        },
    )?;
    Ok(Json(tickets))
}

pub async fn admin_statistics(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<SupportStatistics>, ApiError> {
    require_admin(&actor)?;
    let mut conn = db(&state)?;
    Ok(Json(store::statistics(&mut conn)?))
}

fn require_admin(actor: &Actor) -> Result<(), ApiError> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden("admin access required".to_string()).into())
    }
}


pub fn configure_ticket_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/support/tickets",
            get(list_my_tickets).post(create_ticket),
        )
        .route("/api/support/tickets/:id", get(get_ticket))
        .route("/api/support/tickets/:id/status", put(change_status))
        .route("/api/support/tickets/:id/responses", post(create_response))
        .route("/api/support/admin/tickets", get(admin_list_tickets))
        .route(
            "/api/support/admin/tickets/:id",
            get(admin_get_ticket).put(admin_update_ticket),
        )
        .route("/api/support/admin/tickets/:id/assign", put(assign_ticket))
        .route("/api/support/admin/statistics", get(admin_statistics))
}
