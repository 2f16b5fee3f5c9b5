//! Diesel persistence for tickets and responses. All mutations on an existing
//! ticket go through [`update_ticket`], which enforces the single-writer
//! discipline with an optimistic version check.

use crate::shared::schema::{ticket_responses, tickets};
use crate::tickets::error::{ApiError, LifecycleError};
use crate::tickets::models::{Ticket, TicketResponse, TicketStatus};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

pub fn insert_ticket(conn: &mut PgConnection, ticket: &Ticket) -> Result<(), ApiError> {
    diesel::insert_into(tickets::table)
        .values(ticket)
        .execute(conn)?;
    Ok(())
}

pub fn find_ticket(conn: &mut PgConnection, ticket_id: Uuid) -> Result<Ticket, ApiError> {
    tickets::table
        .filter(tickets::id.eq(ticket_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| LifecycleError::NotFound.into())
}

/// Compare-and-set write: succeeds only if the row still carries the version
/// the ticket was loaded at, and bumps it. Zero rows updated means a
/// concurrent writer got there first and the caller's copy is stale.
pub fn update_ticket(conn: &mut PgConnection, ticket: &mut Ticket) -> Result<(), ApiError> {
    let expected = ticket.version;
    ticket.version = expected + 1;
    let updated = diesel::update(
        tickets::table
            .filter(tickets::id.eq(ticket.id))
            .filter(tickets::version.eq(expected)),
    )
    .set(&*ticket)
    .execute(conn)?;
    if updated == 0 {
        ticket.version = expected;
        return Err(LifecycleError::Conflict(
            "ticket was modified concurrently, retry".to_string(),
        )
        .into());
    }
    Ok(())
}

pub fn insert_response(
    conn: &mut PgConnection,
    response: &TicketResponse,
) -> Result<(), ApiError> {
    diesel::insert_into(ticket_responses::table)
        .values(response)
        .execute(conn)?;
    Ok(())
}

pub fn responses_for_ticket(
    conn: &mut PgConnection,
    ticket_id: Uuid,
) -> Result<Vec<TicketResponse>, ApiError> {
    Ok(ticket_responses::table
        .filter(ticket_responses::ticket_id.eq(ticket_id))
        .order(ticket_responses::created_at.asc())
        .load(conn)?)
}

pub fn list_for_owner(
    conn: &mut PgConnection,
    owner_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Ticket>, ApiError> {
    Ok(tickets::table
        .filter(tickets::owner_id.eq(owner_id))
        .order(tickets::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(conn)?)
}

pub fn count_for_owner(conn: &mut PgConnection, owner_id: &str) -> Result<i64, ApiError> {
    Ok(tickets::table
        .filter(tickets::owner_id.eq(owner_id))
        .count()
        .get_result(conn)?)
}

#[derive(Debug, Default)]
pub struct TicketFilter {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub severity: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub fn list_all(conn: &mut PgConnection, filter: TicketFilter) -> Result<Vec<Ticket>, ApiError> {
    let mut q = tickets::table.into_boxed();
    if let Some(status) = filter.status {
        q = q.filter(tickets::status.eq(status));
    }
    if let Some(kind) = filter.kind {
        q = q.filter(tickets::kind.eq(kind));
    }
    if let Some(severity) = filter.severity {
        q = q.filter(tickets::severity.eq(severity));
    }
    let limit = if filter.limit > 0 { filter.limit } else { 50 };
    Ok(q.order(tickets::created_at.desc())
        .limit(limit)
        .offset(filter.offset)
        .load(conn)?)
}

#[derive(Debug, Serialize)]
pub struct KindStats {
    pub total: i64,
    pub open: i64,
    pub resolved: i64,
}

#[derive(Debug, Serialize)]
pub struct SupportStatistics {
    pub support_requests: KindStats,
    pub bug_reports: KindStats,
    pub high_severity_open_bugs: i64,
}

pub fn statistics(conn: &mut PgConnection) -> Result<SupportStatistics, ApiError> {
    let kind_stats = |conn: &mut PgConnection, kind: &str| -> Result<KindStats, ApiError> {
        let total = tickets::table
            .filter(tickets::kind.eq(kind))
            .count()
            .get_result(conn)?;
        let open = tickets::table
            .filter(tickets::kind.eq(kind))
            .filter(tickets::status.eq(TicketStatus::Open.as_str()))
            .count()
            .get_result(conn)?;
        let resolved = tickets::table
            .filter(tickets::kind.eq(kind))
            .filter(tickets::status.eq(TicketStatus::Resolved.as_str()))
            .count()
            .get_result(conn)?;
        Ok(KindStats {
            total,
            open,
            resolved,
        })
    };

    let support_requests = kind_stats(conn, "support")?;
    let bug_reports = kind_stats(conn, "bug")?;
    let high_severity_open_bugs = tickets::table
        .filter(tickets::kind.eq("bug"))
        .filter(tickets::status.eq(TicketStatus::Open.as_str()))
        .filter(tickets::severity.eq_any(["high", "critical"]))
        .count()
        .get_result(conn)?;

    Ok(SupportStatistics {
        support_requests,
        bug_reports,
        high_severity_open_bugs,
    })
}
