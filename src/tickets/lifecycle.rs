//! Ticket lifecycle state machine.
//!
//! Pure functions over in-memory rows: each operation validates the actor's
//! capability and the requested change, mutates the ticket, and returns the
//! side-effect intents to queue once the mutation has committed. No I/O
//! happens here; persistence and dispatch are the caller's concern, which
//! keeps every rule unit-testable.

use crate::auth::Actor;
use crate::config::LifecyclePolicy;
use crate::outbox::{BugSnapshot, Intent, TicketDigest};
use crate::tickets::error::LifecycleError;
use crate::tickets::models::{Severity, Ticket, TicketKind, TicketResponse, TicketStatus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Validated input for ticket creation.
#[derive(Debug, Clone)]
pub struct TicketDraft {
    pub kind: TicketKind,
    pub category: String,
    pub subject: String,
    pub body: String,
    pub severity: Option<Severity>,
    pub steps_to_reproduce: Option<String>,
    pub expected_behavior: Option<String>,
    pub actual_behavior: Option<String>,
    pub system_info: Option<serde_json::Value>,
}

/// Admin-only mutable fields outside the status machine.
#[derive(Debug, Default, Clone)]
pub struct AdminPatch {
    pub severity: Option<Severity>,
    pub admin_notes: Option<String>,
}

pub fn create(
    owner: &Actor,
    draft: TicketDraft,
    now: DateTime<Utc>,
) -> Result<(Ticket, Vec<Intent>), LifecycleError> {
    if draft.subject.trim().is_empty() {
        return Err(LifecycleError::Validation(
            "subject must not be empty".to_string(),
        ));
    }
    if draft.body.trim().is_empty() {
        return Err(LifecycleError::Validation(
            "message must not be empty".to_string(),
        ));
    }
    if !draft
        .kind
        .allowed_categories()
        .contains(&draft.category.as_str())
    {
        return Err(LifecycleError::Validation(format!(
            "invalid category '{}' for {} tickets, must be one of: {}",
            draft.category,
            draft.kind,
            draft.kind.allowed_categories().join(", ")
        )));
    }

    let severity = draft.severity.unwrap_or(Severity::Medium);
    let ticket = Ticket {
        id: Uuid::new_v4(),
        owner_id: owner.user_id.clone(),
        owner_email: owner.email.clone(),
        kind: draft.kind.as_str().to_string(),
        category: draft.category,
        severity: severity.as_str().to_string(),
        status: TicketStatus::Open.as_str().to_string(),
        subject: draft.subject,
        body: draft.body,
        steps_to_reproduce: draft.steps_to_reproduce,
        expected_behavior: draft.expected_behavior,
        actual_behavior: draft.actual_behavior,
        system_info: draft.system_info,
        assigned_to: None,
        admin_notes: None,
        external_reference: None,
        version: 0,
        created_at: now,
        updated_at: now,
        resolved_at: None,
    };

    let mut intents = vec![
        Intent::OwnerConfirmation(TicketDigest::of(&ticket)),
        Intent::AdminNewTicket(TicketDigest::of(&ticket)),
    ];
    if draft.kind == TicketKind::Bug {
        intents.push(Intent::CreateExternalIssue(BugSnapshot::of(&ticket)));
    }
    Ok((ticket, intents))
}

pub fn transition(
    ticket: &mut Ticket,
    next: TicketStatus,
    actor: &Actor,
    policy: &LifecyclePolicy,
    now: DateTime<Utc>,
) -> Result<Vec<Intent>, LifecycleError> {
    let current = current_status(ticket)?;
    if !current.can_transition_to(next) {
        return Err(LifecycleError::InvalidTransition {
            from: current,
            to: next,
        });
    }
    if !actor.is_admin {
        if !actor.owns(&ticket.owner_id) {
            return Err(LifecycleError::Forbidden(
                "only admins may modify other users' tickets".to_string(),
            ));
        }
        let self_close = current == TicketStatus::Open && next == TicketStatus::Closed;
        let reopen = next == TicketStatus::Open
            && matches!(current, TicketStatus::Resolved | TicketStatus::Closed)
            && policy.allow_owner_reopen;
        if !(self_close || reopen) {
            return Err(LifecycleError::Forbidden(
                "this status change requires admin access".to_string(),
            ));
        }
    }

    ticket.status = next.as_str().to_string();
    ticket.updated_at = now;
    if next == TicketStatus::Resolved {
        // resolved_at always reflects the most recent resolution; a reopen
        // keeps the previous value until the ticket is resolved again.
        ticket.resolved_at = Some(now);
    }

    let mut intents = vec![Intent::OwnerStatusChange(TicketDigest::of(ticket), next)];
    if let Some(reference) = &ticket.external_reference {
        match next {
            TicketStatus::Resolved | TicketStatus::Closed => {
                intents.push(Intent::SyncExternalIssue {
                    reference: reference.clone(),
                    closed: true,
                });
            }
            TicketStatus::Open => {
                intents.push(Intent::SyncExternalIssue {
                    reference: reference.clone(),
                    closed: false,
                });
            }
            TicketStatus::InProgress => {}
        }
    }
    Ok(intents)
}

pub fn assign(
    ticket: &mut Ticket,
    assignee_id: &str,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if !actor.is_admin {
        return Err(LifecycleError::Forbidden(
            "ticket assignment requires admin access".to_string(),
        ));
    }
    ticket.assigned_to = Some(assignee_id.to_string());
    ticket.updated_at = now;
    Ok(())
}

pub fn admin_update(
    ticket: &mut Ticket,
    patch: AdminPatch,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if !actor.is_admin {
        return Err(LifecycleError::Forbidden(
            "ticket updates require admin access".to_string(),
        ));
    }
    if let Some(severity) = patch.severity {
        ticket.severity = severity.as_str().to_string();
    }
    if let Some(notes) = patch.admin_notes {
        ticket.admin_notes = Some(notes);
    }
    ticket.updated_at = now;
    Ok(())
}

/// Appends a response. Never changes status: a comment that should move the
/// ticket requires an explicit transition call.
pub fn add_response(
    ticket: &mut Ticket,
    actor: &Actor,
    message: &str,
    is_internal: bool,
    now: DateTime<Utc>,
) -> Result<(TicketResponse, Vec<Intent>), LifecycleError> {
    if message.trim().is_empty() {
        return Err(LifecycleError::Validation(
            "response message must not be empty".to_string(),
        ));
    }
    if !actor.is_admin && !actor.owns(&ticket.owner_id) {
        return Err(LifecycleError::Forbidden(
            "only admins may respond to other users' tickets".to_string(),
        ));
    }
    if is_internal && !actor.is_admin {
        return Err(LifecycleError::Forbidden(
            "internal notes require admin access".to_string(),
        ));
    }

    let response = TicketResponse {
        id: Uuid::new_v4(),
        ticket_id: ticket.id,
        responder_id: actor.user_id.clone(),
        message: message.to_string(),
        is_internal,
        created_at: now,
    };
    ticket.updated_at = now;

    let mut intents = Vec::new();
    if actor.is_admin && !is_internal {
        intents.push(Intent::OwnerNewResponse(
            TicketDigest::of(ticket),
            message.to_string(),
        ));
    }
    Ok((response, intents))
}

/// Links a bug report to its external issue. Write-once: attaching the same
/// reference again is a retry-safe no-op (`Ok(false)`), a different reference
/// is a conflict. Returns whether the ticket changed.
pub fn attach_external_issue(
    ticket: &mut Ticket,
    reference: &str,
    now: DateTime<Utc>,
) -> Result<bool, LifecycleError> {
    if TicketKind::parse(&ticket.kind) != Some(TicketKind::Bug) {
        return Err(LifecycleError::Conflict(
            "external issues can only be attached to bug reports".to_string(),
        ));
    }
    match &ticket.external_reference {
        Some(existing) if existing == reference => Ok(false),
        Some(_) => Err(LifecycleError::Conflict(
            "ticket is already linked to a different external issue".to_string(),
        )),
        None => {
            ticket.external_reference = Some(reference.to_string());
            ticket.updated_at = now;
            Ok(true)
        }
    }
}

fn current_status(ticket: &Ticket) -> Result<TicketStatus, LifecycleError> {
    TicketStatus::parse(&ticket.status).ok_or_else(|| {
        LifecycleError::Validation(format!("unrecognized ticket status '{}'", ticket.status))
    })
}
