//! Owner- and admin-facing projections. Pure: no side effects, no persistence.
//!
//! The owner view strips `admin_notes` and every internal response; the admin
//! view is the full row.

use crate::tickets::models::{Ticket, TicketResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct OwnerTicketView {
    pub id: Uuid,
    pub kind: String,
    pub category: String,
    pub severity: String,
    pub status: String,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps_to_reproduce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_behavior: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_behavior: Option<String>,
    pub system_info: Option<serde_json::Value>,
    pub assigned_to: Option<String>,
    pub external_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ResponseView {
    pub id: Uuid,
    pub responder_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OwnerTicketDetail {
    #[serde(flatten)]
    pub ticket: OwnerTicketView,
    pub responses: Vec<ResponseView>,
}

/// Full-fidelity projection for admins.
#[derive(Debug, Serialize)]
pub struct AdminTicketDetail {
    pub ticket: Ticket,
    pub responses: Vec<TicketResponse>,
}

pub fn owner_view(ticket: &Ticket) -> OwnerTicketView {
    OwnerTicketView {
        id: ticket.id,
        kind: ticket.kind.clone(),
        category: ticket.category.clone(),
        severity: ticket.severity.clone(),
        status: ticket.status.clone(),
        subject: ticket.subject.clone(),
        body: ticket.body.clone(),
        steps_to_reproduce: ticket.steps_to_reproduce.clone(),
        expected_behavior: ticket.expected_behavior.clone(),
        actual_behavior: ticket.actual_behavior.clone(),
        system_info: ticket.system_info.clone(),
        assigned_to: ticket.assigned_to.clone(),
        external_reference: ticket.external_reference.clone(),
        created_at: ticket.created_at,
        updated_at: ticket.updated_at,
        resolved_at: ticket.resolved_at,
    }
}

pub fn owner_detail(ticket: &Ticket, responses: &[TicketResponse]) -> OwnerTicketDetail {
    OwnerTicketDetail {
        ticket: owner_view(ticket),
        responses: responses
            .iter()
            .filter(|r| !r.is_internal)
            .map(|r| ResponseView {
                id: r.id,
                responder_id: r.responder_id.clone(),
                message: r.message.clone(),
                created_at: r.created_at,
            })
            .collect(),
    }
}

pub fn admin_detail(ticket: Ticket, responses: Vec<TicketResponse>) -> AdminTicketDetail {
    AdminTicketDetail { ticket, responses }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Actor;
    use crate::tickets::lifecycle::{self, TicketDraft};
    use crate::tickets::models::TicketKind;
    use chrono::Utc;

    fn ticket_with_notes() -> Ticket {
        let owner = Actor {
            user_id: "user-1".to_string(),
            email: "user@example.com".to_string(),
            is_admin: false,
        };
        let draft = TicketDraft {
            kind: TicketKind::Support,
            category: "technical".to_string(),
            subject: "Cannot log in".to_string(),
            body: "Login fails".to_string(),
            severity: None,
            steps_to_reproduce: None,
            expected_behavior: None,
            actual_behavior: None,
            system_info: None,
        };
        let (mut ticket, _) = lifecycle::create(&owner, draft, Utc::now()).unwrap();
        ticket.admin_notes = Some("user has three failed payments".to_string());
        ticket
    }

    fn responses(ticket: &Ticket) -> Vec<TicketResponse> {
        vec![
            TicketResponse {
                id: uuid::Uuid::new_v4(),
                ticket_id: ticket.id,
                responder_id: "admin-1".to_string(),
                message: "looking into it".to_string(),
                is_internal: false,
                created_at: Utc::now(),
            },
            TicketResponse {
                id: uuid::Uuid::new_v4(),
                ticket_id: ticket.id,
                responder_id: "admin-1".to_string(),
                message: "probably the billing migration".to_string(),
                is_internal: true,
                created_at: Utc::now(),
            },
        ]
    }

    #[test]
    fn owner_detail_strips_internal_responses() {
        let ticket = ticket_with_notes();
        let detail = owner_detail(&ticket, &responses(&ticket));
        assert_eq!(detail.responses.len(), 1);
        assert_eq!(detail.responses[0].message, "looking into it");
    }

    #[test]
    fn owner_projection_never_serializes_admin_notes() {
        let ticket = ticket_with_notes();
        let json = serde_json::to_value(owner_detail(&ticket, &responses(&ticket))).unwrap();
        assert!(json.get("admin_notes").is_none());
        assert!(json.get("owner_email").is_none());
        let serialized = json.to_string();
        assert!(!serialized.contains("billing migration"));
        assert!(!serialized.contains("failed payments"));
    }

    #[test]
    fn admin_detail_keeps_full_fidelity() {
        let ticket = ticket_with_notes();
        let rs = responses(&ticket);
        let detail = admin_detail(ticket, rs);
        assert_eq!(detail.responses.len(), 2);
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(
            json["ticket"]["admin_notes"],
            "user has three failed payments"
        );
    }
}
