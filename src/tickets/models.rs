use crate::shared::schema::{ticket_responses, tickets};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Categories accepted for support requests.
pub const SUPPORT_CATEGORIES: &[&str] = &[
    "general",
    "technical",
    "billing",
    "feature",
    "bug",
    "account",
    "privacy",
];

/// Categories accepted for bug reports.
pub const BUG_CATEGORIES: &[&str] = &[
    "general",
    "ui",
    "performance",
    "crash",
    "authentication",
    "habits",
    "friends",
    "chat",
    "notifications",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    Support,
    Bug,
}

impl TicketKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketKind::Support => "support",
            TicketKind::Bug => "bug",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "support" => Some(TicketKind::Support),
            "bug" => Some(TicketKind::Bug),
            _ => None,
        }
    }

    pub fn allowed_categories(self) -> &'static [&'static str] {
        match self {
            TicketKind::Support => SUPPORT_CATEGORIES,
            TicketKind::Bug => BUG_CATEGORIES,
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(TicketStatus::Open),
            "in_progress" => Some(TicketStatus::InProgress),
            "resolved" => Some(TicketStatus::Resolved),
            "closed" => Some(TicketStatus::Closed),
            _ => None,
        }
    }

    /// The legal transition table. Backward moves are rejected except the
    /// reopen edges resolved -> open and closed -> open.
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Open, InProgress | Resolved | Closed)
                | (InProgress, Open | Resolved | Closed)
                | (Resolved, Open)
                | (Closed, Open)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A support request or bug report row. Status, severity and kind are stored
/// as text and parsed at the lifecycle boundary.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = tickets, treat_none_as_null = true)]
pub struct Ticket {
    pub id: Uuid,
    pub owner_id: String,
    pub owner_email: String,
    pub kind: String,
    pub category: String,
    pub severity: String,
    pub status: String,
    pub subject: String,
    pub body: String,
    pub steps_to_reproduce: Option<String>,
    pub expected_behavior: Option<String>,
    pub actual_behavior: Option<String>,
    pub system_info: Option<serde_json::Value>,
    pub assigned_to: Option<String>,
    pub admin_notes: Option<String>,
    pub external_reference: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_responses)]
pub struct TicketResponse {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub responder_id: String,
    pub message: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for s in ["open", "in_progress", "resolved", "closed"] {
            assert_eq!(TicketStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(TicketStatus::parse("pending").is_none());
    }

    #[test]
    fn transition_table_matches_lifecycle_rules() {
        use TicketStatus::*;
        let all = [Open, InProgress, Resolved, Closed];
        let allowed: &[(TicketStatus, TicketStatus)] = &[
            (Open, InProgress),
            (Open, Resolved),
            (Open, Closed),
            (InProgress, Open),
            (InProgress, Resolved),
            (InProgress, Closed),
            (Resolved, Open),
            (Closed, Open),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "transition {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn kinds_have_distinct_category_sets() {
        assert!(TicketKind::Support.allowed_categories().contains(&"billing"));
        assert!(!TicketKind::Bug.allowed_categories().contains(&"billing"));
        assert!(TicketKind::Bug.allowed_categories().contains(&"crash"));
    }
}
