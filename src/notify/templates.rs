//! Plain-text message bodies for each notification intent. Wording follows
//! the support templates shipped to users, so keep changes deliberate.

use crate::config::SmtpConfig;
use crate::notify::Notification;
use crate::outbox::{Intent, TicketDigest};
use crate::tickets::models::{TicketKind, TicketStatus};
use uuid::Uuid;

/// Short human-facing ticket reference.
fn short_ref(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn kind_label(kind: TicketKind) -> &'static str {
    match kind {
        TicketKind::Support => "Support Request",
        TicketKind::Bug => "Bug Report",
    }
}

/// Renders an intent into a deliverable notification. Returns `None` for
/// intents without a mail counterpart or without a usable recipient.
pub fn render(intent: &Intent, smtp: &SmtpConfig) -> Option<Notification> {
    match intent {
        Intent::OwnerConfirmation(digest) => owner_confirmation(digest, smtp),
        Intent::AdminNewTicket(digest) => Some(admin_new_ticket(digest, smtp)),
        Intent::OwnerStatusChange(digest, status) => owner_status_change(digest, *status),
        Intent::OwnerNewResponse(digest, message) => owner_new_response(digest, message),
        Intent::CreateExternalIssue(_) | Intent::SyncExternalIssue { .. } => None,
    }
}

fn owner_confirmation(digest: &TicketDigest, smtp: &SmtpConfig) -> Option<Notification> {
    if digest.owner_email.is_empty() {
        return None;
    }
    let reference = short_ref(digest.ticket_id);
    let label = kind_label(digest.kind);
    let body = format!(
        "Thank you for contacting support!\n\n\
         We have received your {} and will get back to you as soon as possible.\n\n\
         Details:\n\
         - Reference: #{}\n\
         - Category: {}\n\
         - Severity: {}\n\
         - Subject: {}\n\n\
         We typically respond within 24 hours. If you need immediate assistance,\n\
         reach us at {}.\n\n\
         Best regards,\n\
         The Support Team",
        label.to_lowercase(),
        reference,
        digest.category,
        digest.severity,
        digest.subject,
        smtp.support_email,
    );
    Some(Notification {
        to: digest.owner_email.clone(),
        subject: format!("{label} #{reference} Received"),
        body,
    })
}

fn admin_new_ticket(digest: &TicketDigest, smtp: &SmtpConfig) -> Notification {
    let reference = short_ref(digest.ticket_id);
    let label = kind_label(digest.kind);
    let body = format!(
        "A new {} was submitted.\n\n\
         - Reference: #{}\n\
         - Reported by: {}\n\
         - Category: {}\n\
         - Severity: {}\n\
         - Subject: {}\n",
        label.to_lowercase(),
        reference,
        if digest.owner_email.is_empty() {
            "unknown"
        } else {
            digest.owner_email.as_str()
        },
        digest.category,
        digest.severity,
        digest.subject,
    );
    Notification {
        to: smtp.admin_email.clone(),
        subject: format!("[{}] New {} #{}", digest.severity, label.to_lowercase(), reference),
        body,
    }
}

fn owner_status_change(digest: &TicketDigest, status: TicketStatus) -> Option<Notification> {
    if digest.owner_email.is_empty() {
        return None;
    }
    let reference = short_ref(digest.ticket_id);
    let label = kind_label(digest.kind);
    let body = format!(
        "The status of your {} #{} (\"{}\") changed to: {}.\n\n\
         You can reply to the ticket if you have further questions.\n\n\
         Best regards,\n\
         The Support Team",
        label.to_lowercase(),
        reference,
        digest.subject,
        status,
    );
    Some(Notification {
        to: digest.owner_email.clone(),
        subject: format!("{label} #{reference} Status Update"),
        body,
    })
}

fn owner_new_response(digest: &TicketDigest, message: &str) -> Option<Notification> {
    if digest.owner_email.is_empty() {
        return None;
    }
    let reference = short_ref(digest.ticket_id);
    let label = kind_label(digest.kind);
    let body = format!(
        "There is a new response on your {} #{} (\"{}\"):\n\n\
         {}\n\n\
         Best regards,\n\
         The Support Team",
        label.to_lowercase(),
        reference,
        digest.subject,
        message,
    );
    Some(Notification {
        to: digest.owner_email.clone(),
        subject: format!("New response on {label} #{reference}"),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickets::models::Severity;

    fn smtp() -> SmtpConfig {
        SmtpConfig {
            server: "smtp.example.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_email: "support@example.com".to_string(),
            support_email: "support@example.com".to_string(),
            admin_email: "admin@example.com".to_string(),
        }
    }

    fn digest() -> TicketDigest {
        TicketDigest {
            ticket_id: Uuid::new_v4(),
            kind: TicketKind::Bug,
            category: "crash".to_string(),
            severity: Severity::High,
            subject: "App crashes on startup".to_string(),
            owner_email: "user@example.com".to_string(),
        }
    }

    #[test]
    fn confirmation_addresses_the_owner() {
        let n = render(&Intent::OwnerConfirmation(digest()), &smtp()).unwrap();
        assert_eq!(n.to, "user@example.com");
        assert!(n.subject.starts_with("Bug Report #"));
        assert!(n.body.contains("App crashes on startup"));
        assert!(n.body.contains("support@example.com"));
    }

    #[test]
    fn admin_notification_goes_to_admin_address() {
        let n = render(&Intent::AdminNewTicket(digest()), &smtp()).unwrap();
        assert_eq!(n.to, "admin@example.com");
        assert!(n.subject.contains("high"));
        assert!(n.body.contains("user@example.com"));
    }

    #[test]
    fn status_change_names_the_new_status() {
        let n = render(
            &Intent::OwnerStatusChange(digest(), TicketStatus::Resolved),
            &smtp(),
        )
        .unwrap();
        assert!(n.body.contains("resolved"));
    }

    #[test]
    fn missing_owner_email_renders_nothing() {
        let mut d = digest();
        d.owner_email.clear();
        assert!(render(&Intent::OwnerConfirmation(d), &smtp()).is_none());
    }

    #[test]
    fn tracker_intents_have_no_mail_counterpart() {
        let n = render(
            &Intent::SyncExternalIssue {
                reference: "https://github.com/acme/widgets/issues/7".to_string(),
                closed: true,
            },
            &smtp(),
        );
        assert!(n.is_none());
    }
}
