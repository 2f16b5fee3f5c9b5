use crate::config::SmtpConfig;
use crate::issue_tracker::{IssueTrackerError, IssueTrackerGateway};
use crate::notify::{templates, NotificationGateway};
use crate::shared::utils::DbPool;
use crate::tickets::error::{ApiError, LifecycleError};
use crate::tickets::models::{Severity, Ticket, TicketKind, TicketStatus};
use crate::tickets::{lifecycle, store};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A recorded request for a side effect, emitted by a lifecycle operation and
/// dispatched after the state mutation has committed. Delivery is
/// at-least-once; failures are logged, never surfaced to the original caller.
#[derive(Debug, Clone)]
pub enum Intent {
    OwnerConfirmation(TicketDigest),
    AdminNewTicket(TicketDigest),
    OwnerStatusChange(TicketDigest, TicketStatus),
    OwnerNewResponse(TicketDigest, String),
    CreateExternalIssue(BugSnapshot),
    SyncExternalIssue { reference: String, closed: bool },
}

/// The slice of a ticket that notification templates need.
#[derive(Debug, Clone)]
pub struct TicketDigest {
    pub ticket_id: Uuid,
    pub kind: TicketKind,
    pub category: String,
    pub severity: Severity,
    pub subject: String,
    pub owner_email: String,
}

impl TicketDigest {
    pub fn of(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.id,
            kind: TicketKind::parse(&ticket.kind).unwrap_or(TicketKind::Support),
            category: ticket.category.clone(),
            severity: Severity::parse(&ticket.severity).unwrap_or(Severity::Medium),
            subject: ticket.subject.clone(),
            owner_email: ticket.owner_email.clone(),
        }
    }
}

/// Bug report snapshot handed to the issue tracker.
#[derive(Debug, Clone)]
pub struct BugSnapshot {
    pub ticket_id: Uuid,
    pub category: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub steps_to_reproduce: Option<String>,
    pub expected_behavior: Option<String>,
    pub actual_behavior: Option<String>,
    pub reporter_email: String,
    pub system_info: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl BugSnapshot {
    pub fn of(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.id,
            category: ticket.category.clone(),
            severity: Severity::parse(&ticket.severity).unwrap_or(Severity::Medium),
            title: ticket.subject.clone(),
            description: ticket.body.clone(),
            steps_to_reproduce: ticket.steps_to_reproduce.clone(),
            expected_behavior: ticket.expected_behavior.clone(),
            actual_behavior: ticket.actual_behavior.clone(),
            reporter_email: ticket.owner_email.clone(),
            system_info: ticket.system_info.clone(),
            created_at: ticket.created_at,
        }
    }
}

/// Handle used by request handlers to queue intents after a commit.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Intent>,
}

impl Outbox {
    pub fn dispatch(&self, intents: Vec<Intent>) {
        for intent in intents {
            if self.tx.send(intent).is_err() {
                log::error!("outbox dispatcher is gone, dropping intent");
            }
        }
    }
}

/// Spawns the dispatcher task draining the outbox channel.
pub fn start_dispatcher(
    pool: DbPool,
    smtp: SmtpConfig,
    notifier: Arc<dyn NotificationGateway>,
    tracker: Arc<dyn IssueTrackerGateway>,
) -> (Outbox, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Intent>();
    let handle = tokio::spawn(async move {
        while let Some(intent) = rx.recv().await {
            deliver(&pool, &smtp, notifier.as_ref(), tracker.as_ref(), intent).await;
        }
    });
    (Outbox { tx }, handle)
}

async fn deliver(
    pool: &DbPool,
    smtp: &SmtpConfig,
    notifier: &dyn NotificationGateway,
    tracker: &dyn IssueTrackerGateway,
    intent: Intent,
) {
    match intent {
        Intent::CreateExternalIssue(snapshot) => {
            let ticket_id = snapshot.ticket_id;
            match tracker.create_issue(&snapshot).await {
                Ok(reference) => {
                    log::info!("created external issue {reference} for ticket {ticket_id}");
                    if let Err(e) = record_external_reference(pool, ticket_id, &reference) {
                        log::error!(
                            "failed to record external issue for ticket {ticket_id}: {e}"
                        );
                    }
                }
                Err(IssueTrackerError::Disabled) => {
                    log::warn!("issue tracker not configured, skipping ticket {ticket_id}");
                }
                Err(e) => {
                    log::error!("failed to create external issue for ticket {ticket_id}: {e}");
                }
            }
        }
        Intent::SyncExternalIssue { reference, closed } => {
            match tracker.sync_issue_state(&reference, closed).await {
                Ok(()) | Err(IssueTrackerError::Disabled) => {}
                Err(e) => log::error!("failed to sync external issue {reference}: {e}"),
            }
        }
        other => {
            if let Some(notification) = templates::render(&other, smtp) {
                if let Err(e) = notifier.send(&notification).await {
                    log::error!("notification delivery to {} failed: {e}", notification.to);
                }
            }
        }
    }
}

/// Calls back into the lifecycle to persist the external reference. Retries a
/// few times when losing the optimistic-version race with a concurrent admin.
fn record_external_reference(
    pool: &DbPool,
    ticket_id: Uuid,
    reference: &str,
) -> Result<(), ApiError> {
    let mut conn = pool.get().map_err(|e| ApiError::Pool(e.to_string()))?;
    for _ in 0..3 {
        let mut ticket = store::find_ticket(&mut conn, ticket_id)?;
        if !lifecycle::attach_external_issue(&mut ticket, reference, Utc::now())? {
            return Ok(());
        }
        match store::update_ticket(&mut conn, &mut ticket) {
            Ok(()) => return Ok(()),
            Err(ApiError::Lifecycle(LifecycleError::Conflict(_))) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(LifecycleError::Conflict(format!(
        "gave up attaching external issue to ticket {ticket_id} after concurrent updates"
    ))
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Notification, NotifyError};
    use async_trait::async_trait;
    use diesel::r2d2::ConnectionManager;
    use diesel::PgConnection;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationGateway for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct RecordingTracker {
        synced: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl IssueTrackerGateway for RecordingTracker {
        async fn create_issue(
            &self,
            _snapshot: &BugSnapshot,
        ) -> Result<String, IssueTrackerError> {
            Err(IssueTrackerError::Disabled)
        }

        async fn sync_issue_state(
            &self,
            reference: &str,
            closed: bool,
        ) -> Result<(), IssueTrackerError> {
            self.synced
                .lock()
                .unwrap()
                .push((reference.to_string(), closed));
            Ok(())
        }
    }

    fn idle_pool() -> DbPool {
        // never connected; notification intents do not touch the database
        let manager = ConnectionManager::<PgConnection>::new("postgres://unused/unused");
        diesel::r2d2::Pool::builder()
            .max_size(1)
            .build_unchecked(manager)
    }

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
            kind: TicketKind::Support,
            category: "technical".to_string(),
            severity: Severity::Medium,
            subject: "Cannot log in".to_string(),
            owner_email: "user@example.com".to_string(),
        }
    }

    async fn drain(handle: JoinHandle<()>, outbox: Outbox) {
        drop(outbox);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn dispatcher_delivers_notifications() {
        let notifier = Arc::new(RecordingNotifier {
            sent: Mutex::new(Vec::new()),
        });
        let tracker = Arc::new(RecordingTracker {
            synced: Mutex::new(Vec::new()),
        });
        let (outbox, handle) =
            start_dispatcher(idle_pool(), smtp(), notifier.clone(), tracker.clone());

        outbox.dispatch(vec![
            Intent::OwnerConfirmation(digest()),
            Intent::AdminNewTicket(digest()),
        ]);
        drain(handle, outbox).await;

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "user@example.com");
        assert_eq!(sent[1].to, "admin@example.com");
    }

    #[tokio::test]
    async fn dispatcher_syncs_external_issue_state() {
        let notifier = Arc::new(RecordingNotifier {
            sent: Mutex::new(Vec::new()),
        });
        let tracker = Arc::new(RecordingTracker {
            synced: Mutex::new(Vec::new()),
        });
        let (outbox, handle) =
            start_dispatcher(idle_pool(), smtp(), notifier.clone(), tracker.clone());

        outbox.dispatch(vec![Intent::SyncExternalIssue {
            reference: "https://github.com/acme/widgets/issues/7".to_string(),
            closed: true,
        }]);
        drain(handle, outbox).await;

        let synced = tracker.synced.lock().unwrap();
        assert_eq!(
            synced.as_slice(),
            &[("https://github.com/acme/widgets/issues/7".to_string(), true)]
        );
        assert!(notifier.sent.lock().unwrap().is_empty());
    }
}
