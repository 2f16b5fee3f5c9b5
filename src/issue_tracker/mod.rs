//! External issue-tracker integration. Bug reports are mirrored to GitHub
//! issues; the resulting html_url becomes the ticket's external reference.

use crate::config::GithubConfig;
use crate::outbox::BugSnapshot;
use async_trait::async_trait;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum IssueTrackerError {
    #[error("issue tracker not configured")]
    Disabled,
    #[error("malformed issue reference: {0}")]
    BadReference(String),
    #[error("github api returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait IssueTrackerGateway: Send + Sync {
    /// Creates an issue for the bug report and returns its reference URL.
    async fn create_issue(&self, snapshot: &BugSnapshot) -> Result<String, IssueTrackerError>;

    /// Mirrors resolve/close/reopen onto the linked issue's open/closed state.
    async fn sync_issue_state(
        &self,
        reference: &str,
        closed: bool,
    ) -> Result<(), IssueTrackerError>;
}

pub struct GithubIssueTracker {
    client: reqwest::Client,
    config: GithubConfig,
}

impl GithubIssueTracker {
    pub fn new(config: GithubConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IssueTrackerGateway for GithubIssueTracker {
    async fn create_issue(&self, snapshot: &BugSnapshot) -> Result<String, IssueTrackerError> {
        if !self.config.enabled() {
            return Err(IssueTrackerError::Disabled);
        }

        let payload = json!({
            "title": format!("[Bug] {}", snapshot.title),
            "body": format_issue_body(snapshot),
            "labels": issue_labels(snapshot),
        });

        let response = self
            .client
            .post(self.config.issues_url())
            .header("Authorization", format!("token {}", self.config.token))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "ticketserver")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() != 201 {
            return Err(IssueTrackerError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let issue: serde_json::Value = response.json().await?;
        issue["html_url"]
            .as_str()
            .map(str::to_string)
            .ok_or(IssueTrackerError::Api {
                status: 201,
                body: "response missing html_url".to_string(),
            })
    }

    async fn sync_issue_state(
        &self,
        reference: &str,
        closed: bool,
    ) -> Result<(), IssueTrackerError> {
        if !self.config.enabled() {
            return Err(IssueTrackerError::Disabled);
        }

        let number = issue_number(reference)
            .ok_or_else(|| IssueTrackerError::BadReference(reference.to_string()))?;
        let state = if closed { "closed" } else { "open" };

        let response = self
            .client
            .patch(format!("{}/{}", self.config.issues_url(), number))
            .header("Authorization", format!("token {}", self.config.token))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "ticketserver")
            .json(&json!({ "state": state }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IssueTrackerError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

fn issue_number(reference: &str) -> Option<u64> {
    reference.rsplit('/').next()?.parse().ok()
}

fn format_issue_body(snapshot: &BugSnapshot) -> String {
    let mut body = format!(
        "## Bug Report\n\n\
         **Report ID:** {}\n\
         **Category:** {}\n\
         **Severity:** {}\n\
         **Reported by:** {}\n\
         **Reported at:** {}\n\n\
         ### Description\n{}\n",
        snapshot.ticket_id,
        snapshot.category,
        snapshot.severity,
        if snapshot.reporter_email.is_empty() {
            "unknown"
        } else {
            snapshot.reporter_email.as_str()
        },
        snapshot.created_at.to_rfc3339(),
        snapshot.description,
    );

    if let Some(steps) = &snapshot.steps_to_reproduce {
        body.push_str(&format!("\n### Steps to Reproduce\n{steps}\n"));
    }
    if let Some(expected) = &snapshot.expected_behavior {
        body.push_str(&format!("\n### Expected Behavior\n{expected}\n"));
    }
    if let Some(actual) = &snapshot.actual_behavior {
        body.push_str(&format!("\n### Actual Behavior\n{actual}\n"));
    }
    if let Some(info) = &snapshot.system_info {
        body.push_str(&format!(
            "\n### System Information\n```json\n{}\n```\n",
            serde_json::to_string_pretty(info).unwrap_or_else(|_| info.to_string())
        ));
    }

    body.push_str("\n---\n*This issue was automatically created from a bug report.*");
    body
}

fn issue_labels(snapshot: &BugSnapshot) -> Vec<String> {
    let mut labels = vec!["bug".to_string(), "from-app".to_string()];
    if ["ui", "performance", "crash", "authentication"].contains(&snapshot.category.as_str()) {
        labels.push(snapshot.category.clone());
    }
    labels.push(format!("severity-{}", snapshot.severity));
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickets::models::Severity;
    use chrono::Utc;
    use uuid::Uuid;

    fn snapshot() -> BugSnapshot {
        BugSnapshot {
            ticket_id: Uuid::new_v4(),
            category: "crash".to_string(),
            severity: Severity::High,
            title: "App crashes on startup".to_string(),
            description: "Crashes immediately after the splash screen".to_string(),
            steps_to_reproduce: Some("1. Launch the app".to_string()),
            expected_behavior: Some("App opens".to_string()),
            actual_behavior: Some("App exits".to_string()),
            reporter_email: "user@example.com".to_string(),
            system_info: Some(serde_json::json!({"app_version": "1.2.3"})),
            created_at: Utc::now(),
        }
    }

    fn config(api_base: &str, token: &str) -> GithubConfig {
        GithubConfig {
            token: token.to_string(),
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            api_base: api_base.to_string(),
        }
    }

    #[test]
    fn labels_carry_category_and_severity() {
        let labels = issue_labels(&snapshot());
        assert_eq!(labels, vec!["bug", "from-app", "crash", "severity-high"]);

        let mut general = snapshot();
        general.category = "general".to_string();
        let labels = issue_labels(&general);
        assert_eq!(labels, vec!["bug", "from-app", "severity-high"]);
    }

    #[test]
    fn body_includes_optional_sections_when_present() {
        let body = format_issue_body(&snapshot());
        assert!(body.contains("### Steps to Reproduce"));
        assert!(body.contains("### Expected Behavior"));
        assert!(body.contains("### System Information"));
        assert!(body.contains("user@example.com"));

        let mut bare = snapshot();
        bare.steps_to_reproduce = None;
        bare.system_info = None;
        let body = format_issue_body(&bare);
        assert!(!body.contains("### Steps to Reproduce"));
        assert!(!body.contains("### System Information"));
    }

    #[test]
    fn issue_number_is_last_path_segment() {
        assert_eq!(
            issue_number("https://github.com/acme/widgets/issues/42"),
            Some(42)
        );
        assert_eq!(issue_number("not-a-url"), None);
    }

    #[tokio::test]
    async fn create_issue_returns_html_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/acme/widgets/issues")
            .match_header("authorization", "token t0ken")
            .with_status(201)
            .with_body(r#"{"html_url": "https://github.com/acme/widgets/issues/7"}"#)
            .create_async()
            .await;

        let tracker = GithubIssueTracker::new(config(&server.url(), "t0ken"));
        let url = tracker.create_issue(&snapshot()).await.unwrap();
        assert_eq!(url, "https://github.com/acme/widgets/issues/7");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_issue_surfaces_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/repos/acme/widgets/issues")
            .with_status(422)
            .with_body("validation failed")
            .create_async()
            .await;

        let tracker = GithubIssueTracker::new(config(&server.url(), "t0ken"));
        let err = tracker.create_issue(&snapshot()).await.unwrap_err();
        assert!(matches!(err, IssueTrackerError::Api { status: 422, .. }));
    }

    #[tokio::test]
    async fn disabled_without_token() {
        let tracker = GithubIssueTracker::new(config("https://api.github.com", ""));
        assert!(matches!(
            tracker.create_issue(&snapshot()).await,
            Err(IssueTrackerError::Disabled)
        ));
    }

    #[tokio::test]
    async fn sync_closes_the_linked_issue() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/repos/acme/widgets/issues/7")
            .match_body(mockito::Matcher::JsonString(
                r#"{"state": "closed"}"#.to_string(),
            ))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let tracker = GithubIssueTracker::new(config(&server.url(), "t0ken"));
        tracker
            .sync_issue_state("https://github.com/acme/widgets/issues/7", true)
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
