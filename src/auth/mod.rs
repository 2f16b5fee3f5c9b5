use crate::shared::state::AppState;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use std::sync::Arc;

/// Authenticated caller of a lifecycle operation. Identity is established by
/// the fronting auth proxy and forwarded via trusted headers; the admin
/// capability is an email allow-list check.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub email: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn owns(&self, owner_id: &str) -> bool {
        self.user_id == owner_id
    }
}

pub fn is_admin(admin_emails: &[String], email: &str) -> bool {
    let email = email.to_lowercase();
    admin_emails.iter().any(|e| *e == email)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let user_id = header("x-user-id").ok_or((
            StatusCode::UNAUTHORIZED,
            "authentication required".to_string(),
        ))?;
        let email = header("x-user-email").unwrap_or_default();
        let is_admin = is_admin(&state.config.admin_emails, &email);

        Ok(Actor {
            user_id,
            email,
            is_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_match_is_case_insensitive() {
        let admins = vec!["ops@example.com".to_string()];
        assert!(is_admin(&admins, "Ops@Example.com"));
        assert!(!is_admin(&admins, "user@example.com"));
    }

    #[test]
    fn empty_allow_list_grants_nothing() {
        assert!(!is_admin(&[], "ops@example.com"));
    }
}
