use crate::config::AppConfig;
use crate::outbox::Outbox;
use crate::shared::utils::DbPool;

/// Shared application state handed to every axum handler via `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub outbox: Outbox,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("conn", &"DbPool")
            .field("config", &"AppConfig")
            .field("outbox", &"Outbox")
            .finish()
    }
}
