use sqlx::PgPool;

use crate::services::locks::LockManager;
use crate::services::pictures::PictureStore;
use crate::services::telemetry::EventLogger;

/// Shared server state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub locks: LockManager,
    pub pictures: PictureStore,
    pub events: EventLogger,
}
